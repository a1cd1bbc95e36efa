//! Classification of a single expiry date against an [`ExpiryPolicy`].

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::Severity;
use crate::policy::{days_until, ExpiryPolicy};

/// Where an expiry date falls relative to a policy's windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryState {
    /// No expiry date on record.
    Unknown,
    /// Already past.
    Expired,
    /// Inside the critical window.
    Critical,
    /// Inside the warning window.
    Warning,
    /// Inside the notice window.
    Notice,
    /// Outside every window.
    Valid,
}

impl ExpiryState {
    /// Severity attached to this state.
    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            Self::Expired | Self::Critical => Severity::Error,
            Self::Unknown | Self::Warning => Severity::Warning,
            Self::Notice => Severity::Info,
            Self::Valid => Severity::Success,
        }
    }

    /// Storage and wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Expired => "expired",
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Valid => "valid",
        }
    }
}

impl fmt::Display for ExpiryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Result of evaluating one expiry date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryStatus {
    /// Classification.
    pub status: ExpiryState,
    /// Human-readable explanation.
    pub message: String,
    /// Days until expiry, negative once past, `None` when unknown.
    pub days_remaining: Option<i64>,
    /// Severity of the classification.
    pub severity: Severity,
}

impl ExpiryStatus {
    /// Whether this status blocks operation.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self.status, ExpiryState::Expired | ExpiryState::Critical)
    }
}

/// Classify `expiry` against `policy` as of `today`.
#[must_use]
pub fn evaluate_expiry(
    expiry: Option<NaiveDate>,
    policy: &ExpiryPolicy,
    today: NaiveDate,
) -> ExpiryStatus {
    let Some(expiry) = expiry else {
        return ExpiryStatus {
            status: ExpiryState::Unknown,
            message: format!("{} expiry date not set", policy.label),
            days_remaining: None,
            severity: ExpiryState::Unknown.severity(),
        };
    };

    let days = days_until(expiry, today);
    let status = classify(days, policy);
    let message = match status {
        ExpiryState::Expired => {
            format!("{} expired {} {} ago", policy.label, days.abs(), plural_days(days))
        }
        ExpiryState::Critical if days == 0 => format!("{} expires today", policy.label),
        ExpiryState::Critical | ExpiryState::Warning | ExpiryState::Notice => {
            format!("{} expires in {days} {}", policy.label, plural_days(days))
        }
        ExpiryState::Valid => format!("{} valid until {expiry}", policy.label),
        ExpiryState::Unknown => format!("{} expiry date not set", policy.label),
    };

    ExpiryStatus {
        status,
        message,
        days_remaining: Some(days),
        severity: status.severity(),
    }
}

fn classify(days: i64, policy: &ExpiryPolicy) -> ExpiryState {
    if days < 0 {
        ExpiryState::Expired
    } else if days <= policy.critical_days {
        ExpiryState::Critical
    } else if days <= policy.warning_days {
        ExpiryState::Warning
    } else if policy.notice_days.is_some_and(|notice| days <= notice) {
        ExpiryState::Notice
    } else {
        ExpiryState::Valid
    }
}

fn plural_days(days: i64) -> &'static str {
    if days.abs() == 1 {
        "day"
    } else {
        "days"
    }
}
