//! Record types consumed and produced by the compliance engine.
//!
//! These mirror the rows held by the records store: aircraft, flights,
//! pilot certificates, and notifications. The engine itself never loads
//! them; callers assemble them from a [`crate::storage::FleetRecords`]
//! implementation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Shared severity scale for expiry statuses, findings, and notifications.
///
/// Variants are declared in ascending order so that `Ord` matches urgency:
/// `Success < Info < Warning < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Fully compliant.
    Success,
    /// Informational, nothing to do yet.
    Info,
    /// Needs attention soon.
    Warning,
    /// Blocking; the operation is non-compliant.
    Error,
}

/// Operating status of an aircraft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AircraftStatus {
    /// In service.
    #[default]
    Active,
    /// Temporarily grounded.
    Maintenance,
    /// Permanently out of service.
    Retired,
}

/// How the aircraft satisfies Remote ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteIdType {
    /// Built-in standard Remote ID.
    #[default]
    Standard,
    /// Add-on broadcast module.
    Broadcast,
    /// Network Remote ID.
    Network,
}

/// Cached compliance status of a flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    /// No violations and no warnings.
    Compliant,
    /// At least one violation.
    NonCompliant,
    /// Warnings but no violations.
    Warning,
    /// Not yet evaluated.
    #[default]
    Pending,
    /// Evaluation in progress.
    Processing,
}

/// Category of a stored notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Aircraft registration approaching expiry.
    RegistrationExpiry,
    /// Part 107 certificate approaching expiry.
    CertificateExpiry,
    /// A flight was found non-compliant.
    ComplianceViolation,
}

macro_rules! string_enum {
    ($ty:ty, $field:literal, { $($variant:path => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// The storage and wire representation of this value.
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($variant),)+
                    other => Err(Error::invalid_record($field, format!("unknown value '{other}'"))),
                }
            }
        }
    };
}

string_enum!(Severity, "severity", {
    Severity::Success => "success",
    Severity::Info => "info",
    Severity::Warning => "warning",
    Severity::Error => "error",
});

string_enum!(AircraftStatus, "status", {
    AircraftStatus::Active => "active",
    AircraftStatus::Maintenance => "maintenance",
    AircraftStatus::Retired => "retired",
});

string_enum!(RemoteIdType, "remote_id_type", {
    RemoteIdType::Standard => "standard",
    RemoteIdType::Broadcast => "broadcast",
    RemoteIdType::Network => "network",
});

string_enum!(ComplianceStatus, "compliance_status", {
    ComplianceStatus::Compliant => "compliant",
    ComplianceStatus::NonCompliant => "non_compliant",
    ComplianceStatus::Warning => "warning",
    ComplianceStatus::Pending => "pending",
    ComplianceStatus::Processing => "processing",
});

string_enum!(NotificationKind, "notification_type", {
    NotificationKind::RegistrationExpiry => "registration_expiry",
    NotificationKind::CertificateExpiry => "certificate_expiry",
    NotificationKind::ComplianceViolation => "compliance_violation",
});

/// A registered aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aircraft {
    /// Identifier assigned by the store.
    pub id: i64,
    /// Owning user.
    pub user_id: String,
    /// FAA registration number.
    pub registration_number: String,
    /// Registration expiry; `None` when unknown.
    pub registration_expiry: Option<NaiveDate>,
    /// Manufacturer name.
    pub manufacturer: String,
    /// Model name.
    pub model: String,
    /// Takeoff weight in pounds; `None` when unknown.
    pub weight_lbs: Option<f64>,
    /// Remote ID serial number.
    pub remote_id_serial: Option<String>,
    /// Remote ID implementation.
    pub remote_id_type: RemoteIdType,
    /// Operating status.
    pub status: AircraftStatus,
}

/// Fields for registering a new aircraft.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewAircraft {
    /// Owning user.
    pub user_id: String,
    /// FAA registration number.
    pub registration_number: String,
    /// Registration expiry.
    pub registration_expiry: Option<NaiveDate>,
    /// Manufacturer name.
    pub manufacturer: String,
    /// Model name.
    pub model: String,
    /// Takeoff weight in pounds.
    pub weight_lbs: Option<f64>,
    /// Remote ID serial number.
    pub remote_id_serial: Option<String>,
    /// Remote ID implementation.
    pub remote_id_type: RemoteIdType,
}

impl NewAircraft {
    /// Check the invariants the store enforces before inserting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] when the registration number is blank
    /// or the weight is negative or not finite.
    pub fn validate(&self) -> crate::Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::invalid_record("user_id", "must not be empty"));
        }
        if self.registration_number.trim().is_empty() {
            return Err(Error::invalid_record(
                "registration_number",
                "must not be empty",
            ));
        }
        if let Some(weight) = self.weight_lbs {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::invalid_record(
                    "weight_lbs",
                    format!("must be a non-negative number, got {weight}"),
                ));
            }
        }
        Ok(())
    }
}

/// The certificate portion of a pilot profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PilotCertificate {
    /// Owning user.
    pub user_id: String,
    /// Remote Pilot Certificate number.
    pub certificate_number: String,
    /// Certificate expiry; `None` when unknown.
    pub expiry: Option<NaiveDate>,
}

/// A logged flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    /// Identifier assigned by the store.
    pub id: i64,
    /// Operating pilot.
    pub pilot_id: String,
    /// Aircraft flown.
    pub aircraft_id: i64,
    /// Takeoff time.
    pub start_time: DateTime<Utc>,
    /// Landing time.
    pub end_time: Option<DateTime<Utc>>,
    /// Duration in minutes.
    pub duration_minutes: Option<f64>,
    /// Maximum altitude above ground in feet.
    pub max_altitude_ft: Option<f64>,
    /// Whether Remote ID broadcast was confirmed for this flight.
    pub remote_id_verified: bool,
    /// LAANC or waiver reference.
    pub airspace_authorization_id: Option<String>,
    /// Cached compliance status.
    pub compliance_status: ComplianceStatus,
    /// Fingerprint of the verdict that produced the cached status.
    pub verdict_fingerprint: Option<String>,
}

/// Fields for logging a new flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFlight {
    /// Operating pilot.
    pub pilot_id: String,
    /// Aircraft flown.
    pub aircraft_id: i64,
    /// Takeoff time.
    pub start_time: DateTime<Utc>,
    /// Landing time.
    pub end_time: Option<DateTime<Utc>>,
    /// Duration in minutes.
    pub duration_minutes: Option<f64>,
    /// Maximum altitude above ground in feet.
    pub max_altitude_ft: Option<f64>,
    /// Whether Remote ID broadcast was confirmed.
    pub remote_id_verified: bool,
    /// LAANC or waiver reference.
    pub airspace_authorization_id: Option<String>,
}

impl NewFlight {
    /// Duration in minutes, derived from the end time when not given.
    #[must_use]
    pub fn resolved_duration(&self) -> Option<f64> {
        self.duration_minutes.or_else(|| {
            self.end_time.map(|end| {
                #[allow(clippy::cast_precision_loss)]
                let seconds = (end - self.start_time).num_seconds() as f64;
                seconds / 60.0
            })
        })
    }
}

/// A notification as recorded by the notification collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Identifier assigned by the store.
    pub id: i64,
    /// Recipient.
    pub user_id: String,
    /// Short title; contains the subject used for de-duplication.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Category.
    pub kind: NotificationKind,
    /// Severity shown to the user.
    pub severity: Severity,
    /// Structured payload.
    pub data: serde_json::Value,
    /// When the notification was created.
    pub created_at: DateTime<Utc>,
    /// Whether the user has read it.
    pub read: bool,
}

/// A notification about to be recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    /// Recipient.
    pub user_id: String,
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Category.
    pub kind: NotificationKind,
    /// Severity shown to the user.
    pub severity: Severity,
    /// Structured payload.
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Success < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn test_compliance_status_strings() {
        assert_eq!(ComplianceStatus::NonCompliant.to_string(), "non_compliant");
        assert_eq!(
            "processing".parse::<ComplianceStatus>().unwrap(),
            ComplianceStatus::Processing
        );
        assert!("bogus".parse::<ComplianceStatus>().is_err());
    }

    #[test]
    fn test_serde_matches_as_str() {
        let json = serde_json::to_string(&NotificationKind::RegistrationExpiry).unwrap();
        assert_eq!(json, "\"registration_expiry\"");
        let json = serde_json::to_string(&AircraftStatus::Maintenance).unwrap();
        assert_eq!(json, "\"maintenance\"");
    }

    #[test]
    fn test_new_aircraft_rejects_negative_weight() {
        let aircraft = NewAircraft {
            user_id: "u1".to_string(),
            registration_number: "FA3XYZ1234".to_string(),
            weight_lbs: Some(-1.0),
            ..NewAircraft::default()
        };
        let err = aircraft.validate().unwrap_err();
        assert!(err.to_string().contains("weight_lbs"));
    }

    #[test]
    fn test_new_aircraft_allows_missing_weight() {
        let aircraft = NewAircraft {
            user_id: "u1".to_string(),
            registration_number: "FA3XYZ1234".to_string(),
            ..NewAircraft::default()
        };
        assert!(aircraft.validate().is_ok());
    }

    #[test]
    fn test_resolved_duration_from_end_time() {
        let start = "2026-03-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let flight = NewFlight {
            pilot_id: "u1".to_string(),
            aircraft_id: 1,
            start_time: start,
            end_time: Some(start + chrono::Duration::minutes(25)),
            duration_minutes: None,
            max_altitude_ft: None,
            remote_id_verified: false,
            airspace_authorization_id: None,
        };
        assert_eq!(flight.resolved_duration(), Some(25.0));
    }
}
