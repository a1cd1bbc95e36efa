//! Regulatory thresholds and date arithmetic.
//!
//! Everything the evaluators compare against lives here, so adjusting a
//! threshold never touches evaluation logic.

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Aircraft heavier than this (250 g) must broadcast Remote ID.
pub const REMOTE_ID_WEIGHT_THRESHOLD_LBS: f64 = 0.55;

/// Part 107 small-UAS weight ceiling.
pub const PART107_MAX_WEIGHT_LBS: f64 = 55.0;

/// Altitude above which an airspace authorization is required.
pub const AIRSPACE_CEILING_FT: f64 = 400.0;

/// Registration notice window.
pub const REGISTRATION_WARNING_DAYS: i64 = 30;

/// Registration warning window.
pub const REGISTRATION_ATTENTION_DAYS: i64 = 14;

/// Registration critical window.
pub const REGISTRATION_CRITICAL_DAYS: i64 = 7;

/// Part 107 warning window.
pub const PART107_WARNING_DAYS: i64 = 60;

/// Part 107 critical window.
pub const PART107_CRITICAL_DAYS: i64 = 30;

/// Days before registration expiry on which the sweep sends alerts.
pub const REGISTRATION_ALERT_DAYS: &[i64] = &[30, 14, 7, 3, 1];

/// Days before certificate expiry on which the sweep sends alerts.
pub const PART107_ALERT_DAYS: &[i64] = &[60, 30, 14, 7];

/// Trailing window during which a repeat alert is suppressed.
pub const DEDUPE_WINDOW_HOURS: i64 = 24;

/// Largest configurable alert distance (ten years).
pub const MAX_ALERT_DAYS: i64 = 3650;

/// Largest configurable de-duplication window (one year).
pub const MAX_DEDUPE_WINDOW_HOURS: i64 = 8760;

/// Largest look-back accepted for reporting windows.
pub const MAX_LOOKBACK_DAYS: i64 = 36500;

/// Nested day windows used to classify an expiry date.
///
/// Windows are inclusive upper bounds on days remaining:
/// `0..=critical_days` is critical, `..=warning_days` is warning, and
/// `..=notice_days` (when present) is notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    /// Human label used in messages ("Registration", "Part 107 certificate").
    pub label: &'static str,
    /// Upper bound of the critical window.
    pub critical_days: i64,
    /// Upper bound of the warning window.
    pub warning_days: i64,
    /// Upper bound of the optional notice window.
    pub notice_days: Option<i64>,
}

impl ExpiryPolicy {
    /// Registration policy: 7 / 14 / 30 days.
    pub const REGISTRATION: Self = Self {
        label: "Registration",
        critical_days: REGISTRATION_CRITICAL_DAYS,
        warning_days: REGISTRATION_ATTENTION_DAYS,
        notice_days: Some(REGISTRATION_WARNING_DAYS),
    };

    /// Part 107 certificate policy: 30 / 60 days.
    pub const PART107: Self = Self {
        label: "Part 107 certificate",
        critical_days: PART107_CRITICAL_DAYS,
        warning_days: PART107_WARNING_DAYS,
        notice_days: None,
    };
}

/// Whole calendar days from `today` until `expiry`; negative once past.
#[must_use]
pub fn days_until(expiry: NaiveDate, today: NaiveDate) -> i64 {
    (expiry - today).num_days()
}

/// The date `days` after `date`, or `None` when it falls outside the
/// representable calendar.
#[must_use]
pub fn days_after(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    Duration::try_days(days)
        .and_then(|d| date.checked_add_signed(d))
}

/// Start of the trailing `window` ending at `now`, clamped to the earliest
/// representable instant.
#[must_use]
pub fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Start of the trailing `days` days ending at `now`, clamped like
/// [`window_start`].
#[must_use]
pub fn lookback_start(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .map_or(DateTime::<Utc>::MIN_UTC, |d| window_start(now, d))
}

/// Whether an aircraft of this weight must broadcast Remote ID.
///
/// Unknown weight is treated as not required.
#[must_use]
pub fn remote_id_required(weight_lbs: Option<f64>) -> bool {
    weight_lbs.is_some_and(|w| w > REMOTE_ID_WEIGHT_THRESHOLD_LBS)
}

/// Whether an aircraft of this weight exceeds the Part 107 ceiling.
#[must_use]
pub fn exceeds_weight_ceiling(weight_lbs: Option<f64>) -> bool {
    weight_lbs.is_some_and(|w| w > PART107_MAX_WEIGHT_LBS)
}

/// Whether a flight at this altitude needs an airspace authorization.
#[must_use]
pub fn requires_airspace_authorization(max_altitude_ft: Option<f64>) -> bool {
    max_altitude_ft.is_some_and(|alt| alt > AIRSPACE_CEILING_FT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_days_until_is_calendar_days() {
        assert_eq!(days_until(date("2026-05-10"), date("2026-05-03")), 7);
        assert_eq!(days_until(date("2026-05-03"), date("2026-05-03")), 0);
        assert_eq!(days_until(date("2026-05-01"), date("2026-05-03")), -2);
    }

    #[test]
    fn test_days_until_crosses_leap_day() {
        assert_eq!(days_until(date("2028-03-01"), date("2028-02-28")), 2);
    }

    #[test]
    fn test_remote_id_threshold_is_exclusive() {
        assert!(!remote_id_required(Some(0.55)));
        assert!(remote_id_required(Some(0.56)));
        assert!(!remote_id_required(None));
    }

    #[test]
    fn test_weight_ceiling_is_exclusive() {
        assert!(!exceeds_weight_ceiling(Some(55.0)));
        assert!(exceeds_weight_ceiling(Some(55.1)));
        assert!(!exceeds_weight_ceiling(None));
    }

    #[test]
    fn test_airspace_ceiling_is_exclusive() {
        assert!(!requires_airspace_authorization(Some(400.0)));
        assert!(requires_airspace_authorization(Some(401.0)));
        assert!(!requires_airspace_authorization(None));
    }

    #[test]
    fn test_days_after_out_of_range_is_none() {
        assert_eq!(days_after(date("2026-05-03"), 7), Some(date("2026-05-10")));
        assert_eq!(days_after(date("2026-05-03"), 1_000_000_000), None);
        assert_eq!(days_after(date("2026-05-03"), i64::MAX), None);
    }

    #[test]
    fn test_lookback_start_clamps() {
        let now: DateTime<Utc> = "2026-05-03T12:00:00Z".parse().unwrap();
        assert_eq!(
            lookback_start(now, 2),
            "2026-05-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(lookback_start(now, i64::MAX), DateTime::<Utc>::MIN_UTC);
        assert_eq!(window_start(now, Duration::MAX), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_policy_windows_nest() {
        for policy in [ExpiryPolicy::REGISTRATION, ExpiryPolicy::PART107] {
            assert!(policy.critical_days < policy.warning_days);
            if let Some(notice) = policy.notice_days {
                assert!(policy.warning_days < notice);
            }
        }
    }
}
