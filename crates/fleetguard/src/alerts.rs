//! Expiry alerts with a trailing de-duplication window.
//!
//! The daily sweep looks for registrations and certificates that expire
//! exactly N days from today, for each configured N, and records one
//! notification per match unless an equivalent one was recorded recently.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::expiry::evaluate_expiry;
use crate::model::{
    Aircraft, ComplianceStatus, Flight, NewNotification, Notification, NotificationKind,
    PilotCertificate, Severity,
};
use crate::policy::{
    days_after, window_start, ExpiryPolicy, DEDUPE_WINDOW_HOURS, PART107_ALERT_DAYS,
    REGISTRATION_ALERT_DAYS,
};
use crate::storage::FleetRecords;
use crate::validator::ComplianceVerdict;

/// What an alert is about: its kind plus the subject named in its title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertCategory {
    /// Notification kind.
    pub kind: NotificationKind,
    /// Title prefix identifying the subject. Ends in a space so that
    /// `FA1` never matches a title about `FA12`.
    pub subject: String,
}

impl AlertCategory {
    /// Category for an aircraft registration.
    #[must_use]
    pub fn registration(registration_number: &str) -> Self {
        Self {
            kind: NotificationKind::RegistrationExpiry,
            subject: format!("Registration {registration_number} "),
        }
    }

    /// Category for a pilot certificate.
    #[must_use]
    pub fn certificate(certificate_number: &str) -> Self {
        Self {
            kind: NotificationKind::CertificateExpiry,
            subject: format!("Part 107 certificate {certificate_number} "),
        }
    }

    /// Title for an expiry alert in this category.
    #[must_use]
    pub fn expiring_title(&self) -> String {
        format!("{}expiring", self.subject)
    }
}

/// Whether an alert for `category` should be emitted now.
///
/// Returns `false` if `history` holds a notification for the same user and
/// kind, whose title contains the subject, created in `(now - window, now]`.
#[must_use]
pub fn should_notify(
    history: &[Notification],
    user_id: &str,
    category: &AlertCategory,
    window: Duration,
    now: DateTime<Utc>,
) -> bool {
    let since = window_start(now, window);
    !history.iter().any(|n| {
        n.user_id == user_id
            && n.kind == category.kind
            && n.title.contains(&category.subject)
            && n.created_at > since
            && n.created_at <= now
    })
}

/// Notification content before it is addressed to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationDraft {
    /// Short title; must contain the category subject.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Severity shown to the user.
    pub severity: Severity,
    /// Structured payload.
    pub data: serde_json::Value,
}

/// Result of [`AlertTrigger::notify_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Recorded with the given notification id.
    Sent(i64),
    /// Suppressed by the de-duplication window.
    Suppressed,
}

/// Records notifications, suppressing repeats inside a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertTrigger {
    dedupe_window: Duration,
}

impl Default for AlertTrigger {
    fn default() -> Self {
        Self::new(Duration::hours(DEDUPE_WINDOW_HOURS))
    }
}

impl AlertTrigger {
    /// Create a trigger with the given de-duplication window.
    #[must_use]
    pub fn new(dedupe_window: Duration) -> Self {
        Self { dedupe_window }
    }

    /// The de-duplication window.
    #[must_use]
    pub fn dedupe_window(&self) -> Duration {
        self.dedupe_window
    }

    /// Record `draft` for `user_id` unless an equivalent notification exists
    /// inside the window.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be read or the notification
    /// cannot be written.
    pub fn notify_once<S: FleetRecords + ?Sized>(
        &self,
        store: &S,
        user_id: &str,
        category: &AlertCategory,
        draft: NotificationDraft,
        now: DateTime<Utc>,
    ) -> Result<Delivery> {
        let since = window_start(now, self.dedupe_window);
        let history = store.recent_notifications(user_id, category.kind, since)?;
        if !should_notify(&history, user_id, category, self.dedupe_window, now) {
            debug!(user_id, subject = %category.subject, kind = %category.kind, "alert suppressed");
            return Ok(Delivery::Suppressed);
        }

        let notification = NewNotification {
            user_id: user_id.to_string(),
            title: draft.title,
            message: draft.message,
            kind: category.kind,
            severity: draft.severity,
            data: draft.data,
        };
        let id = store.insert_notification(&notification, now)?;
        Ok(Delivery::Sent(id))
    }
}

/// Record a compliance-violation notification for a non-compliant verdict.
///
/// Returns `None` when the verdict is not `non_compliant`.
///
/// # Errors
///
/// Returns an error if the notification history or write fails.
pub fn notify_violation<S: FleetRecords + ?Sized>(
    store: &S,
    trigger: &AlertTrigger,
    flight: &Flight,
    verdict: &ComplianceVerdict,
    now: DateTime<Utc>,
) -> Result<Option<Delivery>> {
    if verdict.status != ComplianceStatus::NonCompliant {
        return Ok(None);
    }

    let category = AlertCategory {
        kind: NotificationKind::ComplianceViolation,
        subject: format!("Flight {} ", flight.id),
    };
    let summary: Vec<&str> = verdict.violations.iter().map(|v| v.message.as_str()).collect();
    let draft = NotificationDraft {
        title: format!("Flight {} is non-compliant", flight.id),
        message: summary.join("; "),
        severity: Severity::Error,
        data: json!({
            "flight_id": flight.id,
            "aircraft_id": flight.aircraft_id,
            "violations": verdict.violations,
        }),
    };
    trigger
        .notify_once(store, &flight.pilot_id, &category, draft, now)
        .map(Some)
}

/// Alert distances and window used by [`run_sweep`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Days before registration expiry on which to alert.
    pub registration_days: Vec<i64>,
    /// Days before certificate expiry on which to alert.
    pub certificate_days: Vec<i64>,
    /// De-duplication window in hours.
    pub dedupe_window_hours: i64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            registration_days: REGISTRATION_ALERT_DAYS.to_vec(),
            certificate_days: PART107_ALERT_DAYS.to_vec(),
            dedupe_window_hours: DEDUPE_WINDOW_HOURS,
        }
    }
}

impl SweepSettings {
    /// Trigger configured with this window.
    ///
    /// # Errors
    ///
    /// Returns an error if the window does not fit in a `Duration`.
    pub fn trigger(&self) -> Result<AlertTrigger> {
        Duration::try_hours(self.dedupe_window_hours)
            .map(AlertTrigger::new)
            .ok_or_else(|| Error::ConfigValidation {
                message: format!(
                    "alerts.dedupe_window_hours out of range: {}",
                    self.dedupe_window_hours
                ),
            })
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Date the sweep ran for.
    pub date: Option<NaiveDate>,
    /// Registration alerts recorded.
    pub registration_alerts: usize,
    /// Certificate alerts recorded.
    pub certificate_alerts: usize,
    /// Alerts suppressed by the de-duplication window.
    pub suppressed: usize,
    /// Per-item failures; the sweep continues past them.
    pub errors: Vec<String>,
}

impl SweepReport {
    /// Total alerts recorded.
    #[must_use]
    pub fn sent(&self) -> usize {
        self.registration_alerts + self.certificate_alerts
    }
}

/// Run the expiry alert sweep for `today`.
///
/// Matching is on exact dates: a registration expiring on `today + N` alerts
/// only when N is a configured distance, so a missed day skips that alert.
#[must_use]
pub fn run_sweep<S: FleetRecords + ?Sized>(
    store: &S,
    settings: &SweepSettings,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> SweepReport {
    let mut report = SweepReport {
        date: Some(today),
        ..SweepReport::default()
    };
    let trigger = match settings.trigger() {
        Ok(trigger) => trigger,
        Err(e) => {
            warn!(error = %e, "expiry sweep skipped");
            report.errors.push(e.to_string());
            return report;
        }
    };

    for &days in &settings.registration_days {
        let Some(date) = days_after(today, days) else {
            warn!(days, "registration alert distance out of range");
            report
                .errors
                .push(format!("registration alert distance out of range: {days}"));
            continue;
        };
        let fleet = match store.active_aircraft_expiring_on(date) {
            Ok(fleet) => fleet,
            Err(e) => {
                warn!(%date, error = %e, "failed to list expiring registrations");
                report.errors.push(format!("registrations expiring {date}: {e}"));
                continue;
            }
        };
        for aircraft in fleet {
            let category = AlertCategory::registration(&aircraft.registration_number);
            let draft = registration_draft(&aircraft, &category, today);
            match trigger.notify_once(store, &aircraft.user_id, &category, draft, now) {
                Ok(Delivery::Sent(_)) => report.registration_alerts += 1,
                Ok(Delivery::Suppressed) => report.suppressed += 1,
                Err(e) => {
                    warn!(aircraft_id = aircraft.id, error = %e, "registration alert failed");
                    report
                        .errors
                        .push(format!("aircraft {}: {e}", aircraft.id));
                }
            }
        }
    }

    for &days in &settings.certificate_days {
        let Some(date) = days_after(today, days) else {
            warn!(days, "certificate alert distance out of range");
            report
                .errors
                .push(format!("certificate alert distance out of range: {days}"));
            continue;
        };
        let certificates = match store.certificates_expiring_on(date) {
            Ok(certificates) => certificates,
            Err(e) => {
                warn!(%date, error = %e, "failed to list expiring certificates");
                report.errors.push(format!("certificates expiring {date}: {e}"));
                continue;
            }
        };
        for certificate in certificates {
            let category = AlertCategory::certificate(&certificate.certificate_number);
            let draft = certificate_draft(&certificate, &category, today);
            match trigger.notify_once(store, &certificate.user_id, &category, draft, now) {
                Ok(Delivery::Sent(_)) => report.certificate_alerts += 1,
                Ok(Delivery::Suppressed) => report.suppressed += 1,
                Err(e) => {
                    warn!(user_id = %certificate.user_id, error = %e, "certificate alert failed");
                    report
                        .errors
                        .push(format!("certificate for {}: {e}", certificate.user_id));
                }
            }
        }
    }

    info!(
        %today,
        sent = report.sent(),
        suppressed = report.suppressed,
        errors = report.errors.len(),
        "expiry sweep finished"
    );
    report
}

fn registration_draft(
    aircraft: &Aircraft,
    category: &AlertCategory,
    today: NaiveDate,
) -> NotificationDraft {
    let status = evaluate_expiry(aircraft.registration_expiry, &ExpiryPolicy::REGISTRATION, today);
    NotificationDraft {
        title: category.expiring_title(),
        message: format!(
            "{} ({} {}). Renew it at FAADroneZone before it lapses.",
            status.message, aircraft.manufacturer, aircraft.model
        ),
        severity: status.severity,
        data: json!({
            "aircraft_id": aircraft.id,
            "registration_number": aircraft.registration_number,
            "expiry_date": aircraft.registration_expiry,
            "days_remaining": status.days_remaining,
        }),
    }
}

fn certificate_draft(
    certificate: &PilotCertificate,
    category: &AlertCategory,
    today: NaiveDate,
) -> NotificationDraft {
    let status = evaluate_expiry(certificate.expiry, &ExpiryPolicy::PART107, today);
    NotificationDraft {
        title: category.expiring_title(),
        message: format!(
            "{}. Complete the recurrent training to keep flying commercially.",
            status.message
        ),
        severity: status.severity,
        data: json!({
            "certificate_number": certificate.certificate_number,
            "expiry_date": certificate.expiry,
            "days_remaining": status.days_remaining,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AircraftStatus, NewAircraft, RemoteIdType};
    use crate::storage::Storage;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 10).unwrap()
    }

    fn now() -> DateTime<Utc> {
        "2026-05-10T06:00:00Z".parse().unwrap()
    }

    fn notification(
        user: &str,
        kind: NotificationKind,
        title: &str,
        at: DateTime<Utc>,
    ) -> Notification {
        Notification {
            id: 1,
            user_id: user.to_string(),
            title: title.to_string(),
            message: String::new(),
            kind,
            severity: Severity::Warning,
            data: serde_json::Value::Null,
            created_at: at,
            read: false,
        }
    }

    fn draft(title: &str) -> NotificationDraft {
        NotificationDraft {
            title: title.to_string(),
            message: "renew soon".to_string(),
            severity: Severity::Warning,
            data: json!({}),
        }
    }

    fn add_aircraft(store: &Storage, user: &str, reg: &str, days: i64) -> i64 {
        store
            .insert_aircraft(&NewAircraft {
                user_id: user.to_string(),
                registration_number: reg.to_string(),
                registration_expiry: Some(today() + Duration::days(days)),
                manufacturer: "Skydio".to_string(),
                model: "X10".to_string(),
                weight_lbs: Some(4.7),
                remote_id_serial: None,
                remote_id_type: RemoteIdType::Standard,
            })
            .unwrap()
    }

    fn set_certificate(store: &Storage, user: &str, number: &str, days: i64) {
        store
            .upsert_certificate(&PilotCertificate {
                user_id: user.to_string(),
                certificate_number: number.to_string(),
                expiry: Some(today() + Duration::days(days)),
            })
            .unwrap();
    }

    #[test]
    fn test_should_notify_empty_history() {
        let category = AlertCategory::registration("FA123");
        assert!(should_notify(&[], "u1", &category, Duration::hours(24), now()));
    }

    #[test]
    fn test_should_notify_suppresses_recent_match() {
        let category = AlertCategory::registration("FA123");
        let history = vec![notification(
            "u1",
            NotificationKind::RegistrationExpiry,
            "Registration FA123 expiring",
            now() - Duration::hours(3),
        )];
        assert!(!should_notify(&history, "u1", &category, Duration::hours(24), now()));
    }

    #[test]
    fn test_should_notify_ignores_other_subjects_kinds_and_users() {
        let category = AlertCategory::registration("FA123");
        let recent = now() - Duration::hours(1);
        let title = "Registration FA123 expiring";
        let other = "Registration FA999 expiring";
        let history = vec![
            notification("u1", NotificationKind::RegistrationExpiry, other, recent),
            notification("u1", NotificationKind::CertificateExpiry, title, recent),
            notification("u2", NotificationKind::RegistrationExpiry, title, recent),
        ];
        assert!(should_notify(&history, "u1", &category, Duration::hours(24), now()));
    }

    #[test]
    fn test_should_notify_window_boundary_is_exclusive() {
        let category = AlertCategory::registration("FA123");
        let history = vec![notification(
            "u1",
            NotificationKind::RegistrationExpiry,
            "Registration FA123 expiring",
            now() - Duration::hours(24),
        )];
        assert!(should_notify(&history, "u1", &category, Duration::hours(24), now()));
    }

    #[test]
    fn test_should_notify_subject_is_not_a_prefix_match() {
        let category = AlertCategory::registration("FA1");
        let history = vec![notification(
            "u1",
            NotificationKind::RegistrationExpiry,
            &AlertCategory::registration("FA12").expiring_title(),
            now() - Duration::hours(1),
        )];
        assert!(should_notify(&history, "u1", &category, Duration::hours(24), now()));
    }

    #[test]
    fn test_notify_once_dedupe_sequence() {
        let store = Storage::open_in_memory().unwrap();
        let trigger = AlertTrigger::default();
        let category = AlertCategory::registration("FA123");
        let title = category.expiring_title();
        let first = now();

        let sent = trigger
            .notify_once(&store, "u1", &category, draft(&title), first)
            .unwrap();
        assert!(matches!(sent, Delivery::Sent(_)));

        let again = trigger
            .notify_once(
                &store,
                "u1",
                &category,
                draft(&title),
                first + Duration::hours(1),
            )
            .unwrap();
        assert_eq!(again, Delivery::Suppressed);

        let later = trigger
            .notify_once(
                &store,
                "u1",
                &category,
                draft(&title),
                first + Duration::hours(25),
            )
            .unwrap();
        assert!(matches!(later, Delivery::Sent(_)));

        assert_eq!(store.notifications_for_user("u1", false, 10).unwrap().len(), 2);
    }

    #[test]
    fn test_sweep_exact_date_matching() {
        let store = Storage::open_in_memory().unwrap();
        add_aircraft(&store, "u1", "FA-30", 30);
        add_aircraft(&store, "u1", "FA-29", 29);
        add_aircraft(&store, "u2", "FA-1", 1);
        let retired = add_aircraft(&store, "u2", "FA-RETIRED", 7);
        store
            .set_aircraft_status(retired, AircraftStatus::Retired)
            .unwrap();
        set_certificate(&store, "u1", "111", 60);
        set_certificate(&store, "u2", "222", 59);

        let report = run_sweep(&store, &SweepSettings::default(), today(), now());

        assert_eq!(report.registration_alerts, 2);
        assert_eq!(report.certificate_alerts, 1);
        assert_eq!(report.suppressed, 0);
        assert!(report.errors.is_empty());
        assert_eq!(report.date, Some(today()));

        let u1 = store.notifications_for_user("u1", false, 10).unwrap();
        let titles: Vec<&str> = u1.iter().map(|n| n.title.as_str()).collect();
        assert!(titles.contains(&"Registration FA-30 expiring"));
        assert!(titles.contains(&"Part 107 certificate 111 expiring"));
        assert!(!titles.iter().any(|t| t.contains("FA-29")));

        let u2 = store.notifications_for_user("u2", false, 10).unwrap();
        assert_eq!(u2.len(), 1);
        assert_eq!(u2[0].severity, Severity::Error);
        assert_eq!(u2[0].data["days_remaining"], 1);
    }

    #[test]
    fn test_sweep_rerun_is_suppressed() {
        let store = Storage::open_in_memory().unwrap();
        add_aircraft(&store, "u1", "FA-14", 14);
        set_certificate(&store, "u1", "333", 30);

        let first = run_sweep(&store, &SweepSettings::default(), today(), now());
        assert_eq!(first.sent(), 2);

        let second = run_sweep(
            &store,
            &SweepSettings::default(),
            today(),
            now() + Duration::hours(2),
        );
        assert_eq!(second.sent(), 0);
        assert_eq!(second.suppressed, 2);
    }

    #[test]
    fn test_sweep_respects_custom_distances() {
        let store = Storage::open_in_memory().unwrap();
        add_aircraft(&store, "u1", "FA-45", 45);
        let settings = SweepSettings {
            registration_days: vec![45],
            certificate_days: vec![],
            dedupe_window_hours: 24,
        };

        let report = run_sweep(&store, &settings, today(), now());
        assert_eq!(report.registration_alerts, 1);
    }

    #[test]
    fn test_sweep_similar_registrations_alert_separately() {
        let store = Storage::open_in_memory().unwrap();
        add_aircraft(&store, "u1", "FA12", 7);
        add_aircraft(&store, "u1", "FA1", 7);

        let report = run_sweep(&store, &SweepSettings::default(), today(), now());
        assert_eq!(report.registration_alerts, 2);
        assert_eq!(report.suppressed, 0);
    }

    #[test]
    fn test_sweep_oversized_window_is_reported() {
        let store = Storage::open_in_memory().unwrap();
        add_aircraft(&store, "u1", "FA-7", 7);
        let settings = SweepSettings {
            dedupe_window_hours: i64::MAX / 2,
            ..SweepSettings::default()
        };

        let report = run_sweep(&store, &settings, today(), now());
        assert_eq!(report.sent(), 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("dedupe_window_hours"));
    }

    #[test]
    fn test_sweep_oversized_distance_is_reported() {
        let store = Storage::open_in_memory().unwrap();
        add_aircraft(&store, "u1", "FA-7", 7);
        let settings = SweepSettings {
            registration_days: vec![1_000_000_000, 7],
            certificate_days: vec![i64::MAX],
            dedupe_window_hours: 24,
        };

        let report = run_sweep(&store, &settings, today(), now());
        assert_eq!(report.registration_alerts, 1);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors[0].contains("1000000000"));
    }

    #[test]
    fn test_huge_window_still_dedupes() {
        let store = Storage::open_in_memory().unwrap();
        let trigger = AlertTrigger::new(Duration::MAX);
        let category = AlertCategory::certificate("555");
        let title = category.expiring_title();

        let first = trigger
            .notify_once(&store, "u1", &category, draft(&title), now())
            .unwrap();
        assert!(matches!(first, Delivery::Sent(_)));
        let second = trigger
            .notify_once(
                &store,
                "u1",
                &category,
                draft(&title),
                now() + Duration::hours(1),
            )
            .unwrap();
        assert_eq!(second, Delivery::Suppressed);
    }

    #[test]
    fn test_notify_violation_only_for_non_compliant() {
        use crate::model::NewFlight;
        use crate::validator::evaluate_and_record;

        let store = Storage::open_in_memory().unwrap();
        let aircraft_id = add_aircraft(&store, "u1", "FA-OK", 200);
        set_certificate(&store, "u1", "444", 300);
        let mut flight_ids = Vec::new();
        for altitude in [120.0, 520.0] {
            let id = store
                .insert_flight(&NewFlight {
                    pilot_id: "u1".to_string(),
                    aircraft_id,
                    start_time: now() - Duration::hours(2),
                    end_time: None,
                    duration_minutes: Some(20.0),
                    max_altitude_ft: Some(altitude),
                    remote_id_verified: true,
                    airspace_authorization_id: None,
                })
                .unwrap();
            flight_ids.push(id);
        }

        let trigger = AlertTrigger::default();
        let mut deliveries = Vec::new();
        for id in &flight_ids {
            let verdict = evaluate_and_record(&store, *id, today()).unwrap();
            let flight = store.flight(*id).unwrap().unwrap();
            deliveries.push(notify_violation(&store, &trigger, &flight, &verdict, now()).unwrap());
        }

        assert_eq!(deliveries[0], None);
        assert!(matches!(deliveries[1], Some(Delivery::Sent(_))));

        let notes = store.notifications_for_user("u1", false, 10).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::ComplianceViolation);
        assert!(notes[0].message.contains("airspace authorization"));
    }

    #[test]
    fn test_sweep_report_serializes() {
        let report = SweepReport {
            date: Some(today()),
            registration_alerts: 2,
            certificate_alerts: 1,
            suppressed: 3,
            errors: vec![],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["date"], "2026-05-10");
        assert_eq!(json["suppressed"], 3);
    }
}
