//! Fleet-level aggregation: compliance score, expiry summary, and the list of
//! violations inside a time window.
//!
//! Every flight and aircraft is evaluated independently; nothing here depends
//! on iteration order except the final sort.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::expiry::{evaluate_expiry, ExpiryState, ExpiryStatus};
use crate::model::{AircraftStatus, ComplianceStatus, Severity};
use crate::policy::{lookback_start, ExpiryPolicy};
use crate::storage::FleetRecords;
use crate::validator::{expiry_finding, load_join, validate_flight, FindingKind};

/// Percentage of compliant flights, rounded to the nearest whole number.
///
/// An empty list scores 100: no flights means no evidence of non-compliance.
#[must_use]
pub fn compute_score<I>(statuses: I) -> u8
where
    I: IntoIterator<Item = ComplianceStatus>,
{
    let (compliant, total) = statuses
        .into_iter()
        .fold((0u64, 0u64), |(compliant, total), status| {
            (
                compliant + u64::from(status == ComplianceStatus::Compliant),
                total + 1,
            )
        });

    if total == 0 {
        return 100;
    }
    // Rounds half up, matching Math.round for non-negative ratios.
    let score = (compliant * 200 + total) / (total * 2);
    u8::try_from(score).unwrap_or(100)
}

/// Inclusive bounds on flight start time. `None` leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Earliest start time included.
    pub from: Option<DateTime<Utc>>,
    /// Latest start time included.
    pub to: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// Every flight ever logged.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// The trailing `days` days ending at `now`.
    #[must_use]
    pub fn last_days(days: i64, now: DateTime<Utc>) -> Self {
        Self {
            from: Some(lookback_start(now, days)),
            to: Some(now),
        }
    }
}

/// What an upcoming expiration refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationKind {
    /// The pilot's Part 107 certificate.
    Certificate,
    /// An aircraft registration.
    Registration,
}

/// One entry in the upcoming-expirations list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcomingExpiration {
    /// Certificate or registration.
    #[serde(rename = "type")]
    pub kind: ExpirationKind,
    /// Certificate number or registration number.
    pub item: String,
    /// Aircraft the registration belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aircraft_id: Option<i64>,
    /// Classification of the expiry date.
    #[serde(flatten)]
    pub expiry: ExpiryStatus,
}

impl UpcomingExpiration {
    /// Sort key: days remaining, with unknown dates treated as due today.
    #[must_use]
    pub fn urgency_days(&self) -> i64 {
        self.expiry.days_remaining.unwrap_or(0)
    }
}

/// Dashboard summary for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    /// Compliance score, 0 to 100.
    pub score: u8,
    /// Flights in the window.
    pub total_flights: usize,
    /// Flights with status `compliant`.
    pub compliant_flights: usize,
    /// Flights with status `non_compliant`.
    pub non_compliant_flights: usize,
    /// Flights with status `warning`.
    pub warning_flights: usize,
    /// Flights still `pending` or `processing`.
    pub pending_flights: usize,
    /// Certificate and registration dates needing attention, soonest first.
    pub upcoming_expirations: Vec<UpcomingExpiration>,
    /// Start time of the most recent flight in the window.
    pub last_flight_date: Option<DateTime<Utc>>,
    /// Records that could not be evaluated.
    pub errors: Vec<String>,
}

/// Build the compliance summary for a user.
///
/// Certificate and aircraft load failures are reported in `errors` rather
/// than failing the summary.
///
/// # Errors
///
/// Returns an error if the user's flights cannot be listed.
pub fn summarize<S: FleetRecords + ?Sized>(
    store: &S,
    user_id: &str,
    window: TimeWindow,
    today: NaiveDate,
) -> Result<ComplianceSummary> {
    let flights = store.flights_for_pilot(user_id, window.from, window.to)?;

    let count = |wanted: &[ComplianceStatus]| {
        flights
            .iter()
            .filter(|f| wanted.contains(&f.compliance_status))
            .count()
    };

    let mut errors = Vec::new();
    let upcoming_expirations = upcoming_expirations(store, user_id, today, &mut errors);

    let summary = ComplianceSummary {
        score: compute_score(flights.iter().map(|f| f.compliance_status)),
        total_flights: flights.len(),
        compliant_flights: count(&[ComplianceStatus::Compliant]),
        non_compliant_flights: count(&[ComplianceStatus::NonCompliant]),
        warning_flights: count(&[ComplianceStatus::Warning]),
        pending_flights: count(&[ComplianceStatus::Pending, ComplianceStatus::Processing]),
        upcoming_expirations,
        last_flight_date: flights.iter().map(|f| f.start_time).max(),
        errors,
    };

    debug!(
        user_id,
        score = summary.score,
        flights = summary.total_flights,
        "built compliance summary"
    );
    Ok(summary)
}

fn upcoming_expirations<S: FleetRecords + ?Sized>(
    store: &S,
    user_id: &str,
    today: NaiveDate,
    errors: &mut Vec<String>,
) -> Vec<UpcomingExpiration> {
    let mut upcoming = Vec::new();

    match store.certificate(user_id) {
        Ok(Some(certificate)) => upcoming.push(UpcomingExpiration {
            kind: ExpirationKind::Certificate,
            item: certificate.certificate_number,
            aircraft_id: None,
            expiry: evaluate_expiry(certificate.expiry, &ExpiryPolicy::PART107, today),
        }),
        Ok(None) => {}
        Err(e) => {
            warn!(user_id, error = %e, "failed to load pilot certificate");
            errors.push(format!("certificate: {e}"));
        }
    }

    match store.aircraft_for_user(user_id) {
        Ok(fleet) => {
            upcoming.extend(
                fleet
                    .into_iter()
                    .filter(|a| a.status == AircraftStatus::Active)
                    .map(|a| UpcomingExpiration {
                        kind: ExpirationKind::Registration,
                        expiry: evaluate_expiry(
                            a.registration_expiry,
                            &ExpiryPolicy::REGISTRATION,
                            today,
                        ),
                        item: a.registration_number,
                        aircraft_id: Some(a.id),
                    }),
            );
        }
        Err(e) => {
            warn!(user_id, error = %e, "failed to load aircraft");
            errors.push(format!("aircraft: {e}"));
        }
    }

    upcoming.retain(|u| u.expiry.status != ExpiryState::Valid);
    upcoming.sort_by_key(UpcomingExpiration::urgency_days);
    upcoming
}

/// A violation or warning reported for a time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowViolation {
    /// Flight the finding belongs to; `None` for standing findings.
    pub flight_id: Option<i64>,
    /// Aircraft involved, when known.
    pub aircraft_id: Option<i64>,
    /// Flight start time, or the evaluation date for standing findings.
    pub occurred_at: DateTime<Utc>,
    /// Rule that produced it.
    #[serde(rename = "type")]
    pub kind: FindingKind,
    /// Human-readable explanation.
    pub message: String,
    /// Severity.
    pub severity: Severity,
}

/// Violations and warnings for a user inside `[from, to]`, newest first.
///
/// Flights whose cached status is `non_compliant` or `warning` are
/// re-validated. Standing certificate and registration findings are added
/// regardless of flights and dated `today`.
///
/// # Errors
///
/// Returns an error if the user's flights cannot be listed.
pub fn violations_for_window<S: FleetRecords + ?Sized>(
    store: &S,
    user_id: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    today: NaiveDate,
) -> Result<Vec<WindowViolation>> {
    let flights = store.flights_for_pilot(user_id, Some(from), Some(to))?;
    let mut violations = Vec::new();

    for flight in flights.iter().filter(|f| {
        matches!(
            f.compliance_status,
            ComplianceStatus::NonCompliant | ComplianceStatus::Warning
        )
    }) {
        let (aircraft, certificate) = load_join(store, flight);
        let verdict = validate_flight(flight, aircraft.as_ref(), certificate.as_ref(), today);
        violations.extend(
            verdict
                .violations
                .into_iter()
                .chain(verdict.warnings)
                .map(|finding| WindowViolation {
                    flight_id: Some(flight.id),
                    aircraft_id: Some(flight.aircraft_id),
                    occurred_at: flight.start_time,
                    kind: finding.kind,
                    message: finding.message,
                    severity: finding.severity,
                }),
        );
    }

    violations.extend(standing_findings(store, user_id, today));
    violations.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    Ok(violations)
}

fn standing_findings<S: FleetRecords + ?Sized>(
    store: &S,
    user_id: &str,
    today: NaiveDate,
) -> Vec<WindowViolation> {
    let occurred_at = today.and_time(NaiveTime::MIN).and_utc();
    let standing = |kind, aircraft_id, message: String, severity| WindowViolation {
        flight_id: None,
        aircraft_id,
        occurred_at,
        kind,
        message,
        severity,
    };
    let mut findings = Vec::new();

    match store.certificate(user_id) {
        Ok(Some(certificate)) => {
            let status = evaluate_expiry(certificate.expiry, &ExpiryPolicy::PART107, today);
            if let Some(finding) = expiry_finding(FindingKind::Certificate, &status) {
                findings.push(standing(finding.kind, None, finding.message, finding.severity));
            }
        }
        Ok(None) => findings.push(standing(
            FindingKind::DataMissing,
            None,
            "No pilot certificate on file".to_string(),
            Severity::Error,
        )),
        Err(e) => {
            warn!(user_id, error = %e, "failed to load pilot certificate");
            findings.push(standing(
                FindingKind::DataMissing,
                None,
                format!("Pilot certificate unavailable: {e}"),
                Severity::Error,
            ));
        }
    }

    match store.aircraft_for_user(user_id) {
        Ok(fleet) => {
            for aircraft in fleet
                .iter()
                .filter(|a| a.status == AircraftStatus::Active)
            {
                let status = evaluate_expiry(
                    aircraft.registration_expiry,
                    &ExpiryPolicy::REGISTRATION,
                    today,
                );
                if let Some(finding) = expiry_finding(FindingKind::Registration, &status) {
                    findings.push(standing(
                        finding.kind,
                        Some(aircraft.id),
                        format!("{}: {}", aircraft.registration_number, finding.message),
                        finding.severity,
                    ));
                }
            }
        }
        Err(e) => {
            warn!(user_id, error = %e, "failed to load aircraft");
            findings.push(standing(
                FindingKind::DataMissing,
                None,
                format!("Aircraft records unavailable: {e}"),
                Severity::Error,
            ));
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ComplianceStatus::{Compliant, NonCompliant, Pending, Processing, Warning};
    use crate::model::{NewAircraft, NewFlight, PilotCertificate, RemoteIdType};
    use crate::storage::Storage;
    use crate::validator::evaluate_and_record;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()
    }

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn add_aircraft(store: &Storage, user: &str, reg: &str, days: Option<i64>) -> i64 {
        store
            .insert_aircraft(&NewAircraft {
                user_id: user.to_string(),
                registration_number: reg.to_string(),
                registration_expiry: days.map(|d| today() + Duration::days(d)),
                manufacturer: "DJI".to_string(),
                model: "Air 3".to_string(),
                weight_lbs: Some(1.6),
                remote_id_serial: Some("SN1".to_string()),
                remote_id_type: RemoteIdType::Standard,
            })
            .unwrap()
    }

    fn set_certificate(store: &Storage, user: &str, days: Option<i64>) {
        store
            .upsert_certificate(&PilotCertificate {
                user_id: user.to_string(),
                certificate_number: "4099999".to_string(),
                expiry: days.map(|d| today() + Duration::days(d)),
            })
            .unwrap();
    }

    fn add_flight(store: &Storage, user: &str, aircraft_id: i64, start: &str, alt: f64) -> i64 {
        store
            .insert_flight(&NewFlight {
                pilot_id: user.to_string(),
                aircraft_id,
                start_time: ts(start),
                end_time: None,
                duration_minutes: Some(12.0),
                max_altitude_ft: Some(alt),
                remote_id_verified: true,
                airspace_authorization_id: None,
            })
            .unwrap()
    }

    #[test]
    fn test_score_empty_is_100() {
        assert_eq!(compute_score(Vec::<ComplianceStatus>::new()), 100);
    }

    #[test]
    fn test_score_half() {
        assert_eq!(compute_score([Compliant, Compliant, NonCompliant, NonCompliant]), 50);
    }

    #[test]
    fn test_score_single_compliant() {
        assert_eq!(compute_score([Compliant]), 100);
    }

    #[test]
    fn test_score_rounds_to_nearest() {
        assert_eq!(compute_score([Compliant, Warning, Pending]), 33);
        assert_eq!(compute_score([Compliant, Compliant, Warning]), 67);
        let one_in_eight = [Compliant].into_iter().chain([NonCompliant; 7]);
        assert_eq!(compute_score(one_in_eight), 13);
        assert_eq!(compute_score([NonCompliant]), 0);
    }

    #[test]
    fn test_window_last_days() {
        let now = ts("2026-07-01T12:00:00Z");
        let window = TimeWindow::last_days(30, now);
        assert_eq!(window.from, Some(ts("2026-06-01T12:00:00Z")));
        assert_eq!(window.to, Some(now));
        assert_eq!(TimeWindow::all(), TimeWindow { from: None, to: None });
    }

    #[test]
    fn test_window_last_days_clamps_huge_lookback() {
        let now = ts("2026-07-01T12:00:00Z");
        let window = TimeWindow::last_days(i64::MAX, now);
        assert_eq!(window.from, Some(DateTime::<Utc>::MIN_UTC));
        assert_eq!(window.to, Some(now));
    }

    #[test]
    fn test_summary_counts_and_score() {
        let store = Storage::open_in_memory().unwrap();
        let ac = add_aircraft(&store, "u1", "FA1", Some(365));
        set_certificate(&store, "u1", Some(365));

        let ok = add_flight(&store, "u1", ac, "2026-06-10T10:00:00Z", 200.0);
        let high = add_flight(&store, "u1", ac, "2026-06-12T10:00:00Z", 480.0);
        let pending = add_flight(&store, "u1", ac, "2026-06-14T10:00:00Z", 100.0);
        evaluate_and_record(&store, ok, today()).unwrap();
        evaluate_and_record(&store, high, today()).unwrap();
        store.record_verdict(pending, Processing, "").unwrap();

        let summary = summarize(&store, "u1", TimeWindow::all(), today()).unwrap();
        assert_eq!(summary.total_flights, 3);
        assert_eq!(summary.compliant_flights, 1);
        assert_eq!(summary.non_compliant_flights, 1);
        assert_eq!(summary.pending_flights, 1);
        assert_eq!(summary.warning_flights, 0);
        assert_eq!(summary.score, 33);
        assert_eq!(summary.last_flight_date, Some(ts("2026-06-14T10:00:00Z")));
        assert!(summary.upcoming_expirations.is_empty());
        assert!(summary.errors.is_empty());
    }

    #[test]
    fn test_summary_window_filters_flights() {
        let store = Storage::open_in_memory().unwrap();
        let ac = add_aircraft(&store, "u1", "FA1", Some(365));
        add_flight(&store, "u1", ac, "2026-01-10T10:00:00Z", 200.0);
        add_flight(&store, "u1", ac, "2026-06-20T10:00:00Z", 200.0);

        let window = TimeWindow::last_days(30, ts("2026-07-01T00:00:00Z"));
        let summary = summarize(&store, "u1", window, today()).unwrap();
        assert_eq!(summary.total_flights, 1);
    }

    #[test]
    fn test_summary_with_no_flights_scores_100() {
        let store = Storage::open_in_memory().unwrap();
        let summary = summarize(&store, "nobody", TimeWindow::all(), today()).unwrap();
        assert_eq!(summary.score, 100);
        assert_eq!(summary.total_flights, 0);
        assert_eq!(summary.last_flight_date, None);
    }

    #[test]
    fn test_upcoming_expirations_sorted_and_filtered() {
        let store = Storage::open_in_memory().unwrap();
        set_certificate(&store, "u1", Some(45));
        add_aircraft(&store, "u1", "FA-VALID", Some(200));
        add_aircraft(&store, "u1", "FA-SOON", Some(5));
        add_aircraft(&store, "u1", "FA-UNKNOWN", None);
        add_aircraft(&store, "u1", "FA-LAPSED", Some(-3));
        let retired = add_aircraft(&store, "u1", "FA-RETIRED", Some(2));
        store
            .set_aircraft_status(retired, AircraftStatus::Retired)
            .unwrap();

        let summary = summarize(&store, "u1", TimeWindow::all(), today()).unwrap();
        let items: Vec<&str> = summary
            .upcoming_expirations
            .iter()
            .map(|u| u.item.as_str())
            .collect();
        assert_eq!(items, vec!["FA-LAPSED", "FA-UNKNOWN", "FA-SOON", "4099999"]);
        assert_eq!(
            summary.upcoming_expirations[3].kind,
            ExpirationKind::Certificate
        );
        assert_eq!(summary.upcoming_expirations[0].expiry.status, ExpiryState::Expired);
    }

    #[test]
    fn test_upcoming_expiration_serializes_flat() {
        let entry = UpcomingExpiration {
            kind: ExpirationKind::Registration,
            item: "FA1".to_string(),
            aircraft_id: Some(3),
            expiry: evaluate_expiry(Some(today()), &ExpiryPolicy::REGISTRATION, today()),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "registration");
        assert_eq!(json["status"], "critical");
        assert_eq!(json["days_remaining"], 0);
    }

    #[test]
    fn test_violations_for_window_merges_and_sorts() {
        let store = Storage::open_in_memory().unwrap();
        let ac = add_aircraft(&store, "u1", "FA1", Some(10));
        set_certificate(&store, "u1", Some(365));

        let early = add_flight(&store, "u1", ac, "2026-06-02T10:00:00Z", 450.0);
        let late = add_flight(&store, "u1", ac, "2026-06-20T10:00:00Z", 150.0);
        let outside = add_flight(&store, "u1", ac, "2026-04-01T10:00:00Z", 900.0);
        for id in [early, late, outside] {
            evaluate_and_record(&store, id, today()).unwrap();
        }

        let found = violations_for_window(
            &store,
            "u1",
            ts("2026-06-01T00:00:00Z"),
            ts("2026-06-30T23:59:59Z"),
            today(),
        )
        .unwrap();

        assert!(found.iter().all(|v| v.flight_id != Some(outside)));
        // standing registration warning first, then the late flight, then the early one
        assert_eq!(found[0].flight_id, None);
        assert_eq!(found[0].kind, FindingKind::Registration);
        assert_eq!(found[1].flight_id, Some(late));
        let early_kinds: Vec<FindingKind> = found
            .iter()
            .filter(|v| v.flight_id == Some(early))
            .map(|v| v.kind)
            .collect();
        assert!(early_kinds.contains(&FindingKind::Airspace));
        assert!(early_kinds.contains(&FindingKind::Registration));
        for pair in found.windows(2) {
            assert!(pair[0].occurred_at >= pair[1].occurred_at);
        }
    }

    #[test]
    fn test_violations_for_window_skips_compliant_flights() {
        let store = Storage::open_in_memory().unwrap();
        let ac = add_aircraft(&store, "u1", "FA1", Some(365));
        set_certificate(&store, "u1", Some(365));
        let id = add_flight(&store, "u1", ac, "2026-06-02T10:00:00Z", 100.0);
        evaluate_and_record(&store, id, today()).unwrap();

        let found = violations_for_window(
            &store,
            "u1",
            ts("2026-06-01T00:00:00Z"),
            ts("2026-06-30T00:00:00Z"),
            today(),
        )
        .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_violations_for_window_reports_missing_records() {
        let store = Storage::open_in_memory().unwrap();
        let ac = add_aircraft(&store, "u1", "FA1", Some(365));
        let id = add_flight(&store, "u1", ac, "2026-06-02T10:00:00Z", 100.0);
        evaluate_and_record(&store, id, today()).unwrap();
        store.delete_aircraft(ac).unwrap();

        let found = violations_for_window(
            &store,
            "u1",
            ts("2026-06-01T00:00:00Z"),
            ts("2026-06-30T00:00:00Z"),
            today(),
        )
        .unwrap();

        let flight_kinds: Vec<FindingKind> = found
            .iter()
            .filter(|v| v.flight_id == Some(id))
            .map(|v| v.kind)
            .collect();
        assert_eq!(flight_kinds, vec![FindingKind::DataMissing, FindingKind::DataMissing]);
        assert!(found
            .iter()
            .any(|v| v.flight_id.is_none() && v.kind == FindingKind::DataMissing));
    }
}
