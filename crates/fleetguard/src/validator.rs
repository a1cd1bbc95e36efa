//! Per-flight compliance validation.
//!
//! [`validate_flight`] joins a flight with its aircraft and the pilot's
//! certificate and runs every check independently. Nothing short-circuits:
//! a flight with an expired registration still gets its altitude checked.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::expiry::{evaluate_expiry, ExpiryState, ExpiryStatus};
use crate::model::{Aircraft, ComplianceStatus, Flight, PilotCertificate, Severity};
use crate::policy::{
    exceeds_weight_ceiling, remote_id_required, requires_airspace_authorization, ExpiryPolicy,
    AIRSPACE_CEILING_FT, PART107_MAX_WEIGHT_LBS,
};
use crate::storage::FleetRecords;

/// Which rule produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Remote ID required but not verified.
    RemoteId,
    /// Aircraft registration expiry.
    Registration,
    /// Part 107 certificate expiry.
    Certificate,
    /// Aircraft above the Part 107 weight ceiling.
    Weight,
    /// Altitude above the ceiling without authorization.
    Airspace,
    /// Aircraft or certificate record could not be loaded.
    DataMissing,
}

impl FindingKind {
    /// Wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RemoteId => "remote_id",
            Self::Registration => "registration",
            Self::Certificate => "certificate",
            Self::Weight => "weight",
            Self::Airspace => "airspace",
            Self::DataMissing => "data_missing",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A violation or warning attached to a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Rule that produced it.
    pub kind: FindingKind,
    /// Human-readable explanation.
    pub message: String,
    /// Severity.
    pub severity: Severity,
}

impl Finding {
    fn violation(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            severity: Severity::Error,
        }
    }

    fn warning(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    /// Check passed.
    Pass,
    /// Check produced a warning.
    Warning,
    /// Check produced a violation.
    Violation,
    /// Check could not run because its input was missing.
    Skipped,
}

/// Raw result of one check, kept for display of why a verdict came out as it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// The rule checked.
    pub check: FindingKind,
    /// What happened.
    pub outcome: CheckOutcome,
    /// Short explanation.
    pub detail: String,
    /// Expiry classification for the date-based checks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<ExpiryStatus>,
}

/// The verdict for one flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceVerdict {
    /// Flight evaluated.
    pub flight_id: i64,
    /// Overall status derived from the findings.
    pub status: ComplianceStatus,
    /// Blocking findings.
    pub violations: Vec<Finding>,
    /// Non-blocking findings.
    pub warnings: Vec<Finding>,
    /// Every check that ran, in evaluation order.
    pub checks: Vec<CheckResult>,
}

impl ComplianceVerdict {
    /// BLAKE3 hex digest of the canonical JSON of the verdict's outcome.
    ///
    /// Covers status and both finding lists. `checks` is left out because its
    /// expiry day counts change daily without changing the outcome.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        #[derive(Serialize)]
        struct Outcome<'a> {
            status: ComplianceStatus,
            violations: &'a [Finding],
            warnings: &'a [Finding],
        }

        let outcome = Outcome {
            status: self.status,
            violations: &self.violations,
            warnings: &self.warnings,
        };
        let mut hasher = blake3::Hasher::new();
        if let Err(e) = serde_json::to_writer(&mut hasher, &outcome) {
            warn!(flight_id = self.flight_id, error = %e, "failed to encode verdict");
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Whether the flight is fully compliant.
    #[must_use]
    pub fn is_compliant(&self) -> bool {
        self.status == ComplianceStatus::Compliant
    }
}

/// Finding produced by an expiry classification, if any.
///
/// Expired and critical dates are violations; warning-window and unknown
/// dates are warnings; notice and valid dates produce nothing.
pub(crate) fn expiry_finding(kind: FindingKind, status: &ExpiryStatus) -> Option<Finding> {
    match status.status {
        ExpiryState::Expired | ExpiryState::Critical => {
            Some(Finding::violation(kind, status.message.clone()))
        }
        ExpiryState::Warning | ExpiryState::Unknown => {
            Some(Finding::warning(kind, status.message.clone()))
        }
        ExpiryState::Notice | ExpiryState::Valid => None,
    }
}

/// Overall status from the finding lists.
#[must_use]
pub fn overall_status(violations: &[Finding], warnings: &[Finding]) -> ComplianceStatus {
    if !violations.is_empty() {
        ComplianceStatus::NonCompliant
    } else if !warnings.is_empty() {
        ComplianceStatus::Warning
    } else {
        ComplianceStatus::Compliant
    }
}

#[derive(Default)]
struct VerdictBuilder {
    violations: Vec<Finding>,
    warnings: Vec<Finding>,
    checks: Vec<CheckResult>,
}

impl VerdictBuilder {
    fn pass(&mut self, check: FindingKind, detail: impl Into<String>) {
        self.record(check, CheckOutcome::Pass, detail.into(), None);
    }

    fn skip(&mut self, check: FindingKind, detail: impl Into<String>) {
        self.record(check, CheckOutcome::Skipped, detail.into(), None);
    }

    fn violation(&mut self, check: FindingKind, message: String) {
        self.violations.push(Finding::violation(check, message.clone()));
        self.record(check, CheckOutcome::Violation, message, None);
    }

    fn expiry(&mut self, check: FindingKind, status: ExpiryStatus) {
        let outcome = match expiry_finding(check, &status) {
            Some(finding) if finding.severity == Severity::Error => {
                self.violations.push(finding);
                CheckOutcome::Violation
            }
            Some(finding) => {
                self.warnings.push(finding);
                CheckOutcome::Warning
            }
            None => CheckOutcome::Pass,
        };
        let detail = status.message.clone();
        self.record(check, outcome, detail, Some(status));
    }

    fn record(
        &mut self,
        check: FindingKind,
        outcome: CheckOutcome,
        detail: String,
        expiry: Option<ExpiryStatus>,
    ) {
        self.checks.push(CheckResult {
            check,
            outcome,
            detail,
            expiry,
        });
    }

    fn finish(self, flight_id: i64) -> ComplianceVerdict {
        ComplianceVerdict {
            flight_id,
            status: overall_status(&self.violations, &self.warnings),
            violations: self.violations,
            warnings: self.warnings,
            checks: self.checks,
        }
    }
}

/// Validate a flight against its aircraft and the pilot's certificate.
///
/// `aircraft` or `certificate` is `None` when the store could not produce the
/// record; that becomes a `data_missing` violation rather than a clean pass.
#[must_use]
pub fn validate_flight(
    flight: &Flight,
    aircraft: Option<&Aircraft>,
    certificate: Option<&PilotCertificate>,
    today: NaiveDate,
) -> ComplianceVerdict {
    let mut verdict = VerdictBuilder::default();

    match aircraft {
        Some(aircraft) => check_aircraft(&mut verdict, flight, aircraft, today),
        None => {
            verdict.violation(
                FindingKind::DataMissing,
                format!("Aircraft record {} is unavailable", flight.aircraft_id),
            );
            verdict.skip(FindingKind::RemoteId, "aircraft unavailable");
            verdict.skip(FindingKind::Registration, "aircraft unavailable");
            verdict.skip(FindingKind::Weight, "aircraft unavailable");
        }
    }

    match certificate {
        Some(certificate) => verdict.expiry(
            FindingKind::Certificate,
            evaluate_expiry(certificate.expiry, &ExpiryPolicy::PART107, today),
        ),
        None => {
            verdict.violation(
                FindingKind::DataMissing,
                format!("Pilot certificate for {} is unavailable", flight.pilot_id),
            );
            verdict.skip(FindingKind::Certificate, "certificate unavailable");
        }
    }

    check_airspace(&mut verdict, flight);

    let verdict = verdict.finish(flight.id);
    debug!(
        flight_id = flight.id,
        status = %verdict.status,
        violations = verdict.violations.len(),
        warnings = verdict.warnings.len(),
        "validated flight"
    );
    verdict
}

fn check_aircraft(
    verdict: &mut VerdictBuilder,
    flight: &Flight,
    aircraft: &Aircraft,
    today: NaiveDate,
) {
    if !remote_id_required(aircraft.weight_lbs) {
        verdict.pass(FindingKind::RemoteId, "Remote ID not required");
    } else if flight.remote_id_verified {
        verdict.pass(FindingKind::RemoteId, "Remote ID verified");
    } else {
        verdict.violation(
            FindingKind::RemoteId,
            format!(
                "Remote ID required for {} but not verified for this flight",
                aircraft.registration_number
            ),
        );
    }

    verdict.expiry(
        FindingKind::Registration,
        evaluate_expiry(aircraft.registration_expiry, &ExpiryPolicy::REGISTRATION, today),
    );

    if exceeds_weight_ceiling(aircraft.weight_lbs) {
        verdict.violation(
            FindingKind::Weight,
            format!(
                "{} weighs {} lbs, above the Part 107 limit of {PART107_MAX_WEIGHT_LBS} lbs",
                aircraft.registration_number,
                aircraft.weight_lbs.unwrap_or_default()
            ),
        );
    } else {
        verdict.pass(FindingKind::Weight, "Within Part 107 weight limit");
    }
}

fn check_airspace(verdict: &mut VerdictBuilder, flight: &Flight) {
    let authorized = flight
        .airspace_authorization_id
        .as_deref()
        .is_some_and(|id| !id.trim().is_empty());

    if requires_airspace_authorization(flight.max_altitude_ft) && !authorized {
        verdict.violation(
            FindingKind::Airspace,
            format!(
                "Flight reached {} ft, above {AIRSPACE_CEILING_FT} ft without airspace authorization",
                flight.max_altitude_ft.unwrap_or_default()
            ),
        );
    } else {
        verdict.pass(FindingKind::Airspace, "Altitude within authorization");
    }
}

/// Load the inputs for `flight` from the store.
///
/// Load failures are logged and returned as `None` so the verdict reports
/// `data_missing` for that flight instead of aborting a batch.
pub(crate) fn load_join<S: FleetRecords + ?Sized>(
    store: &S,
    flight: &Flight,
) -> (Option<Aircraft>, Option<PilotCertificate>) {
    let aircraft = store.aircraft(flight.aircraft_id).unwrap_or_else(|e| {
        warn!(flight_id = flight.id, error = %e, "failed to load aircraft");
        None
    });
    let certificate = store.certificate(&flight.pilot_id).unwrap_or_else(|e| {
        warn!(flight_id = flight.id, error = %e, "failed to load pilot certificate");
        None
    });
    (aircraft, certificate)
}

/// Evaluate a stored flight and persist its status.
///
/// The write is skipped when the stored fingerprint already matches.
///
/// # Errors
///
/// Returns [`crate::Error::NotFound`] if the flight does not exist, or a
/// storage error if the status cannot be written.
pub fn evaluate_and_record<S: FleetRecords + ?Sized>(
    store: &S,
    flight_id: i64,
    today: NaiveDate,
) -> Result<ComplianceVerdict> {
    let flight = store
        .flight(flight_id)?
        .ok_or_else(|| crate::Error::not_found("flight", flight_id))?;
    let (aircraft, certificate) = load_join(store, &flight);
    let verdict = validate_flight(&flight, aircraft.as_ref(), certificate.as_ref(), today);
    let fingerprint = verdict.fingerprint();

    if flight.verdict_fingerprint.as_deref() == Some(fingerprint.as_str())
        && flight.compliance_status == verdict.status
    {
        debug!(flight_id, "verdict unchanged, skipping write");
    } else {
        store.record_verdict(flight_id, verdict.status, &fingerprint)?;
    }
    Ok(verdict)
}

/// Outcome of re-evaluating every flight for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReevaluationReport {
    /// Flights evaluated.
    pub evaluated: usize,
    /// Flights whose stored status changed.
    pub changed: usize,
    /// Per-flight failures.
    pub errors: Vec<String>,
}

/// Re-run validation over all of a user's flights.
///
/// # Errors
///
/// Returns an error only if the flight list itself cannot be loaded.
pub fn reevaluate_user<S: FleetRecords + ?Sized>(
    store: &S,
    user_id: &str,
    today: NaiveDate,
) -> Result<ReevaluationReport> {
    let flights = store.flights_for_pilot(user_id, None, None)?;
    let mut report = ReevaluationReport::default();

    for flight in flights {
        match evaluate_and_record(store, flight.id, today) {
            Ok(verdict) => {
                report.evaluated += 1;
                if verdict.status != flight.compliance_status {
                    report.changed += 1;
                }
            }
            Err(e) => {
                warn!(flight_id = flight.id, error = %e, "re-evaluation failed");
                report.errors.push(format!("flight {}: {e}", flight.id));
            }
        }
    }

    Ok(report)
}
