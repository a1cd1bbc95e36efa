//! `fleetguard` - compliance evaluation for drone fleets
//!
//! This library evaluates aircraft, flights and pilot certificates against FAA
//! thresholds (Remote ID, registration and Part 107 expiry, weight, altitude),
//! aggregates verdicts into scores and summaries, and raises de-duplicated
//! expiry alerts from a daily sweep.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod aggregate;
pub mod alerts;
pub mod cli;
pub mod config;
pub mod cron;
pub mod error;
pub mod expiry;
pub mod logging;
pub mod model;
pub mod policy;
pub mod storage;
pub mod validator;

pub use aggregate::{compute_score, summarize, violations_for_window, ComplianceSummary};
pub use alerts::{run_sweep, should_notify, AlertTrigger, SweepReport};
pub use config::Config;
pub use error::{Error, Result};
pub use expiry::{evaluate_expiry, ExpiryState, ExpiryStatus};
pub use logging::init_logging;
pub use model::{Aircraft, ComplianceStatus, Flight, PilotCertificate, Severity};
pub use storage::{FleetRecords, Storage, StorageStats};
pub use validator::{validate_flight, ComplianceVerdict, Finding, FindingKind};
