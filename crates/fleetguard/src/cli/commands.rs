//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Subcommand, ValueEnum};

use crate::model::RemoteIdType;
use crate::policy::MAX_LOOKBACK_DAYS;

/// Aircraft commands.
#[derive(Debug, Subcommand)]
pub enum AircraftCommand {
    /// Register an aircraft
    Add {
        /// Owning user
        #[arg(short, long)]
        user: String,

        /// FAA registration number
        registration: String,

        /// Registration expiry (YYYY-MM-DD)
        #[arg(short, long)]
        expires: Option<NaiveDate>,

        /// Manufacturer
        #[arg(long, default_value = "")]
        manufacturer: String,

        /// Model
        #[arg(long, default_value = "")]
        model: String,

        /// Takeoff weight in pounds
        #[arg(short, long)]
        weight: Option<f64>,

        /// Remote ID serial number
        #[arg(long)]
        remote_id_serial: Option<String>,

        /// Remote ID implementation
        #[arg(long, value_enum, default_value = "standard")]
        remote_id_type: RemoteIdTypeArg,
    },

    /// List a user's aircraft
    List {
        /// Owning user
        #[arg(short, long)]
        user: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Record a renewed registration expiry
    Renew {
        /// Aircraft id
        id: i64,

        /// New expiry (YYYY-MM-DD)
        expires: NaiveDate,
    },

    /// Mark an aircraft retired
    Retire {
        /// Aircraft id
        id: i64,
    },

    /// Delete an aircraft record
    Remove {
        /// Aircraft id
        id: i64,
    },
}

/// Pilot certificate commands.
#[derive(Debug, Subcommand)]
pub enum CertificateCommand {
    /// Set the certificate on file for a user
    Set {
        /// Owning user
        #[arg(short, long)]
        user: String,

        /// Remote Pilot Certificate number
        number: String,

        /// Certificate expiry (YYYY-MM-DD)
        #[arg(short, long)]
        expires: Option<NaiveDate>,
    },

    /// Show a user's certificate and its expiry status
    Show {
        /// Owning user
        #[arg(short, long)]
        user: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Flight commands.
#[derive(Debug, Subcommand)]
pub enum FlightCommand {
    /// Log a flight and evaluate it
    Add(FlightAddArgs),

    /// List a pilot's flights
    List {
        /// Pilot
        #[arg(short, long)]
        user: String,

        /// Only flights starting at or after this time (RFC 3339)
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        /// Only flights starting at or before this time (RFC 3339)
        #[arg(long)]
        until: Option<DateTime<Utc>>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Evaluate a stored flight and show the verdict
    Evaluate {
        /// Flight id
        id: i64,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Arguments for logging a flight.
#[derive(Debug, Args)]
pub struct FlightAddArgs {
    /// Pilot
    #[arg(short, long)]
    pub user: String,

    /// Aircraft id
    #[arg(short, long)]
    pub aircraft: i64,

    /// Takeoff time (RFC 3339)
    #[arg(long)]
    pub start: DateTime<Utc>,

    /// Landing time (RFC 3339)
    #[arg(long)]
    pub end: Option<DateTime<Utc>>,

    /// Duration in minutes, when no landing time is given
    #[arg(long)]
    pub duration: Option<f64>,

    /// Maximum altitude in feet
    #[arg(long)]
    pub altitude: Option<f64>,

    /// Remote ID broadcast was confirmed
    #[arg(long)]
    pub remote_id_verified: bool,

    /// LAANC or waiver reference
    #[arg(long)]
    pub authorization: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Re-evaluate command arguments.
#[derive(Debug, Args)]
pub struct ReevaluateCommand {
    /// Pilot whose flights to re-evaluate
    #[arg(short, long)]
    pub user: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Summary command arguments.
#[derive(Debug, Args)]
pub struct SummaryCommand {
    /// User to summarize
    #[arg(short, long)]
    pub user: String,

    /// Only count flights from the last N days
    #[arg(short, long, value_parser = day_count())]
    pub days: Option<i64>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Violations command arguments.
#[derive(Debug, Args)]
pub struct ViolationsCommand {
    /// User to report on
    #[arg(short, long)]
    pub user: String,

    /// Window length in days, ending now
    #[arg(short, long, default_value = "30", value_parser = day_count())]
    pub days: i64,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Sweep command arguments.
#[derive(Debug, Args)]
pub struct SweepCommand {
    /// Run for this date instead of today (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Listen address, overriding `cron.bind_address`
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,
}

/// Notification commands.
#[derive(Debug, Subcommand)]
pub enum NotificationsCommand {
    /// List a user's notifications
    List {
        /// Recipient
        #[arg(short, long)]
        user: String,

        /// Only unread notifications
        #[arg(long)]
        unread: bool,

        /// Maximum number of results
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Mark a notification as read
    Read {
        /// Notification id
        id: i64,
    },

    /// Delete notifications older than N days
    Prune {
        /// Age in days
        #[arg(long, default_value = "90", value_parser = day_count())]
        older_than_days: i64,
    },
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Day counts accepted by the reporting commands.
fn day_count() -> clap::builder::RangedI64ValueParser<i64> {
    clap::value_parser!(i64).range(1..=MAX_LOOKBACK_DAYS)
}

/// Remote ID type argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RemoteIdTypeArg {
    /// Built-in standard Remote ID
    Standard,
    /// Broadcast module
    Broadcast,
    /// Network Remote ID
    Network,
}

impl From<RemoteIdTypeArg> for RemoteIdType {
    fn from(arg: RemoteIdTypeArg) -> Self {
        match arg {
            RemoteIdTypeArg::Standard => Self::Standard,
            RemoteIdTypeArg::Broadcast => Self::Broadcast,
            RemoteIdTypeArg::Network => Self::Network,
        }
    }
}
