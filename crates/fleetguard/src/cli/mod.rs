//! Command-line interface for fleetguard.
//!
//! This module provides the CLI structure for the `fleetguard` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AircraftCommand, CertificateCommand, ConfigCommand, FlightAddArgs, FlightCommand,
    NotificationsCommand, ReevaluateCommand, RemoteIdTypeArg, ServeCommand, StatusCommand,
    SummaryCommand, SweepCommand, ViolationsCommand,
};

/// fleetguard - Compliance checks for drone fleets
///
/// Tracks aircraft registrations, Part 107 certificates and flights, evaluates
/// each flight against FAA thresholds, and raises expiry alerts.
#[derive(Debug, Parser)]
#[command(name = "fleetguard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage aircraft
    #[command(subcommand)]
    Aircraft(AircraftCommand),

    /// Manage pilot certificates
    #[command(subcommand)]
    Certificate(CertificateCommand),

    /// Log and evaluate flights
    #[command(subcommand)]
    Flight(FlightCommand),

    /// Re-evaluate every flight for a pilot
    Reevaluate(ReevaluateCommand),

    /// Show a user's compliance summary
    Summary(SummaryCommand),

    /// List violations and warnings in a time window
    Violations(ViolationsCommand),

    /// Run the expiry alert sweep once
    Sweep(SweepCommand),

    /// Serve the HTTP cron trigger
    Serve(ServeCommand),

    /// View notifications
    #[command(subcommand)]
    Notifications(NotificationsCommand),

    /// Show database status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Verbosity;
    use clap::CommandFactory;

    fn status_cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Status(StatusCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "fleetguard");
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(status_cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(status_cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(status_cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(status_cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_cli_verify() {
        // Verify the CLI structure is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_aircraft_add() {
        let args = vec![
            "fleetguard",
            "aircraft",
            "add",
            "--user",
            "u1",
            "FA3XYZ",
            "--expires",
            "2027-03-01",
            "--weight",
            "1.6",
            "--remote-id-type",
            "broadcast",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Aircraft(AircraftCommand::Add {
                registration,
                expires,
                weight,
                remote_id_type,
                ..
            }) => {
                assert_eq!(registration, "FA3XYZ");
                assert_eq!(expires, chrono::NaiveDate::from_ymd_opt(2027, 3, 1));
                assert_eq!(weight, Some(1.6));
                assert_eq!(remote_id_type, RemoteIdTypeArg::Broadcast);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_flight_add() {
        let args = vec![
            "fleetguard",
            "flight",
            "add",
            "-u",
            "u1",
            "-a",
            "3",
            "--start",
            "2026-05-01T14:00:00Z",
            "--altitude",
            "380",
            "--remote-id-verified",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Flight(FlightCommand::Add(args)) => {
                assert_eq!(args.aircraft, 3);
                assert_eq!(args.altitude, Some(380.0));
                assert!(args.remote_id_verified);
                assert!(args.authorization.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_date() {
        let line = "fleetguard certificate set -u u1 123 -e soon";
        assert!(Cli::try_parse_from(line.split_whitespace()).is_err());
    }

    #[test]
    fn test_parse_violations_default_days() {
        let args = vec!["fleetguard", "violations", "--user", "u1"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Violations(cmd) => assert_eq!(cmd.days, 30),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_out_of_range_days() {
        for line in [
            "fleetguard violations --user u1 --days 0",
            "fleetguard violations --user u1 --days 36501",
            "fleetguard summary --user u1 --days 9223372036854775807",
            "fleetguard notifications prune --older-than-days -5",
        ] {
            assert!(Cli::try_parse_from(line.split_whitespace()).is_err());
        }

        let line = "fleetguard summary --user u1 --days 36500";
        let cli = Cli::try_parse_from(line.split_whitespace()).unwrap();
        match cli.command {
            Command::Summary(cmd) => assert_eq!(cmd.days, Some(36500)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_sweep_with_date() {
        let args = vec!["fleetguard", "sweep", "--date", "2026-07-04", "--json"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Sweep(cmd) => {
                assert_eq!(cmd.date, chrono::NaiveDate::from_ymd_opt(2026, 7, 4));
                assert!(cmd.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_serve_bind() {
        let args = vec!["fleetguard", "serve", "--bind", "0.0.0.0:9000"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Serve(cmd) => {
                assert_eq!(cmd.bind, Some("0.0.0.0:9000".parse().unwrap()));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_with_config() {
        let args = vec!["fleetguard", "-c", "/custom/config.toml", "status"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_with_verbose() {
        let args = vec!["fleetguard", "-v", "status"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_parse_with_quiet() {
        let args = vec!["fleetguard", "-q", "status"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(cli.quiet);
    }
}
