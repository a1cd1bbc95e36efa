//! `fleetguard` - CLI for the fleet compliance engine
//!
//! This binary manages aircraft, certificates and flights, prints compliance
//! summaries, and runs or serves the daily expiry sweep.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;

use fleetguard::aggregate::{self, TimeWindow};
use fleetguard::alerts;
use fleetguard::cli::{
    AircraftCommand, CertificateCommand, Cli, Command, ConfigCommand, FlightAddArgs,
    FlightCommand, NotificationsCommand, ServeCommand, StatusCommand, SummaryCommand,
    SweepCommand, ViolationsCommand,
};
use fleetguard::cron::{self, CronState};
use fleetguard::expiry::evaluate_expiry;
use fleetguard::model::{AircraftStatus, NewAircraft, NewFlight, PilotCertificate};
use fleetguard::policy::{lookback_start, ExpiryPolicy};
use fleetguard::validator::{self, ComplianceVerdict};
use fleetguard::{init_logging, Config, FleetRecords, Storage};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // `config validate` has to run even when the configuration does not load
    if let Command::Config(ConfigCommand::Validate { file }) = &cli.command {
        let path = file
            .clone()
            .or_else(|| cli.config.clone())
            .unwrap_or_else(Config::default_config_path);
        println!("Validating configuration: {}", path.display());
        match Config::load_from(Some(path)) {
            Ok(_) => println!("Configuration is valid."),
            Err(e) => bail!("configuration error: {e}"),
        }
        return Ok(());
    }

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Aircraft(cmd) => handle_aircraft(&open_storage(&config)?, cmd),
        Command::Certificate(cmd) => handle_certificate(&open_storage(&config)?, cmd),
        Command::Flight(cmd) => handle_flight(&config, &open_storage(&config)?, cmd),
        Command::Reevaluate(cmd) => {
            let storage = open_storage(&config)?;
            let report = validator::reevaluate_user(&storage, &cmd.user, Utc::now().date_naive())?;
            if cmd.json {
                print_json(&report)?;
            } else {
                println!(
                    "Evaluated {} flights, {} changed status",
                    report.evaluated, report.changed
                );
                print_errors(&report.errors);
            }
            Ok(())
        }
        Command::Summary(cmd) => handle_summary(&open_storage(&config)?, &cmd),
        Command::Violations(cmd) => handle_violations(&open_storage(&config)?, &cmd),
        Command::Sweep(cmd) => handle_sweep(&config, &open_storage(&config)?, &cmd),
        Command::Serve(cmd) => handle_serve(&config, &cmd),
        Command::Notifications(cmd) => handle_notifications(&open_storage(&config)?, cmd),
        Command::Status(cmd) => handle_status(&open_storage(&config)?, &cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_storage(config: &Config) -> Result<Storage> {
    let path = config.database_path();
    Storage::open(&path).with_context(|| format!("failed to open {}", path.display()))
}

fn handle_serve(config: &Config, cmd: &ServeCommand) -> Result<()> {
    let addr = match cmd.bind {
        Some(addr) => addr,
        None => config.bind_address()?,
    };
    let state = CronState::new(
        open_storage(config)?,
        config.sweep_settings(),
        config.cron.secret.clone(),
    );
    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    runtime.block_on(cron::serve(state, addr))?;
    Ok(())
}

fn handle_status(storage: &Storage, cmd: &StatusCommand) -> Result<()> {
    let stats = storage.stats()?;
    if cmd.json {
        return print_json(&stats);
    }
    println!("fleetguard status");
    println!("-----------------");
    println!("Database:      {}", storage.path().display());
    println!("Size:          {} bytes", stats.db_size_bytes);
    println!("Aircraft:      {}", stats.total_aircraft);
    println!("Certificates:  {}", stats.total_certificates);
    println!("Flights:       {}", stats.total_flights);
    println!("Notifications: {}", stats.total_notifications);
    Ok(())
}

fn handle_aircraft(storage: &Storage, cmd: AircraftCommand) -> Result<()> {
    match cmd {
        AircraftCommand::Add {
            user,
            registration,
            expires,
            manufacturer,
            model,
            weight,
            remote_id_serial,
            remote_id_type,
        } => {
            let id = storage.insert_aircraft(&NewAircraft {
                user_id: user,
                registration_number: registration,
                registration_expiry: expires,
                manufacturer,
                model,
                weight_lbs: weight,
                remote_id_serial,
                remote_id_type: remote_id_type.into(),
            })?;
            println!("Registered aircraft {id}");
        }
        AircraftCommand::List { user, json } => {
            let fleet = storage.aircraft_for_user(&user)?;
            if json {
                print_json(&fleet)?;
            } else if fleet.is_empty() {
                println!("No aircraft for {user}");
            } else {
                let today = Utc::now().date_naive();
                for aircraft in fleet {
                    let expiry = evaluate_expiry(
                        aircraft.registration_expiry,
                        &ExpiryPolicy::REGISTRATION,
                        today,
                    );
                    println!(
                        "{:>5}  {:<12} {:<11} {} {}  [{}] {}",
                        aircraft.id,
                        aircraft.registration_number,
                        aircraft.status,
                        aircraft.manufacturer,
                        aircraft.model,
                        expiry.status,
                        expiry.message
                    );
                }
            }
        }
        AircraftCommand::Renew { id, expires } => {
            storage.set_registration_expiry(id, Some(expires))?;
            println!("Aircraft {id} registration now expires {expires}");
        }
        AircraftCommand::Retire { id } => {
            storage.set_aircraft_status(id, AircraftStatus::Retired)?;
            println!("Retired aircraft {id}");
        }
        AircraftCommand::Remove { id } => {
            if storage.delete_aircraft(id)? {
                println!("Removed aircraft {id}");
            } else {
                bail!("aircraft {id} not found");
            }
        }
    }
    Ok(())
}

fn handle_certificate(storage: &Storage, cmd: CertificateCommand) -> Result<()> {
    match cmd {
        CertificateCommand::Set {
            user,
            number,
            expires,
        } => {
            storage.upsert_certificate(&PilotCertificate {
                user_id: user.clone(),
                certificate_number: number,
                expiry: expires,
            })?;
            println!("Certificate updated for {user}");
        }
        CertificateCommand::Show { user, json } => {
            let Some(certificate) = storage.certificate(&user)? else {
                bail!("no certificate on file for {user}");
            };
            let status = evaluate_expiry(
                certificate.expiry,
                &ExpiryPolicy::PART107,
                Utc::now().date_naive(),
            );
            if json {
                print_json(&serde_json::json!({
                    "certificate": certificate,
                    "expiry": status,
                }))?;
            } else {
                println!("Certificate: {}", certificate.certificate_number);
                println!("Status:      {} ({})", status.status, status.message);
            }
        }
    }
    Ok(())
}

fn handle_flight(config: &Config, storage: &Storage, cmd: FlightCommand) -> Result<()> {
    match cmd {
        FlightCommand::Add(args) => add_flight(config, storage, args),
        FlightCommand::List {
            user,
            since,
            until,
            json,
        } => {
            let flights = storage.flights_for_pilot(&user, since, until)?;
            if json {
                print_json(&flights)?;
            } else if flights.is_empty() {
                println!("No flights for {user}");
            } else {
                for flight in flights {
                    println!(
                        "{:>5}  {}  aircraft {:<5} {:>7} ft  {}",
                        flight.id,
                        flight.start_time.format("%Y-%m-%d %H:%M"),
                        flight.aircraft_id,
                        flight
                            .max_altitude_ft
                            .map_or_else(|| "-".to_string(), |a| format!("{a:.0}")),
                        flight.compliance_status
                    );
                }
            }
            Ok(())
        }
        FlightCommand::Evaluate { id, json } => {
            let verdict = validator::evaluate_and_record(storage, id, Utc::now().date_naive())?;
            print_verdict(&verdict, json)
        }
    }
}

fn add_flight(config: &Config, storage: &Storage, args: FlightAddArgs) -> Result<()> {
    let id = storage.insert_flight(&NewFlight {
        pilot_id: args.user,
        aircraft_id: args.aircraft,
        start_time: args.start,
        end_time: args.end,
        duration_minutes: args.duration,
        max_altitude_ft: args.altitude,
        remote_id_verified: args.remote_id_verified,
        airspace_authorization_id: args.authorization,
    })?;

    let now = Utc::now();
    let verdict = validator::evaluate_and_record(storage, id, now.date_naive())?;
    let flight = storage
        .flight(id)?
        .with_context(|| format!("flight {id} disappeared after insert"))?;
    let trigger = config.sweep_settings().trigger()?;
    alerts::notify_violation(storage, &trigger, &flight, &verdict, now)?;

    if !args.json {
        println!("Logged flight {id}");
    }
    print_verdict(&verdict, args.json)
}

fn print_verdict(verdict: &ComplianceVerdict, json: bool) -> Result<()> {
    if json {
        return print_json(verdict);
    }
    println!("Flight {}: {}", verdict.flight_id, verdict.status);
    for finding in &verdict.violations {
        println!("  violation  [{}] {}", finding.kind, finding.message);
    }
    for finding in &verdict.warnings {
        println!("  warning    [{}] {}", finding.kind, finding.message);
    }
    Ok(())
}

fn handle_summary(storage: &Storage, cmd: &SummaryCommand) -> Result<()> {
    let now = Utc::now();
    let window = cmd
        .days
        .map_or_else(TimeWindow::all, |days| TimeWindow::last_days(days, now));
    let summary = aggregate::summarize(storage, &cmd.user, window, now.date_naive())?;

    if cmd.json {
        return print_json(&summary);
    }
    println!("Compliance score: {}", summary.score);
    println!(
        "Flights:          {} ({} compliant, {} non-compliant, {} warning, {} pending)",
        summary.total_flights,
        summary.compliant_flights,
        summary.non_compliant_flights,
        summary.warning_flights,
        summary.pending_flights
    );
    if let Some(last) = summary.last_flight_date {
        println!("Last flight:      {}", last.format("%Y-%m-%d %H:%M UTC"));
    }
    if !summary.upcoming_expirations.is_empty() {
        println!();
        println!("Upcoming expirations:");
        for entry in &summary.upcoming_expirations {
            println!(
                "  {:<8} {:<14} {}",
                entry.expiry.status, entry.item, entry.expiry.message
            );
        }
    }
    print_errors(&summary.errors);
    Ok(())
}

fn handle_violations(storage: &Storage, cmd: &ViolationsCommand) -> Result<()> {
    let now = Utc::now();
    let found = aggregate::violations_for_window(
        storage,
        &cmd.user,
        lookback_start(now, cmd.days),
        now,
        now.date_naive(),
    )?;

    if cmd.json {
        return print_json(&found);
    }
    if found.is_empty() {
        println!("No violations in the last {} days", cmd.days);
    }
    for v in found {
        let source = v
            .flight_id
            .map_or_else(|| "standing".to_string(), |id| format!("flight {id}"));
        println!(
            "{}  {:<7} {:<12} [{}] {}",
            v.occurred_at.format("%Y-%m-%d"),
            v.severity,
            source,
            v.kind,
            v.message
        );
    }
    Ok(())
}

fn handle_sweep(config: &Config, storage: &Storage, cmd: &SweepCommand) -> Result<()> {
    let now = Utc::now();
    let today = cmd.date.unwrap_or_else(|| now.date_naive());
    let report = alerts::run_sweep(storage, &config.sweep_settings(), today, now);

    if cmd.json {
        return print_json(&report);
    }
    println!("Sweep for {today}");
    println!("  Registration alerts: {}", report.registration_alerts);
    println!("  Certificate alerts:  {}", report.certificate_alerts);
    println!("  Suppressed:          {}", report.suppressed);
    print_errors(&report.errors);
    Ok(())
}

fn handle_notifications(storage: &Storage, cmd: NotificationsCommand) -> Result<()> {
    match cmd {
        NotificationsCommand::List {
            user,
            unread,
            limit,
            json,
        } => {
            let notes = storage.notifications_for_user(&user, unread, limit)?;
            if json {
                print_json(&notes)?;
            } else if notes.is_empty() {
                println!("No notifications for {user}");
            } else {
                for note in notes {
                    println!(
                        "{:>5} {} {}  {:<7} {}",
                        note.id,
                        if note.read { " " } else { "*" },
                        note.created_at.format("%Y-%m-%d %H:%M"),
                        note.severity,
                        note.title
                    );
                }
            }
        }
        NotificationsCommand::Read { id } => {
            storage.mark_notification_read(id)?;
            println!("Marked notification {id} as read");
        }
        NotificationsCommand::Prune { older_than_days } => {
            let cutoff = lookback_start(Utc::now(), older_than_days);
            let removed = storage.prune_notifications_before(cutoff)?;
            println!("Removed {removed} notifications");
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                print_json(config)?;
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Alerts]");
                println!("  Registration days:  {:?}", config.alerts.registration_days);
                println!("  Certificate days:   {:?}", config.alerts.certificate_days);
                println!("  Dedupe window (h):  {}", config.alerts.dedupe_window_hours);
                println!();
                println!("[Cron]");
                println!("  Bind address:       {}", config.cron.bind_address);
                println!(
                    "  Secret:             {}",
                    if config.cron.secret.is_some() { "set" } else { "not set" }
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { .. } => {
            config.validate()?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_errors(errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    eprintln!();
    eprintln!("{} item(s) could not be processed:", errors.len());
    for error in errors {
        eprintln!("  {error}");
    }
}
