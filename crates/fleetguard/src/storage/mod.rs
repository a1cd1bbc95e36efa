//! Records store for fleetguard.
//!
//! The engine only ever reads through the [`FleetRecords`] trait; [`Storage`]
//! is the `SQLite` implementation used by the CLI and the cron trigger.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{
    Aircraft, AircraftStatus, ComplianceStatus, Flight, NewAircraft, NewFlight, NewNotification,
    Notification, NotificationKind, PilotCertificate, RemoteIdType, Severity,
};

/// Read and write access the engine needs from the relational store.
///
/// Lookups return `Ok(None)` for records that do not exist and `Err` only for
/// store failures.
pub trait FleetRecords {
    /// Fetch one aircraft.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn aircraft(&self, id: i64) -> Result<Option<Aircraft>>;

    /// All aircraft owned by a user, any status.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn aircraft_for_user(&self, user_id: &str) -> Result<Vec<Aircraft>>;

    /// Active aircraft whose registration expires exactly on `date`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn active_aircraft_expiring_on(&self, date: NaiveDate) -> Result<Vec<Aircraft>>;

    /// The certificate on file for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn certificate(&self, user_id: &str) -> Result<Option<PilotCertificate>>;

    /// Certificates expiring exactly on `date`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn certificates_expiring_on(&self, date: NaiveDate) -> Result<Vec<PilotCertificate>>;

    /// Fetch one flight.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn flight(&self, id: i64) -> Result<Option<Flight>>;

    /// Flights flown by a pilot, newest first, optionally bounded by start time
    /// (both bounds inclusive).
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn flights_for_pilot(
        &self,
        pilot_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Flight>>;

    /// Persist the status produced by a verdict.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the flight does not exist.
    fn record_verdict(
        &self,
        flight_id: i64,
        status: ComplianceStatus,
        fingerprint: &str,
    ) -> Result<()>;

    /// Notifications of one kind for a user created after `since`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn recent_notifications(
        &self,
        user_id: &str,
        kind: NotificationKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<Notification>>;

    /// Record a notification; returns its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be written.
    fn insert_notification(
        &self,
        notification: &NewNotification,
        created_at: DateTime<Utc>,
    ) -> Result<i64>;
}

const AIRCRAFT_COLUMNS: &str = "id, user_id, registration_number, registration_expiry, \
     manufacturer, model, weight_lbs, remote_id_serial, remote_id_type, status";

const FLIGHT_COLUMNS: &str = "id, pilot_id, aircraft_id, start_time, end_time, duration_minutes, \
     max_altitude_ft, remote_id_verified, airspace_authorization_id, compliance_status, \
     verdict_fingerprint";

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, title, message, type, severity, data, created_at, read";

/// `SQLite`-backed records store.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // === Aircraft ===

    /// Register an aircraft; returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] if the aircraft fails validation, or a
    /// database error.
    pub fn insert_aircraft(&self, aircraft: &NewAircraft) -> Result<i64> {
        aircraft.validate()?;

        self.conn.execute(
            r"
            INSERT INTO aircraft (user_id, registration_number, registration_expiry,
                manufacturer, model, weight_lbs, remote_id_serial, remote_id_type, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
            params![
                aircraft.user_id,
                aircraft.registration_number.trim(),
                aircraft.registration_expiry.map(|d| d.to_string()),
                aircraft.manufacturer,
                aircraft.model,
                aircraft.weight_lbs,
                aircraft.remote_id_serial,
                aircraft.remote_id_type.as_str(),
                AircraftStatus::Active.as_str(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!(
            "Registered aircraft {} as id {}",
            aircraft.registration_number, id
        );
        Ok(id)
    }

    /// Change an aircraft's operating status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the aircraft does not exist.
    pub fn set_aircraft_status(&self, id: i64, status: AircraftStatus) -> Result<()> {
        let affected = self.conn.execute(
            "UPDATE aircraft SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        if affected == 0 {
            return Err(Error::not_found("aircraft", id));
        }
        info!("Aircraft {} is now {}", id, status);
        Ok(())
    }

    /// Update an aircraft's registration expiry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the aircraft does not exist.
    pub fn set_registration_expiry(&self, id: i64, expiry: Option<NaiveDate>) -> Result<()> {
        let affected = self.conn.execute(
            "UPDATE aircraft SET registration_expiry = ?1 WHERE id = ?2",
            params![expiry.map(|d| d.to_string()), id],
        )?;
        if affected == 0 {
            return Err(Error::not_found("aircraft", id));
        }
        Ok(())
    }

    /// Delete an aircraft. Its flights are kept.
    ///
    /// Returns `true` if an aircraft was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_aircraft(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM aircraft WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    // === Certificates ===

    /// Create or replace the certificate on file for a user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] for a blank certificate number, or a
    /// database error.
    pub fn upsert_certificate(&self, certificate: &PilotCertificate) -> Result<()> {
        if certificate.certificate_number.trim().is_empty() {
            return Err(Error::invalid_record(
                "certificate_number",
                "must not be empty",
            ));
        }

        self.conn.execute(
            r"
            INSERT INTO pilot_certificates (user_id, certificate_number, expiry, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(user_id) DO UPDATE SET
                certificate_number = excluded.certificate_number,
                expiry = excluded.expiry,
                updated_at = excluded.updated_at
            ",
            params![
                certificate.user_id,
                certificate.certificate_number.trim(),
                certificate.expiry.map(|d| d.to_string()),
            ],
        )?;
        Ok(())
    }

    // === Flights ===

    /// Log a flight; returns its id. The flight starts as `pending`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] for a negative altitude or an end time
    /// before the start, or a database error.
    pub fn insert_flight(&self, flight: &NewFlight) -> Result<i64> {
        if flight.max_altitude_ft.is_some_and(|alt| alt < 0.0) {
            return Err(Error::invalid_record("max_altitude_ft", "must not be negative"));
        }
        if flight.end_time.is_some_and(|end| end < flight.start_time) {
            return Err(Error::invalid_record("end_time", "must not be before start_time"));
        }

        self.conn.execute(
            r"
            INSERT INTO flights (pilot_id, aircraft_id, start_time, end_time, duration_minutes,
                max_altitude_ft, remote_id_verified, airspace_authorization_id, compliance_status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
            params![
                flight.pilot_id,
                flight.aircraft_id,
                format_timestamp(flight.start_time),
                flight.end_time.map(format_timestamp),
                flight.resolved_duration(),
                flight.max_altitude_ft,
                flight.remote_id_verified,
                flight.airspace_authorization_id,
                ComplianceStatus::Pending.as_str(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Logged flight {} for pilot {}", id, flight.pilot_id);
        Ok(id)
    }

    // === Notifications ===

    /// Notifications for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn notifications_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_id = ?1 AND (?2 = 0 OR read = 0)
             ORDER BY created_at DESC, id DESC LIMIT ?3"
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let notifications = stmt
            .query_map(
                params![user_id, unread_only, limit_i64],
                Self::row_to_notification,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(notifications)
    }

    /// Mark a notification as read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the notification does not exist.
    pub fn mark_notification_read(&self, id: i64) -> Result<()> {
        let affected = self
            .conn
            .execute("UPDATE notifications SET read = 1 WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(Error::not_found("notification", id));
        }
        Ok(())
    }

    /// Delete notifications older than `cutoff`; returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn prune_notifications_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let affected = self.conn.execute(
            "DELETE FROM notifications WHERE created_at < ?1",
            [format_timestamp(cutoff)],
        )?;
        if affected > 0 {
            info!("Pruned {} old notifications", affected);
        }
        Ok(affected)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let count = |table: &str| -> Result<i64> {
            let n = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })?;
            Ok(n)
        };

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_aircraft: count("aircraft")?,
            total_certificates: count("pilot_certificates")?,
            total_flights: count("flights")?,
            total_notifications: count("notifications")?,
            db_size_bytes,
        })
    }

    // === Row mapping ===

    fn row_to_aircraft(row: &rusqlite::Row) -> rusqlite::Result<Aircraft> {
        let id: i64 = row.get(0)?;
        let expiry: Option<String> = row.get(3)?;
        let remote_id_type: String = row.get(8)?;
        let status: String = row.get(9)?;

        Ok(Aircraft {
            id,
            user_id: row.get(1)?,
            registration_number: row.get(2)?,
            registration_expiry: parse_date(expiry.as_deref(), "registration_expiry", id),
            manufacturer: row.get(4)?,
            model: row.get(5)?,
            weight_lbs: row.get(6)?,
            remote_id_serial: row.get(7)?,
            remote_id_type: parse_or_default(&remote_id_type, RemoteIdType::Standard),
            status: parse_or_default(&status, AircraftStatus::Active),
        })
    }

    fn row_to_certificate(row: &rusqlite::Row) -> rusqlite::Result<PilotCertificate> {
        let user_id: String = row.get(0)?;
        let expiry: Option<String> = row.get(2)?;
        let expiry = parse_date(expiry.as_deref(), "certificate expiry", &user_id);

        Ok(PilotCertificate {
            certificate_number: row.get(1)?,
            expiry,
            user_id,
        })
    }

    fn row_to_flight(row: &rusqlite::Row) -> rusqlite::Result<Flight> {
        let id: i64 = row.get(0)?;
        let start: String = row.get(3)?;
        let end: Option<String> = row.get(4)?;
        let status: String = row.get(9)?;

        let start_time = parse_timestamp(&start).unwrap_or_else(|| {
            warn!("Unparseable start_time for flight {}: {}", id, start);
            DateTime::<Utc>::default()
        });

        Ok(Flight {
            id,
            pilot_id: row.get(1)?,
            aircraft_id: row.get(2)?,
            start_time,
            end_time: end.as_deref().and_then(parse_timestamp),
            duration_minutes: row.get(5)?,
            max_altitude_ft: row.get(6)?,
            remote_id_verified: row.get(7)?,
            airspace_authorization_id: row.get(8)?,
            compliance_status: parse_or_default(&status, ComplianceStatus::Pending),
            verdict_fingerprint: row.get(10)?,
        })
    }

    fn row_to_notification(row: &rusqlite::Row) -> rusqlite::Result<Notification> {
        let id: i64 = row.get(0)?;
        let kind: String = row.get(4)?;
        let severity: String = row.get(5)?;
        let data: String = row.get(6)?;
        let created_at: String = row.get(7)?;

        let kind = kind.parse().unwrap_or_else(|_| {
            warn!("Unknown notification type {} on {}", kind, id);
            NotificationKind::ComplianceViolation
        });
        let data = serde_json::from_str(&data).unwrap_or_else(|e| {
            warn!("Invalid notification data on {}: {}", id, e);
            serde_json::Value::Null
        });

        Ok(Notification {
            id,
            user_id: row.get(1)?,
            title: row.get(2)?,
            message: row.get(3)?,
            kind,
            severity: parse_or_default(&severity, Severity::Info),
            data,
            created_at: parse_timestamp(&created_at).unwrap_or_default(),
            read: row.get(8)?,
        })
    }
}

impl FleetRecords for Storage {
    fn aircraft(&self, id: i64) -> Result<Option<Aircraft>> {
        let sql = format!("SELECT {AIRCRAFT_COLUMNS} FROM aircraft WHERE id = ?1");
        let aircraft = self
            .conn
            .query_row(&sql, [id], Self::row_to_aircraft)
            .optional()?;
        Ok(aircraft)
    }

    fn aircraft_for_user(&self, user_id: &str) -> Result<Vec<Aircraft>> {
        let sql = format!(
            "SELECT {AIRCRAFT_COLUMNS} FROM aircraft WHERE user_id = ?1 ORDER BY id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let aircraft = stmt
            .query_map([user_id], Self::row_to_aircraft)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(aircraft)
    }

    fn active_aircraft_expiring_on(&self, date: NaiveDate) -> Result<Vec<Aircraft>> {
        let sql = format!(
            "SELECT {AIRCRAFT_COLUMNS} FROM aircraft
             WHERE registration_expiry = ?1 AND status = ?2 ORDER BY id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let aircraft = stmt
            .query_map(
                params![date.to_string(), AircraftStatus::Active.as_str()],
                Self::row_to_aircraft,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(aircraft)
    }

    fn certificate(&self, user_id: &str) -> Result<Option<PilotCertificate>> {
        let certificate = self
            .conn
            .query_row(
                "SELECT user_id, certificate_number, expiry FROM pilot_certificates WHERE user_id = ?1",
                [user_id],
                Self::row_to_certificate,
            )
            .optional()?;
        Ok(certificate)
    }

    fn certificates_expiring_on(&self, date: NaiveDate) -> Result<Vec<PilotCertificate>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT user_id, certificate_number, expiry FROM pilot_certificates
            WHERE expiry = ?1 ORDER BY user_id
            ",
        )?;
        let certificates = stmt
            .query_map([date.to_string()], Self::row_to_certificate)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(certificates)
    }

    fn flight(&self, id: i64) -> Result<Option<Flight>> {
        let sql = format!("SELECT {FLIGHT_COLUMNS} FROM flights WHERE id = ?1");
        let flight = self
            .conn
            .query_row(&sql, [id], Self::row_to_flight)
            .optional()?;
        Ok(flight)
    }

    fn flights_for_pilot(
        &self,
        pilot_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Flight>> {
        let sql = format!(
            "SELECT {FLIGHT_COLUMNS} FROM flights
             WHERE pilot_id = ?1
               AND (?2 IS NULL OR start_time >= ?2)
               AND (?3 IS NULL OR start_time <= ?3)
             ORDER BY start_time DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let flights = stmt
            .query_map(
                params![pilot_id, from.map(format_timestamp), to.map(format_timestamp)],
                Self::row_to_flight,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(flights)
    }

    fn record_verdict(
        &self,
        flight_id: i64,
        status: ComplianceStatus,
        fingerprint: &str,
    ) -> Result<()> {
        let affected = self.conn.execute(
            "UPDATE flights SET compliance_status = ?1, verdict_fingerprint = ?2 WHERE id = ?3",
            params![status.as_str(), fingerprint, flight_id],
        )?;
        if affected == 0 {
            return Err(Error::not_found("flight", flight_id));
        }
        debug!("Recorded status {} for flight {}", status, flight_id);
        Ok(())
    }

    fn recent_notifications(
        &self,
        user_id: &str,
        kind: NotificationKind,
        since: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_id = ?1 AND type = ?2 AND created_at > ?3
             ORDER BY created_at DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let notifications = stmt
            .query_map(
                params![user_id, kind.as_str(), format_timestamp(since)],
                Self::row_to_notification,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(notifications)
    }

    fn insert_notification(
        &self,
        notification: &NewNotification,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        let data = serde_json::to_string(&notification.data)?;
        self.conn.execute(
            r"
            INSERT INTO notifications (user_id, title, message, type, severity, data, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                notification.user_id,
                notification.title,
                notification.message,
                notification.kind.as_str(),
                notification.severity.as_str(),
                data,
                format_timestamp(created_at),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!("Recorded notification {} for {}", id, notification.user_id);
        Ok(id)
    }
}

/// Fixed-width UTC timestamp text so that string order matches time order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a stored date; anything unparseable reads as unknown.
fn parse_date(
    value: Option<&str>,
    field: &str,
    record: impl std::fmt::Display,
) -> Option<NaiveDate> {
    let value = value?;
    match value.parse() {
        Ok(date) => Some(date),
        Err(_) => {
            warn!(
                "Unparseable {} '{}' on record {}, treating as unknown",
                field, value, record
            );
            None
        }
    }
}

fn parse_or_default<T>(value: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    value.parse().unwrap_or_else(|_| {
        warn!("Unknown value '{}', defaulting to {}", value, default);
        default
    })
}

/// Statistics about the store.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StorageStats {
    /// Registered aircraft.
    pub total_aircraft: i64,
    /// Certificates on file.
    pub total_certificates: i64,
    /// Logged flights.
    pub total_flights: i64,
    /// Recorded notifications.
    pub total_notifications: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
