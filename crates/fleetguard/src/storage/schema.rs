//! `SQLite` schema definitions for fleetguard.
//!
//! Dates are stored as `YYYY-MM-DD` text and timestamps as RFC 3339 UTC text,
//! so range filters compare lexicographically.

/// SQL statement to create the aircraft table.
pub const CREATE_AIRCRAFT_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS aircraft (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    registration_number TEXT NOT NULL,
    registration_expiry TEXT,
    manufacturer TEXT NOT NULL DEFAULT '',
    model TEXT NOT NULL DEFAULT '',
    weight_lbs REAL,
    remote_id_serial TEXT,
    remote_id_type TEXT NOT NULL DEFAULT 'standard',
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create the pilot certificate table (one row per user).
pub const CREATE_CERTIFICATES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS pilot_certificates (
    user_id TEXT PRIMARY KEY,
    certificate_number TEXT NOT NULL,
    expiry TEXT,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create the flights table.
///
/// `aircraft_id` is deliberately not a foreign key: deleting an aircraft must
/// leave its flights in place so they evaluate as `data_missing`.
pub const CREATE_FLIGHTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS flights (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pilot_id TEXT NOT NULL,
    aircraft_id INTEGER NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT,
    duration_minutes REAL,
    max_altitude_ft REAL,
    remote_id_verified INTEGER NOT NULL DEFAULT 0,
    airspace_authorization_id TEXT,
    compliance_status TEXT NOT NULL DEFAULT 'pending',
    verdict_fingerprint TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create the notifications table.
pub const CREATE_NOTIFICATIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    type TEXT NOT NULL,
    severity TEXT NOT NULL,
    data TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    read INTEGER NOT NULL DEFAULT 0
)
";

/// Index for per-user aircraft listings.
pub const CREATE_AIRCRAFT_USER_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_aircraft_user ON aircraft(user_id)
";

/// Index for the daily registration sweep.
pub const CREATE_AIRCRAFT_EXPIRY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_aircraft_registration_expiry ON aircraft(registration_expiry)
";

/// Index for the daily certificate sweep.
pub const CREATE_CERTIFICATE_EXPIRY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_certificates_expiry ON pilot_certificates(expiry)
";

/// Index for windowed flight queries.
pub const CREATE_FLIGHTS_PILOT_TIME_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_flights_pilot_time ON flights(pilot_id, start_time DESC)
";

/// Index for the notification de-duplication lookup.
pub const CREATE_NOTIFICATIONS_DEDUPE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_notifications_dedupe ON notifications(user_id, type, created_at DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_AIRCRAFT_TABLE,
    CREATE_CERTIFICATES_TABLE,
    CREATE_FLIGHTS_TABLE,
    CREATE_NOTIFICATIONS_TABLE,
    CREATE_AIRCRAFT_USER_INDEX,
    CREATE_AIRCRAFT_EXPIRY_INDEX,
    CREATE_CERTIFICATE_EXPIRY_INDEX,
    CREATE_FLIGHTS_PILOT_TIME_INDEX,
    CREATE_NOTIFICATIONS_DEDUPE_INDEX,
    CREATE_METADATA_TABLE,
];
