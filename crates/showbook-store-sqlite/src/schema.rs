//! SQL schema for the showbook SQLite store.
//!
//! Executed every time a connection is opened. Tables are only ever created,
//! never dropped or altered destructively.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA busy_timeout = 5000;

CREATE TABLE IF NOT EXISTS processed_showing_requests (
    request_id     TEXT PRIMARY KEY,   -- external, stable id
    user_id        TEXT,
    property_id    TEXT NOT NULL,
    status         TEXT NOT NULL DEFAULT 'received', -- received | resolved | failed | booked
    requested_date TEXT,               -- YYYY-MM-DD
    requested_time TEXT,               -- HH:MM
    created_at     TEXT NOT NULL,      -- RFC 3339 UTC
    processed_at   TEXT
);

CREATE TABLE IF NOT EXISTS properties (
    property_id    TEXT PRIMARY KEY,
    address        TEXT,
    city           TEXT,
    province       TEXT,
    postal_code    TEXT,
    price          INTEGER,
    bedrooms       INTEGER,
    bathrooms      REAL,
    square_feet    INTEGER,
    property_type  TEXT,
    listing_url    TEXT,
    mls_number     TEXT,
    listing_status TEXT,
    description    TEXT,
    updated_at     TEXT NOT NULL
);

-- Bookings are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS bookings (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    property_id       TEXT NOT NULL,
    request_id        TEXT,            -- not a strict foreign key
    booking_date      TEXT NOT NULL,
    booking_time      TEXT NOT NULL,
    duration_minutes  INTEGER NOT NULL DEFAULT 30,
    requester_name    TEXT NOT NULL,
    requester_email   TEXT NOT NULL,
    requester_phone   TEXT,
    message           TEXT,
    status            TEXT NOT NULL DEFAULT 'pending', -- pending | confirmed | failed
    auto_confirmed    INTEGER NOT NULL DEFAULT 0,
    booking_url       TEXT,
    screenshot_path   TEXT,
    confirmation_text TEXT,
    created_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS requests_status_idx   ON processed_showing_requests(status);
CREATE INDEX IF NOT EXISTS requests_property_idx ON processed_showing_requests(property_id);
CREATE INDEX IF NOT EXISTS bookings_property_idx ON bookings(property_id);

PRAGMA user_version = 1;
";
