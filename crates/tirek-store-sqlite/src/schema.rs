//! SQL schema for the Tirek SQLite store.
//!
//! Executed once at connection startup. `events`, `organizations` and
//! `user_accounts` are owned by the detection pipeline and the admin side;
//! only `subscriptions` is written by the notifier.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS organizations (
    id        TEXT PRIMARY KEY,
    org_name  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_accounts (
    id              TEXT PRIMARY KEY,
    user_name       TEXT NOT NULL,
    user_role       TEXT NOT NULL,   -- 'STUDENT' | 'TEACHER' | 'ADMIN' | ...
    organization_id TEXT NOT NULL REFERENCES organizations(id)
);

-- Append-only; written by the detection pipeline.
CREATE TABLE IF NOT EXISTS events (
    id              TEXT PRIMARY KEY,
    event_type      TEXT NOT NULL,   -- 'WEAPON' | 'FIGHTING' | 'SMOKING' | 'STUDENT_ENTRANCE'
    student_id      TEXT NOT NULL,
    organization_id TEXT NOT NULL,
    timestamp       TEXT NOT NULL,   -- RFC 3339 UTC, fixed width
    image_reference TEXT
);

CREATE TABLE IF NOT EXISTS subscriptions (
    id               TEXT PRIMARY KEY,
    organization_id  TEXT    NOT NULL REFERENCES organizations(id),
    telegram_chat_id INTEGER NOT NULL,
    student_id       TEXT    NOT NULL REFERENCES user_accounts(id),
    event_type       TEXT    NOT NULL,
    created_at       TEXT    NOT NULL,
    UNIQUE (telegram_chat_id, student_id, event_type)
);

CREATE INDEX IF NOT EXISTS events_timestamp_idx      ON events(timestamp);
CREATE INDEX IF NOT EXISTS accounts_org_idx          ON user_accounts(organization_id, user_role);
CREATE INDEX IF NOT EXISTS subscriptions_student_idx ON subscriptions(student_id, event_type);
CREATE INDEX IF NOT EXISTS subscriptions_type_idx    ON subscriptions(event_type);

PRAGMA user_version = 1;
";

/// The role value that marks a user account as a student.
pub const STUDENT_ROLE: &str = "STUDENT";
