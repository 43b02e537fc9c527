//! SQL schema for the Campus SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS principals (
    principal_id  TEXT PRIMARY KEY,
    role          TEXT NOT NULL,   -- 'admin' | 'teacher' | 'student' | 'parent'
    state         TEXT NOT NULL,   -- 'active' | 'pending' | 'suspended'
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    class_ids     TEXT NOT NULL DEFAULT '[]',
    password_hash TEXT NOT NULL DEFAULT '',
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS classes (
    group_id TEXT PRIMARY KEY,
    name     TEXT NOT NULL
);

-- No foreign key on principal_id: enrolments may outlive the account and the
-- assignment engine reports such members instead of failing.
CREATE TABLE IF NOT EXISTS enrolments (
    group_id     TEXT NOT NULL REFERENCES classes(group_id),
    principal_id TEXT NOT NULL,
    position     INTEGER NOT NULL,
    PRIMARY KEY (group_id, principal_id)
);

CREATE TABLE IF NOT EXISTS fee_structures (
    template_id TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    amount      TEXT NOT NULL,   -- decimal string
    currency    TEXT NOT NULL
);

-- idempotency_key is indexed, not UNIQUE: repeated runs may write duplicates.
CREATE TABLE IF NOT EXISTS student_fees (
    obligation_id   TEXT PRIMARY KEY,
    student_id      TEXT NOT NULL,
    group_id        TEXT NOT NULL,
    template_id     TEXT NOT NULL REFERENCES fee_structures(template_id),
    amount          TEXT NOT NULL,
    currency        TEXT NOT NULL,
    due_date        TEXT NOT NULL,   -- YYYY-MM-DD
    status          TEXT NOT NULL DEFAULT 'pending',
    idempotency_key TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS student_fees_student_idx ON student_fees(student_id);
CREATE INDEX IF NOT EXISTS student_fees_key_idx     ON student_fees(idempotency_key);
CREATE INDEX IF NOT EXISTS enrolments_position_idx  ON enrolments(group_id, position);

PRAGMA user_version = 1;
";
