//! SQL schema for the tracker SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// `accounts.role` carries no CHECK constraint: a value written by an older or
/// newer build must still load, and decodes to an unrecognised role that sees
/// nothing.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS accounts (
    account_id      TEXT PRIMARY KEY,
    username        TEXT NOT NULL UNIQUE,
    credential_hash TEXT NOT NULL,           -- argon2 PHC string
    role            TEXT NOT NULL,
    subgroup        TEXT CHECK (subgroup IS NULL OR subgroup IN ('A', 'B')),
    active          INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL
);

-- One profile per account, created and removed with it.
CREATE TABLE IF NOT EXISTS rep_profiles (
    account_id TEXT PRIMARY KEY REFERENCES accounts(account_id) ON DELETE CASCADE,
    first_name TEXT NOT NULL,
    last_name  TEXT,
    email      TEXT,
    phone      TEXT,
    zone       TEXT
);

-- Only a SHA-256 digest of the bearer token is kept.
CREATE TABLE IF NOT EXISTS sessions (
    token_digest TEXT PRIMARY KEY,
    account_id   TEXT NOT NULL REFERENCES accounts(account_id) ON DELETE CASCADE,
    created_at   TEXT NOT NULL,
    expires_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS password_resets (
    token_digest TEXT PRIMARY KEY,
    account_id   TEXT NOT NULL REFERENCES accounts(account_id) ON DELETE CASCADE,
    created_at   TEXT NOT NULL,
    expires_at   TEXT NOT NULL,
    used         INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS businesses (
    business_id TEXT PRIMARY KEY,
    owner_id    TEXT NOT NULL REFERENCES accounts(account_id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    sector      TEXT,
    phone       TEXT,
    email       TEXT,
    address     TEXT,
    notes       TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS activities (
    activity_id  TEXT PRIMARY KEY,
    owner_id     TEXT NOT NULL REFERENCES accounts(account_id) ON DELETE CASCADE,
    business_id  TEXT REFERENCES businesses(business_id) ON DELETE SET NULL,
    kind         TEXT NOT NULL,
    title        TEXT NOT NULL,
    description  TEXT,
    outcome      TEXT,
    status       TEXT NOT NULL DEFAULT 'pending',
    occurred_on  TEXT NOT NULL,              -- YYYY-MM-DD
    duration_min INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS incidents (
    incident_id TEXT PRIMARY KEY,
    owner_id    TEXT NOT NULL REFERENCES accounts(account_id) ON DELETE CASCADE,
    business_id TEXT NOT NULL REFERENCES businesses(business_id) ON DELETE CASCADE,
    title       TEXT NOT NULL,
    description TEXT,
    priority    TEXT NOT NULL DEFAULT 'medium',
    status      TEXT NOT NULL DEFAULT 'open',
    category    TEXT,
    assignee    TEXT,
    due_on      TEXT,                        -- YYYY-MM-DD
    resolution  TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id  TEXT PRIMARY KEY,
    incident_id TEXT NOT NULL REFERENCES incidents(incident_id) ON DELETE CASCADE,
    author      TEXT NOT NULL,
    body        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS accounts_role_idx      ON accounts(role, active);
CREATE INDEX IF NOT EXISTS accounts_subgroup_idx  ON accounts(subgroup);
CREATE INDEX IF NOT EXISTS sessions_account_idx   ON sessions(account_id);
CREATE INDEX IF NOT EXISTS sessions_expiry_idx    ON sessions(expires_at);
CREATE INDEX IF NOT EXISTS businesses_owner_idx   ON businesses(owner_id);
-- Business names are unique regardless of case.
CREATE UNIQUE INDEX IF NOT EXISTS businesses_name_idx ON businesses(name COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS activities_owner_idx   ON activities(owner_id);
CREATE INDEX IF NOT EXISTS activities_date_idx    ON activities(occurred_on);
CREATE INDEX IF NOT EXISTS incidents_owner_idx    ON incidents(owner_id);
CREATE INDEX IF NOT EXISTS incidents_business_idx ON incidents(business_id);
CREATE INDEX IF NOT EXISTS comments_incident_idx  ON comments(incident_id);

PRAGMA user_version = 1;
";
