//! SQL schema for the ledger SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS budgets (
    user_id     TEXT    NOT NULL,
    period_key  TEXT    NOT NULL,   -- 'YYYY-MM'
    version     INTEGER NOT NULL,
    doc         TEXT    NOT NULL,   -- JSON-encoded Budget
    PRIMARY KEY (user_id, period_key)
);

-- Transactions are never updated, only inserted and deleted.
CREATE TABLE IF NOT EXISTS transactions (
    id                TEXT PRIMARY KEY,
    user_id           TEXT NOT NULL,
    date              TEXT NOT NULL,   -- 'YYYY-MM-DD'
    created_at        TEXT NOT NULL,   -- RFC 3339 UTC
    origin_obligation TEXT,            -- set for generated transactions
    origin_due        TEXT,
    doc               TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS obligations (
    id          TEXT PRIMARY KEY,
    user_id     TEXT    NOT NULL,
    is_active   INTEGER NOT NULL,
    version     INTEGER NOT NULL,
    created_at  TEXT    NOT NULL,
    doc         TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS transactions_user_date_idx ON transactions(user_id, date);
CREATE INDEX IF NOT EXISTS obligations_user_idx       ON obligations(user_id);

-- One ledger entry per obligation occurrence, whatever the caller does.
CREATE UNIQUE INDEX IF NOT EXISTS transactions_occurrence_idx
    ON transactions(origin_obligation, origin_due)
    WHERE origin_obligation IS NOT NULL;

PRAGMA user_version = 1;
";
