//! SQLite schema of the progress store, applied in order at startup.

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Idempotent statements; each runs as its own query.
pub const PROGRESS_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS "_db_metadata" (
    "key" TEXT PRIMARY KEY,
    "value" TEXT NOT NULL
)"#,
    // The primary key arbitrates concurrent first inserts.
    r#"CREATE TABLE IF NOT EXISTS "competency_progress" (
    "competency_id" INTEGER NOT NULL,
    "user_id" INTEGER NOT NULL,
    "progress" REAL NOT NULL,
    "confidence" REAL NOT NULL,
    "confidence_reason" TEXT NOT NULL DEFAULT 'NO_REASON',
    "last_modified" TEXT,
    PRIMARY KEY ("competency_id", "user_id")
)"#,
    r#"CREATE INDEX IF NOT EXISTS "idx_competency_progress_user"
    ON "competency_progress" ("user_id")"#,
];

pub const RECORD_SCHEMA_VERSION: &str =
    r#"INSERT OR REPLACE INTO "_db_metadata" ("key", "value") VALUES ('schema_version', ?)"#;
