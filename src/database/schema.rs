// Database schema definitions.
// Every statement is idempotent; `Database::run_migrations` applies them in order.

pub const SCHEMA_VERSION: i64 = 1;

pub const SCHEMA_VERSION_DDL: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    )
";

/// One row per pull request and category. `seen_at` and `updated_at` are
/// Unix microseconds.
pub const WATERMARKS_DDL: &str = "
    CREATE TABLE IF NOT EXISTS watermarks (
        pr_key     TEXT    NOT NULL,
        category   TEXT    NOT NULL CHECK(category IN ('comment', 'review')),
        seen_at    INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (pr_key, category)
    )
";

pub const ENGINE_STATE_DDL: &str = "
    CREATE TABLE IF NOT EXISTS engine_state (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

pub const DELIVERED_NOTIFICATIONS_DDL: &str = "
    CREATE TABLE IF NOT EXISTS delivered_notifications (
        id           TEXT    PRIMARY KEY,
        delivered_at INTEGER NOT NULL
    )
";

pub const CREDENTIALS_DDL: &str = "
    CREATE TABLE IF NOT EXISTS credentials (
        name     TEXT    PRIMARY KEY,
        token    TEXT    NOT NULL,
        saved_at INTEGER NOT NULL
    )
";

pub const SCHEMA_V1: &[&str] = &[
    WATERMARKS_DDL,
    ENGINE_STATE_DDL,
    DELIVERED_NOTIFICATIONS_DDL,
    CREDENTIALS_DDL,
];

// engine_state keys
pub const BASELINE_ESTABLISHED_KEY: &str = "baseline_established";
pub const CREDENTIAL_FINGERPRINT_KEY: &str = "credential_fingerprint";
