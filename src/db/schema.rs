//! SQLite schema for the key-value table.

/// Statements applied, in order, when a SQLite backend is opened.
///
/// Every statement is idempotent so reopening an existing file is safe.
pub const SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS kv_entries (
    key         TEXT PRIMARY KEY NOT NULL,
    value       BLOB NOT NULL,
    updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
)
"#,
];
