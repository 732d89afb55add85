//! SQLite schema DDL and migration framework.

use rusqlite::{Connection, OptionalExtension};

use crate::errors::{OrgVizError, OrgVizResult};

/// Current schema version. Migrations run from whatever the DB currently
/// reports up to this value.
pub const SCHEMA_VERSION: i32 = 2;

/// Baseline DDL (schema v1): 6 CREATE TABLE + 3 CREATE INDEX.
///
/// Executed with `CREATE … IF NOT EXISTS` so they are safe to replay on an
/// already-initialised database. Later additions live in [`MIGRATIONS`].
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // ── tables (6) ──────────────────────────────────────────────────────
    "CREATE TABLE IF NOT EXISTS repo_meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );",
    "CREATE TABLE IF NOT EXISTS migration_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_version INTEGER NOT NULL,
        to_version INTEGER NOT NULL,
        status TEXT NOT NULL,
        error_message TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
    "CREATE TABLE IF NOT EXISTS repo_snapshots (
        id TEXT PRIMARY KEY,
        workspace_id TEXT NOT NULL,
        provider_id TEXT NOT NULL,
        owner TEXT NOT NULL,
        name TEXT NOT NULL,
        url TEXT NOT NULL,
        commit_sha TEXT NOT NULL,
        analysis TEXT NOT NULL,
        query TEXT,
        timestamp TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS fingerprints (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        feature_name TEXT NOT NULL,
        sha TEXT NOT NULL,
        data TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS repo_fingerprints (
        repo_snapshot_id TEXT NOT NULL REFERENCES repo_snapshots(id),
        fingerprint_id TEXT NOT NULL REFERENCES fingerprints(id),
        PRIMARY KEY(repo_snapshot_id, fingerprint_id)
    );",
    "CREATE TABLE IF NOT EXISTS ideal_fingerprints (
        workspace_id TEXT NOT NULL,
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        feature_name TEXT NOT NULL,
        sha TEXT NOT NULL,
        data TEXT NOT NULL
    );",
    // ── indexes (3) ─────────────────────────────────────────────────────
    "CREATE INDEX IF NOT EXISTS idx_fingerprints_kind ON fingerprints(feature_name, name);",
    "CREATE INDEX IF NOT EXISTS idx_snapshots_workspace ON repo_snapshots(workspace_id);",
    "CREATE INDEX IF NOT EXISTS idx_snapshots_repo_ref ON repo_snapshots(owner, name, commit_sha);",
];

/// v2: the analytics job's table and the reverse join index used by tree
/// queries.
const ANALYTICS_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS fingerprint_analytics (
        feature_name TEXT NOT NULL,
        name TEXT NOT NULL,
        workspace_id TEXT NOT NULL,
        entropy REAL,
        variants INTEGER NOT NULL,
        count INTEGER NOT NULL,
        PRIMARY KEY(feature_name, name, workspace_id)
    );",
    "CREATE INDEX IF NOT EXISTS idx_repo_fingerprints_fp ON repo_fingerprints(fingerprint_id);",
];

/// One schema step: applying `statements` moves the store to `version`.
pub struct Migration {
    pub version: i32,
    pub description: &'static str,
    pub statements: &'static [&'static str],
}

/// Every step, oldest first. The last entry's version is [`SCHEMA_VERSION`].
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "baseline snapshot and fingerprint tables",
        statements: SCHEMA_STATEMENTS,
    },
    Migration {
        version: 2,
        description: "fingerprint analytics",
        statements: ANALYTICS_STATEMENTS,
    },
];

// ─── Migration framework ────────────────────────────────────────────────────

/// Apply every migration newer than the stored version, each in its own
/// transaction. A failed step is rolled back, recorded in
/// `migration_history`, and returned; earlier steps stay applied.
///
/// Must not be called inside an open transaction.
pub fn migrate_schema(conn: &Connection) -> OrgVizResult<()> {
    let mut current = schema_version(conn)?;

    for migration in MIGRATIONS.iter().filter(move |m| m.version > current) {
        match apply(conn, current, migration) {
            Ok(()) => {
                tracing::debug!(
                    version = migration.version,
                    description = migration.description,
                    "applied schema migration"
                );
                current = migration.version;
            }
            Err(e) => {
                let _ = record_step(conn, current, migration.version, "failed", Some(&e.to_string()));
                tracing::error!(
                    from = current,
                    to = migration.version,
                    error = %e,
                    "schema migration failed"
                );
                return Err(e);
            }
        }
    }

    Ok(())
}

fn apply(conn: &Connection, from: i32, migration: &Migration) -> OrgVizResult<()> {
    let tx = conn.unchecked_transaction()?;
    for stmt in migration.statements {
        tx.execute_batch(stmt)?;
    }
    tx.execute(
        "INSERT INTO repo_meta(key, value) VALUES('schema_version', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        rusqlite::params![migration.version.to_string()],
    )?;
    record_step(&tx, from, migration.version, "success", None)?;
    tx.commit()?;
    Ok(())
}

/// Stored schema version; 0 for a store with no `repo_meta` table or no
/// version row yet.
pub fn schema_version(conn: &Connection) -> OrgVizResult<i32> {
    let has_meta: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'repo_meta');",
        [],
        |row| row.get(0),
    )?;
    if !has_meta {
        return Ok(0);
    }
    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM repo_meta WHERE key = 'schema_version';",
            [],
            |row| row.get(0),
        )
        .optional()?;
    match stored {
        None => Ok(0),
        Some(v) => v
            .parse::<i32>()
            .map_err(|_| OrgVizError::Validation(format!("unreadable schema version '{v}'"))),
    }
}

fn record_step(
    conn: &Connection,
    from: i32,
    to: i32,
    status: &str,
    error: Option<&str>,
) -> OrgVizResult<()> {
    conn.execute(
        "INSERT INTO migration_history(from_version, to_version, status, error_message) \
         VALUES (?1, ?2, ?3, ?4);",
        rusqlite::params![from, to, status, error],
    )?;
    Ok(())
}
