//! SQLite storage layer for repo snapshots and content-addressed fingerprints.
//!
//! Each public method opens its own connection, so the caller never has to
//! manage connection lifetime and nothing is held between operations.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::config::{expand_tilde, StoreConfig, DEFAULT_BUSY_TIMEOUT_MS};
use crate::errors::{OrgVizError, OrgVizResult};
use crate::models::{
    fingerprint_id, CohortAnalysis, Fingerprint, FingerprintKind, FingerprintUsage, Ideal, Payload,
    StoredSnapshot,
};
use crate::store::schema;
use crate::store::sql::NamedParams;

const SNAPSHOT_COLUMNS: &str = "id, workspace_id, provider_id, owner, name, url, commit_sha, \
                                analysis, query, timestamp";

fn row_to_snapshot(row: &Row<'_>) -> rusqlite::Result<StoredSnapshot> {
    Ok(StoredSnapshot {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        provider_id: row.get(2)?,
        owner: row.get(3)?,
        name: row.get(4)?,
        url: row.get(5)?,
        commit_sha: row.get(6)?,
        analysis: Payload::from_raw(row.get::<_, String>(7)?),
        query: row.get(8)?,
        timestamp: row.get(9)?,
    })
}

fn row_to_fingerprint(row: &Row<'_>) -> rusqlite::Result<Fingerprint> {
    Ok(Fingerprint::with_sha(
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        Payload::from_raw(row.get::<_, String>(3)?),
    ))
}

/// Insert a fingerprint row unless its content-addressed id already exists.
/// Existing rows are never updated.
fn insert_fingerprint(conn: &Connection, fp: &Fingerprint) -> OrgVizResult<String> {
    let id = fp.id();
    conn.execute(
        "INSERT INTO fingerprints (id, name, feature_name, sha, data) \
         VALUES (?1, ?2, ?3, ?4, ?5) \
         ON CONFLICT(id) DO NOTHING;",
        params![id, fp.name, fp.feature_name(), fp.sha, fp.data.as_str()],
    )?;
    Ok(id)
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// SQLite fingerprint and snapshot store.
#[derive(Clone, Debug)]
pub struct Database {
    db_path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    /// Create a new `Database`.  The path is expanded and parent directories
    /// are created if they do not already exist.
    pub fn new(db_path: impl AsRef<Path>) -> OrgVizResult<Self> {
        let expanded = expand_tilde(&db_path.as_ref().to_string_lossy());
        let resolved = if expanded.is_absolute() {
            expanded
        } else {
            std::env::current_dir()?.join(&expanded)
        };
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            db_path: resolved,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        })
    }

    pub fn from_config(config: &StoreConfig) -> OrgVizResult<Self> {
        let mut db = Self::new(&config.db_path)?;
        db.busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        Ok(db)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a new SQLite connection, enable `foreign_keys`, and return it.
    /// The connection closes when the returned value is dropped.
    pub fn connect(&self) -> OrgVizResult<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    // -----------------------------------------------------------------------
    // Schema
    // -----------------------------------------------------------------------

    /// Set WAL mode, create all tables and indexes, then run pending
    /// migrations.
    pub fn init_schema(&self) -> OrgVizResult<()> {
        let conn = self.connect()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        for stmt in schema::SCHEMA_STATEMENTS {
            conn.execute_batch(stmt)?;
        }
        schema::migrate_schema(&conn)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Store a fingerprint value if its `(type, name, sha)` has not been seen.
    pub fn upsert_fingerprint(&self, fp: &Fingerprint) -> OrgVizResult<()> {
        let conn = self.connect()?;
        insert_fingerprint(&conn, fp)?;
        Ok(())
    }

    /// Replace the snapshot `snapshot.id` and its fingerprint links.
    ///
    /// Old join rows and the old snapshot row are deleted before the new rows
    /// are written, all in one transaction. Any error drops the transaction,
    /// which rolls back and leaves the previous snapshot in place.
    ///
    /// Two writers replacing the same id concurrently are serialized by
    /// SQLite's write lock; the last to commit wins.
    pub fn replace_snapshot(
        &self,
        snapshot: &StoredSnapshot,
        fingerprints: &[Fingerprint],
    ) -> OrgVizResult<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "DELETE FROM repo_fingerprints WHERE repo_snapshot_id = ?1;",
            params![snapshot.id],
        )?;
        tx.execute(
            "DELETE FROM repo_snapshots WHERE id = ?1;",
            params![snapshot.id],
        )?;

        tx.execute(
            "INSERT INTO repo_snapshots ( \
                 id, workspace_id, provider_id, owner, name, url, commit_sha, \
                 analysis, query, timestamp \
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                snapshot.id,
                snapshot.workspace_id,
                snapshot.provider_id,
                snapshot.owner,
                snapshot.name,
                snapshot.url,
                snapshot.commit_sha,
                snapshot.analysis.as_str(),
                snapshot.query,
                snapshot.timestamp,
            ],
        )?;

        {
            let mut link = tx.prepare(
                "INSERT INTO repo_fingerprints (repo_snapshot_id, fingerprint_id) \
                 VALUES (?1, ?2) \
                 ON CONFLICT(repo_snapshot_id, fingerprint_id) DO NOTHING;",
            )?;
            for fp in fingerprints {
                let fingerprint_id = insert_fingerprint(&tx, fp)?;
                link.execute(params![snapshot.id, fingerprint_id])?;
            }
        }

        tx.commit()?;
        tracing::debug!(
            snapshot_id = %snapshot.id,
            fingerprints = fingerprints.len(),
            "replaced repo snapshot"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Snapshot reads
    // -----------------------------------------------------------------------

    pub fn load_by_id(&self, id: &str) -> OrgVizResult<Option<StoredSnapshot>> {
        let conn = self.connect()?;
        let snapshot = conn
            .query_row(
                &format!("SELECT {SNAPSHOT_COLUMNS} FROM repo_snapshots WHERE id = ?1;"),
                params![id],
                row_to_snapshot,
            )
            .optional()?;
        Ok(snapshot)
    }

    /// Look a snapshot up by `(owner, name, commit_sha)`. When several
    /// workspaces hold the same commit, the most recent snapshot wins.
    pub fn load_by_repo_ref(
        &self,
        owner: &str,
        name: &str,
        commit_sha: &str,
    ) -> OrgVizResult<Option<StoredSnapshot>> {
        let conn = self.connect()?;
        let snapshot = conn
            .query_row(
                &format!(
                    "SELECT {SNAPSHOT_COLUMNS} FROM repo_snapshots \
                     WHERE owner = ?1 AND name = ?2 AND commit_sha = ?3 \
                     ORDER BY timestamp DESC LIMIT 1;"
                ),
                params![owner, name, commit_sha],
                row_to_snapshot,
            )
            .optional()?;
        Ok(snapshot)
    }

    /// Every snapshot in a workspace (`"*"` for all), ordered by repo.
    pub fn load_in_workspace(&self, workspace_id: &str) -> OrgVizResult<Vec<StoredSnapshot>> {
        let conn = self.connect()?;
        let mut named = NamedParams::new();
        let clause = named.workspace_clause("rs", workspace_id);
        let mut stmt = conn.prepare(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM repo_snapshots rs WHERE {clause} \
             ORDER BY owner, name, timestamp;"
        ))?;
        let snapshots = stmt
            .query_map(named.as_named().as_slice(), row_to_snapshot)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(snapshots)
    }

    pub fn count_snapshots(&self) -> OrgVizResult<i64> {
        let conn = self.connect()?;
        let count = conn.query_row("SELECT COUNT(1) FROM repo_snapshots;", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_fingerprints(&self) -> OrgVizResult<i64> {
        let conn = self.connect()?;
        let count = conn.query_row("SELECT COUNT(1) FROM fingerprints;", [], |row| row.get(0))?;
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Fingerprint reads
    // -----------------------------------------------------------------------

    /// Fingerprints linked to snapshots in a workspace, optionally narrowed by
    /// type and name.
    ///
    /// Without `distinct`, one row is returned per repo link, so a value held
    /// by three repos appears three times. With `distinct`, rows are deduped
    /// by `(type, name, sha)`.
    pub fn fingerprints_in_workspace(
        &self,
        workspace_id: &str,
        distinct: bool,
        fingerprint_type: Option<&str>,
        name: Option<&str>,
    ) -> OrgVizResult<Vec<Fingerprint>> {
        let conn = self.connect()?;
        let mut named = NamedParams::new();
        let mut clauses = vec![named.workspace_clause("rs", workspace_id)];
        if let Some(t) = fingerprint_type {
            clauses.push(format!("f.feature_name = {}", named.bind(":type", t.to_string())));
        }
        if let Some(n) = name {
            clauses.push(format!("f.name = {}", named.bind(":name", n.to_string())));
        }

        let select = if distinct { "SELECT DISTINCT" } else { "SELECT" };
        let sql = format!(
            "{select} f.feature_name, f.name, f.sha, f.data \
             FROM repo_fingerprints rf \
             JOIN repo_snapshots rs ON rs.id = rf.repo_snapshot_id \
             JOIN fingerprints f ON f.id = rf.fingerprint_id \
             WHERE {} \
             ORDER BY f.feature_name, f.name, f.sha;",
            clauses.join(" AND ")
        );
        let mut stmt = conn.prepare(&sql)?;
        let fingerprints = stmt
            .query_map(named.as_named().as_slice(), row_to_fingerprint)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(fingerprints)
    }

    /// Distinct `(type, name)` combinations present in a workspace.
    pub fn distinct_fingerprint_kinds(&self, workspace_id: &str) -> OrgVizResult<Vec<FingerprintKind>> {
        let conn = self.connect()?;
        let mut named = NamedParams::new();
        let clause = named.workspace_clause("rs", workspace_id);
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT f.feature_name, f.name \
             FROM repo_fingerprints rf \
             JOIN repo_snapshots rs ON rs.id = rf.repo_snapshot_id \
             JOIN fingerprints f ON f.id = rf.fingerprint_id \
             WHERE {clause} \
             ORDER BY f.feature_name, f.name;"
        ))?;
        let kinds = stmt
            .query_map(named.as_named().as_slice(), |row| {
                Ok(FingerprintKind {
                    fingerprint_type: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(kinds)
    }

    /// Stored analytics for a workspace, highest entropy first.
    pub fn fingerprint_usage_for_type(
        &self,
        workspace_id: &str,
        fingerprint_type: Option<&str>,
    ) -> OrgVizResult<Vec<FingerprintUsage>> {
        let conn = self.connect()?;
        let mut named = NamedParams::new();
        let mut clauses = vec![named.workspace_clause("fa", workspace_id)];
        if let Some(t) = fingerprint_type {
            clauses.push(format!("fa.feature_name = {}", named.bind(":type", t.to_string())));
        }
        let mut stmt = conn.prepare(&format!(
            "SELECT fa.feature_name, fa.name, fa.count, fa.variants, fa.entropy \
             FROM fingerprint_analytics fa \
             WHERE {} \
             ORDER BY fa.entropy IS NULL, fa.entropy DESC, fa.feature_name, fa.name;",
            clauses.join(" AND ")
        ))?;
        let usage = stmt
            .query_map(named.as_named().as_slice(), |row| {
                Ok(FingerprintUsage {
                    fingerprint_type: row.get(0)?,
                    name: row.get(1)?,
                    count: row.get(2)?,
                    variants: row.get(3)?,
                    entropy: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(usage)
    }

    // -----------------------------------------------------------------------
    // Analytics
    // -----------------------------------------------------------------------

    /// Upsert analytics rows for a workspace in one transaction.
    pub fn upsert_fingerprint_analytics(
        &self,
        workspace_id: &str,
        rows: &[(FingerprintKind, CohortAnalysis, bool)],
    ) -> OrgVizResult<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO fingerprint_analytics \
                     (feature_name, name, workspace_id, entropy, variants, count) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(feature_name, name, workspace_id) DO UPDATE SET \
                     entropy = excluded.entropy, \
                     variants = excluded.variants, \
                     count = excluded.count;",
            )?;
            for (kind, cohort, entropy_enabled) in rows {
                let entropy = entropy_enabled.then_some(cohort.entropy);
                stmt.execute(params![
                    kind.fingerprint_type,
                    kind.name,
                    workspace_id,
                    entropy,
                    cohort.variants as i64,
                    cohort.count as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Ideals
    // -----------------------------------------------------------------------

    /// Record the ideal for a fingerprint kind, replacing any previous one.
    /// Elimination ideals are not stored yet.
    pub fn store_ideal(&self, workspace_id: &str, ideal: &Ideal) -> OrgVizResult<()> {
        match ideal {
            Ideal::Concrete { ideal: fp, .. } => {
                let conn = self.connect()?;
                let id = format!("{workspace_id}_{}_{}", fp.feature_name(), fp.name);
                conn.execute(
                    "INSERT INTO ideal_fingerprints (workspace_id, id, name, feature_name, sha, data) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                     ON CONFLICT(id) DO UPDATE SET sha = excluded.sha, data = excluded.data;",
                    params![workspace_id, id, fp.name, fp.feature_name(), fp.sha, fp.data.as_str()],
                )?;
                Ok(())
            }
            Ideal::Elimination { fingerprint_type, name, .. } => Err(OrgVizError::Unsupported(
                format!("elimination ideal for {fingerprint_type}/{name}"),
            )),
        }
    }

    /// The concrete ideal for `(workspace, type, name)`, if one is stored.
    pub fn fetch_ideal(
        &self,
        workspace_id: &str,
        fingerprint_type: &str,
        name: &str,
    ) -> OrgVizResult<Option<Ideal>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT id, feature_name, name, sha, data FROM ideal_fingerprints \
                 WHERE workspace_id = ?1 AND feature_name = ?2 AND name = ?3;",
                params![workspace_id, fingerprint_type, name],
                |row| {
                    let id: String = row.get(0)?;
                    let fp = Fingerprint::with_sha(
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        Payload::from_raw(row.get::<_, String>(4)?),
                    );
                    Ok((id, fp))
                },
            )
            .optional()?;
        Ok(row.map(|(id, fp)| Ideal::Concrete {
            ideal: fp,
            reason: format!("Local database row {id}"),
        }))
    }

    /// Whether a fingerprint row with this composite id exists.
    pub fn has_fingerprint(&self, feature_name: &str, name: &str, sha: &str) -> OrgVizResult<bool> {
        let conn = self.connect()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM fingerprints WHERE id = ?1;",
                params![fingerprint_id(feature_name, name, sha)],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::models::DEFAULT_PROVIDER_ID;

    fn test_db() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("orgviz.db")).unwrap();
        db.init_schema().unwrap();
        (dir, db)
    }

    fn snapshot(id: &str, workspace_id: &str, owner: &str, name: &str) -> StoredSnapshot {
        StoredSnapshot {
            id: id.to_string(),
            workspace_id: workspace_id.to_string(),
            provider_id: DEFAULT_PROVIDER_ID.to_string(),
            owner: owner.to_string(),
            name: name.to_string(),
            url: format!("https://github.com/{owner}/{name}"),
            commit_sha: "dead0x".to_string(),
            analysis: Payload::from_raw("{}"),
            query: None,
            timestamp: Utc::now(),
        }
    }

    fn fp(t: &str, name: &str, sha: &str) -> Fingerprint {
        Fingerprint::with_sha(t, name, sha, Payload::from_raw(format!("\"{sha}\"")))
    }

    #[test]
    fn test_upsert_fingerprint_is_idempotent() {
        let (_dir, db) = test_db();
        let f = Fingerprint::with_sha("MST3k", "Rowsdower", "8x4d", Payload::from_raw("{}"));
        db.upsert_fingerprint(&f).unwrap();
        db.upsert_fingerprint(&f).unwrap();
        assert_eq!(db.count_fingerprints().unwrap(), 1);
        assert!(db.has_fingerprint("MST3k", "Rowsdower", "8x4d").unwrap());
    }

    #[test]
    fn test_upsert_never_rewrites_data() {
        let (_dir, db) = test_db();
        let original = Fingerprint::with_sha("npm", "lodash", "s1", Payload::from_raw("\"first\""));
        let clash = Fingerprint::with_sha("npm", "lodash", "s1", Payload::from_raw("\"second\""));
        db.upsert_fingerprint(&original).unwrap();
        db.upsert_fingerprint(&clash).unwrap();

        db.replace_snapshot(&snapshot("a", "ws", "o", "a"), &[clash]).unwrap();
        let stored = db.fingerprints_in_workspace("ws", true, None, None).unwrap();
        assert_eq!(stored, vec![original]);
    }

    #[test]
    fn test_concurrent_replace_keeps_one_writer() {
        const WRITERS: usize = 8;
        let (_dir, db) = test_db();
        let sets: Vec<Vec<Fingerprint>> = (0..WRITERS)
            .map(|w| (0..5).map(|k| fp("npm", &format!("w{w}-{k}"), "1")).collect())
            .collect();

        std::thread::scope(|scope| {
            for (w, set) in sets.iter().enumerate() {
                let db = &db;
                scope.spawn(move || {
                    let snap = snapshot("shared_sha", "ws", "o", &format!("writer-{w}"));
                    db.replace_snapshot(&snap, set).unwrap();
                });
            }
        });

        assert_eq!(db.count_snapshots().unwrap(), 1);
        let winner = db.load_by_id("shared_sha").unwrap().unwrap();
        let w: usize = winner.name.trim_start_matches("writer-").parse().unwrap();

        // Links belong to the same writer as the snapshot row, and all of them.
        let linked = db.fingerprints_in_workspace("ws", false, None, None).unwrap();
        assert_eq!(linked, sets[w]);
        // Losers' fingerprint values persist unlinked.
        assert_eq!(db.count_fingerprints().unwrap(), (WRITERS * 5) as i64);
    }

    #[test]
    fn test_replace_snapshot_drops_previous_links() {
        let (_dir, db) = test_db();
        let snap = snapshot("repo_sha", "ws", "o", "r");
        db.replace_snapshot(&snap, &[fp("npm", "a", "1"), fp("npm", "b", "1")]).unwrap();
        db.replace_snapshot(&snap, &[fp("npm", "c", "1")]).unwrap();

        let linked = db.fingerprints_in_workspace("ws", false, None, None).unwrap();
        let names: Vec<&str> = linked.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["c"]);
        assert_eq!(db.count_snapshots().unwrap(), 1);
        // Fingerprint rows themselves are content-addressed and survive.
        assert_eq!(db.count_fingerprints().unwrap(), 3);
    }

    #[test]
    fn test_failed_replace_keeps_previous_state() {
        let (_dir, db) = test_db();
        let snap = snapshot("repo_sha", "ws", "o", "r");
        db.replace_snapshot(&snap, &[fp("npm", "a", "1")]).unwrap();

        // Sabotage the join table so the link insert fails mid-transaction.
        db.connect()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_links BEFORE INSERT ON repo_fingerprints \
                 BEGIN SELECT RAISE(ABORT, 'links rejected'); END;",
            )
            .unwrap();

        let err = db.replace_snapshot(&snap, &[fp("npm", "b", "1")]).unwrap_err();
        assert!(err.to_string().contains("links rejected"));

        db.connect()
            .unwrap()
            .execute_batch("DROP TRIGGER reject_links;")
            .unwrap();
        let linked = db.fingerprints_in_workspace("ws", false, None, None).unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].name, "a");
    }

    #[test]
    fn test_point_lookups_return_none_when_absent() {
        let (_dir, db) = test_db();
        assert!(db.load_by_id("nope").unwrap().is_none());
        assert!(db.load_by_repo_ref("o", "r", "sha").unwrap().is_none());
    }

    #[test]
    fn test_load_by_id_and_repo_ref() {
        let (_dir, db) = test_db();
        let snap = snapshot("https:/github.com/o/r_dead0x", "ws", "o", "r");
        db.replace_snapshot(&snap, &[]).unwrap();

        let by_id = db.load_by_id(&snap.id).unwrap().unwrap();
        assert_eq!(by_id.url, snap.url);
        assert_eq!(by_id.analysis.as_str(), "{}");
        let by_ref = db.load_by_repo_ref("o", "r", "dead0x").unwrap().unwrap();
        assert_eq!(by_ref.id, snap.id);
    }

    #[test]
    fn test_workspace_scoping_and_wildcard() {
        let (_dir, db) = test_db();
        db.replace_snapshot(&snapshot("a", "TJVC", "o", "a"), &[fp("npm", "x", "1")]).unwrap();
        db.replace_snapshot(&snapshot("b", "ARGO", "o", "b"), &[fp("npm", "y", "1")]).unwrap();

        assert_eq!(db.load_in_workspace("TJVC").unwrap().len(), 1);
        assert_eq!(db.load_in_workspace("*").unwrap().len(), 2);
        assert_eq!(db.fingerprints_in_workspace("ARGO", false, None, None).unwrap()[0].name, "y");
        assert_eq!(db.distinct_fingerprint_kinds("*").unwrap().len(), 2);
    }

    #[test]
    fn test_distinct_collapses_repo_links() {
        let (_dir, db) = test_db();
        let shared = fp("npm", "lodash", "4.17");
        db.replace_snapshot(&snapshot("a", "ws", "o", "a"), &[shared.clone()]).unwrap();
        db.replace_snapshot(&snapshot("b", "ws", "o", "b"), &[shared.clone()]).unwrap();

        assert_eq!(db.fingerprints_in_workspace("ws", false, None, None).unwrap().len(), 2);
        assert_eq!(db.fingerprints_in_workspace("ws", true, None, None).unwrap(), vec![shared]);
        assert!(db
            .fingerprints_in_workspace("ws", true, Some("npm"), Some("react"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_ideals_round_trip_and_replace() {
        let (_dir, db) = test_db();
        assert!(db.fetch_ideal("ws", "npm", "lodash").unwrap().is_none());

        let first = Ideal::Concrete { ideal: fp("npm", "lodash", "4.17"), reason: "pinned".into() };
        let second = Ideal::Concrete { ideal: fp("npm", "lodash", "5.0"), reason: "bump".into() };
        db.store_ideal("ws", &first).unwrap();
        db.store_ideal("ws", &second).unwrap();

        match db.fetch_ideal("ws", "npm", "lodash").unwrap() {
            Some(Ideal::Concrete { ideal, reason }) => {
                assert_eq!(ideal.sha, "5.0");
                assert_eq!(reason, "Local database row ws_npm_lodash");
            }
            other => panic!("unexpected ideal: {other:?}"),
        }
        assert!(db.fetch_ideal("other", "npm", "lodash").unwrap().is_none());
    }

    #[test]
    fn test_elimination_ideal_is_unsupported() {
        let (_dir, db) = test_db();
        let ideal = Ideal::Elimination {
            fingerprint_type: "npm".into(),
            name: "left-pad".into(),
            reason: "removed".into(),
        };
        assert!(matches!(db.store_ideal("ws", &ideal), Err(OrgVizError::Unsupported(_))));
    }
}
