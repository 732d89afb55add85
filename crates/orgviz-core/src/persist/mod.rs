//! Persistence façade: turns analysis results into snapshot replacements and
//! collects per-item outcomes instead of failing the batch.

pub mod async_store;

use crate::config::StoreConfig;
use crate::errors::OrgVizResult;
use crate::models::{
    Fingerprint, FingerprintKind, Ideal, Payload, PersistResult, PersistenceFailure, ProjectAnalysisResult,
    RepoRef, StoredSnapshot, DEFAULT_PROVIDER_ID,
};
use crate::store::database::Database;

const BUILD_STEP: &str = "build object to persist";
const PERSIST_STEP: &str = "persist in DB";

/// Stable snapshot id for a repo at a commit: the url with its first `/`
/// removed, then `_` and the sha.
pub fn snapshot_id(url: &str, sha: &str) -> String {
    format!("{}_{}", url.replacen('/', "", 1), sha)
}

/// Map an analysis result onto the row it will be stored as, or the failure
/// explaining why it cannot be.
fn build_snapshot(result: &ProjectAnalysisResult) -> Result<StoredSnapshot, PersistenceFailure> {
    let repo_ref = result.analysis.id.as_ref().ok_or_else(|| PersistenceFailure {
        repo_url: "missing repoRef".to_string(),
        while_trying_to: BUILD_STEP.to_string(),
        message: "No RepoRef".to_string(),
    })?;

    let (url, sha) = match (repo_ref.url.as_deref(), repo_ref.sha.as_deref()) {
        (Some(url), Some(sha)) if !url.is_empty() && !sha.is_empty() => (url, sha),
        _ => return Err(incomplete_ref(repo_ref)),
    };

    let commit_sha = result
        .analysis
        .git_status
        .as_ref()
        .and_then(|status| status.sha.clone())
        .unwrap_or_else(|| sha.to_string());

    let analysis = Payload::from_value(&result.analysis).map_err(|e| PersistenceFailure {
        repo_url: url.to_string(),
        while_trying_to: BUILD_STEP.to_string(),
        message: e.to_string(),
    })?;

    Ok(StoredSnapshot {
        id: snapshot_id(url, sha),
        workspace_id: result.workspace_id.clone(),
        provider_id: DEFAULT_PROVIDER_ID.to_string(),
        owner: repo_ref.owner.clone(),
        name: repo_ref.repo.clone(),
        url: url.to_string(),
        commit_sha,
        analysis,
        query: result.query.clone(),
        timestamp: result.timestamp,
    })
}

fn incomplete_ref(repo_ref: &RepoRef) -> PersistenceFailure {
    let rendered = serde_json::to_string(repo_ref).unwrap_or_else(|_| format!("{repo_ref:?}"));
    PersistenceFailure {
        repo_url: format!("missing repoUrl. Repo is named {}", repo_ref.repo),
        while_trying_to: BUILD_STEP.to_string(),
        message: format!("Incomplete RepoRef {rendered}"),
    }
}

/// Synchronous store for analysis results.
#[derive(Clone, Debug)]
pub struct AnalysisResultStore {
    db: Database,
}

impl AnalysisResultStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open the configured database and make sure its schema is current.
    pub fn from_config(config: &StoreConfig) -> OrgVizResult<Self> {
        let db = Database::from_config(config)?;
        db.init_schema()?;
        Ok(Self::new(db))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Persist one result. Never returns an error: validation and storage
    /// problems are reported in the result.
    pub fn persist_one(&self, result: &ProjectAnalysisResult) -> PersistResult {
        let outcome = build_snapshot(result).and_then(|snapshot| {
            self.db
                .replace_snapshot(&snapshot, &result.analysis.fingerprints)
                .map(|()| snapshot.id)
                .map_err(|e| PersistenceFailure {
                    repo_url: snapshot.url.clone(),
                    while_trying_to: PERSIST_STEP.to_string(),
                    message: e.to_string(),
                })
        });

        match outcome {
            Ok(id) => PersistResult::success(id),
            Err(failure) => {
                tracing::warn!(
                    repo_url = %failure.repo_url,
                    step = %failure.while_trying_to,
                    message = %failure.message,
                    "failed to persist analysis result"
                );
                PersistResult::failure(failure)
            }
        }
    }

    /// Persist results in order. One item's failure does not undo another's
    /// success.
    pub fn persist<I>(&self, results: I) -> PersistResult
    where
        I: IntoIterator<Item = ProjectAnalysisResult>,
    {
        let total: PersistResult = results
            .into_iter()
            .map(|result| self.persist_one(&result))
            .sum();
        log_summary(&total);
        total
    }

    pub fn load_by_id(&self, id: &str) -> OrgVizResult<Option<StoredSnapshot>> {
        self.db.load_by_id(id)
    }

    /// Snapshot for a repo ref. The ref must carry a sha to match anything.
    pub fn load_by_repo_ref(&self, repo_ref: &RepoRef) -> OrgVizResult<Option<StoredSnapshot>> {
        match repo_ref.sha.as_deref() {
            Some(sha) => self.db.load_by_repo_ref(&repo_ref.owner, &repo_ref.repo, sha),
            None => Ok(None),
        }
    }

    pub fn load_in_workspace(&self, workspace_id: &str) -> OrgVizResult<Vec<StoredSnapshot>> {
        self.db.load_in_workspace(workspace_id)
    }

    pub fn count(&self) -> OrgVizResult<i64> {
        self.db.count_snapshots()
    }

    pub fn fingerprints_in_workspace(
        &self,
        workspace_id: &str,
        distinct: bool,
        fingerprint_type: Option<&str>,
        name: Option<&str>,
    ) -> OrgVizResult<Vec<Fingerprint>> {
        self.db
            .fingerprints_in_workspace(workspace_id, distinct, fingerprint_type, name)
    }

    pub fn distinct_fingerprint_kinds(&self, workspace_id: &str) -> OrgVizResult<Vec<FingerprintKind>> {
        self.db.distinct_fingerprint_kinds(workspace_id)
    }

    pub fn store_ideal(&self, workspace_id: &str, ideal: &Ideal) -> OrgVizResult<()> {
        self.db.store_ideal(workspace_id, ideal)
    }

    pub fn fetch_ideal(
        &self,
        workspace_id: &str,
        fingerprint_type: &str,
        name: &str,
    ) -> OrgVizResult<Option<Ideal>> {
        self.db.fetch_ideal(workspace_id, fingerprint_type, name)
    }
}

pub(crate) fn log_summary(total: &PersistResult) {
    tracing::info!(
        attempted = total.attempted_count,
        succeeded = total.succeeded.len(),
        failed = total.failed.len(),
        "persisted analysis results"
    );
}
