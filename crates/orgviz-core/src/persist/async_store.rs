//! Async front for [`AnalysisResultStore`].
//!
//! SQLite calls are blocking, so each one runs on tokio's blocking pool.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::task::JoinError;

use crate::errors::OrgVizResult;
use crate::models::{
    Fingerprint, PersistResult, PersistenceFailure, ProjectAnalysisResult, RepoRef, StoredSnapshot,
};
use crate::persist::{log_summary, AnalysisResultStore};
use crate::query::repo_tree::{TreeQuery, TreeQueryEngine};
use crate::query::tree::PlantedTree;
use crate::registry::AspectRegistry;

#[derive(Clone)]
pub struct AsyncResultStore {
    inner: Arc<AnalysisResultStore>,
    registry: Arc<AspectRegistry>,
}

impl AsyncResultStore {
    pub fn new(store: AnalysisResultStore, registry: Arc<AspectRegistry>) -> Self {
        Self {
            inner: Arc::new(store),
            registry,
        }
    }

    pub fn store(&self) -> &AnalysisResultStore {
        &self.inner
    }

    async fn persist_one(&self, result: ProjectAnalysisResult) -> PersistResult {
        let repo_url = result
            .analysis
            .id
            .as_ref()
            .and_then(|r| r.url.clone())
            .unwrap_or_else(|| "missing repoRef".to_string());
        let store = Arc::clone(&self.inner);
        settle(repo_url, tokio::task::spawn_blocking(move || store.persist_one(&result)).await)
    }

    /// Consume `results` once, in order, persisting each as it arrives.
    pub async fn persist_stream<S>(&self, results: S) -> PersistResult
    where
        S: Stream<Item = ProjectAnalysisResult>,
    {
        futures::pin_mut!(results);
        let mut total = PersistResult::empty();
        while let Some(result) = results.next().await {
            total = total.combine(self.persist_one(result).await);
        }
        log_summary(&total);
        total
    }

    pub async fn persist_all(&self, results: Vec<ProjectAnalysisResult>) -> PersistResult {
        self.persist_stream(futures::stream::iter(results)).await
    }

    pub async fn load_by_id(&self, id: &str) -> OrgVizResult<Option<StoredSnapshot>> {
        let store = Arc::clone(&self.inner);
        let id = id.to_string();
        tokio::task::spawn_blocking(move || store.load_by_id(&id)).await?
    }

    pub async fn load_by_repo_ref(&self, repo_ref: RepoRef) -> OrgVizResult<Option<StoredSnapshot>> {
        let store = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || store.load_by_repo_ref(&repo_ref)).await?
    }

    /// `"*"` reads every workspace.
    pub async fn load_in_workspace(&self, workspace_id: &str) -> OrgVizResult<Vec<StoredSnapshot>> {
        let store = Arc::clone(&self.inner);
        let workspace_id = workspace_id.to_string();
        tokio::task::spawn_blocking(move || store.load_in_workspace(&workspace_id)).await?
    }

    pub async fn count(&self) -> OrgVizResult<i64> {
        let store = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || store.count()).await?
    }

    pub async fn fingerprints_in_workspace(
        &self,
        workspace_id: &str,
        distinct: bool,
        fingerprint_type: Option<String>,
        name: Option<String>,
    ) -> OrgVizResult<Vec<Fingerprint>> {
        let store = Arc::clone(&self.inner);
        let workspace_id = workspace_id.to_string();
        tokio::task::spawn_blocking(move || {
            store.fingerprints_in_workspace(
                &workspace_id,
                distinct,
                fingerprint_type.as_deref(),
                name.as_deref(),
            )
        })
        .await?
    }

    pub async fn repo_tree(&self, query: TreeQuery) -> OrgVizResult<PlantedTree> {
        let store = Arc::clone(&self.inner);
        let registry = Arc::clone(&self.registry);
        tokio::task::spawn_blocking(move || {
            TreeQueryEngine::new(store.database(), &registry).repo_tree(&query)
        })
        .await?
    }
}

/// A worker that died before reporting becomes a failure for its repo.
fn settle(repo_url: String, joined: Result<PersistResult, JoinError>) -> PersistResult {
    match joined {
        Ok(persisted) => persisted,
        Err(e) => {
            tracing::warn!(repo_url = %repo_url, error = %e, "persist worker join error");
            PersistResult::failure(PersistenceFailure {
                repo_url,
                while_trying_to: "persist in DB".to_string(),
                message: format!("persist worker join error: {e}"),
            })
        }
    }
}
