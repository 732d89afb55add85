//! Shared typed models used across persistence, analytics, and query layers.

use std::fmt;
use std::iter::Sum;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::OrgVizResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Workspace id that matches every workspace in read queries.
pub const ALL_WORKSPACES: &str = "*";

/// Provider recorded for every persisted snapshot.
pub const DEFAULT_PROVIDER_ID: &str = "github";

/// Feature name stored for fingerprints that arrive without a type.
pub const UNKNOWN_FEATURE: &str = "unknown";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Lowercase hex SHA-256 of `input`.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Composite, content-addressed fingerprint row id.
pub fn fingerprint_id(feature_name: &str, name: &str, sha: &str) -> String {
    format!("{feature_name}_{name}_{sha}")
}

// ---------------------------------------------------------------------------
// 1. Payload
// ---------------------------------------------------------------------------

/// Serialized JSON text carried through the store without interpretation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(String);

impl Payload {
    /// Serialize `value` into a payload.
    pub fn from_value<T: Serialize + ?Sized>(value: &T) -> OrgVizResult<Self> {
        Ok(Self(serde_json::to_string(value)?))
    }

    /// Wrap text that is already serialized.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Deserialize the payload. Only callers that own the payload's format
    /// should do this.
    pub fn parse<T: DeserializeOwned>(&self) -> OrgVizResult<T> {
        Ok(serde_json::from_str(&self.0)?)
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// 2. Fingerprint
// ---------------------------------------------------------------------------

/// A typed, content-addressed fact about a repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    #[serde(rename = "type")]
    pub fingerprint_type: String,
    pub name: String,
    pub sha: String,
    pub data: Payload,
}

impl Fingerprint {
    /// Build a fingerprint whose sha is the SHA-256 of its serialized data.
    pub fn new(fingerprint_type: impl Into<String>, name: impl Into<String>, data: Payload) -> Self {
        let sha = sha256_hex(data.as_str());
        Self {
            fingerprint_type: fingerprint_type.into(),
            name: name.into(),
            sha,
            data,
        }
    }

    /// Build a fingerprint with a sha computed elsewhere.
    pub fn with_sha(
        fingerprint_type: impl Into<String>,
        name: impl Into<String>,
        sha: impl Into<String>,
        data: Payload,
    ) -> Self {
        Self {
            fingerprint_type: fingerprint_type.into(),
            name: name.into(),
            sha: sha.into(),
            data,
        }
    }

    /// The type as stored in `fingerprints.feature_name`.
    pub fn feature_name(&self) -> &str {
        if self.fingerprint_type.is_empty() {
            UNKNOWN_FEATURE
        } else {
            &self.fingerprint_type
        }
    }

    pub fn id(&self) -> String {
        fingerprint_id(self.feature_name(), &self.name, &self.sha)
    }

    pub fn kind(&self) -> FingerprintKind {
        FingerprintKind {
            fingerprint_type: self.feature_name().to_string(),
            name: self.name.clone(),
        }
    }
}

/// A `(type, name)` pair, independent of value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FingerprintKind {
    #[serde(rename = "type")]
    pub fingerprint_type: String,
    pub name: String,
}

// ---------------------------------------------------------------------------
// 3. Analysis input
// ---------------------------------------------------------------------------

/// Reference to a repository at a commit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl RepoRef {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        url: impl Into<String>,
        sha: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            url: Some(url.into()),
            sha: Some(sha.into()),
            branch: None,
        }
    }
}

/// Git state observed while analyzing; its sha wins over the repo ref's.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Output of the (external) analyzer for one repository.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RepoRef>,
    #[serde(default)]
    pub fingerprints: Vec<Fingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_status: Option<GitStatus>,
}

/// An analysis scoped to a workspace, as handed to persistence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectAnalysisResult {
    pub workspace_id: String,
    pub analysis: ProjectAnalysis,
    pub timestamp: DateTime<Utc>,
    /// Provenance of the crawl that produced this analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl ProjectAnalysisResult {
    pub fn new(workspace_id: impl Into<String>, analysis: ProjectAnalysis) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            analysis,
            timestamp: Utc::now(),
            query: None,
        }
    }
}

// ---------------------------------------------------------------------------
// 4. Stored snapshot
// ---------------------------------------------------------------------------

/// One row of `repo_snapshots`, read back with its analysis left opaque.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSnapshot {
    pub id: String,
    pub workspace_id: String,
    pub provider_id: String,
    pub owner: String,
    pub name: String,
    pub url: String,
    pub commit_sha: String,
    pub analysis: Payload,
    pub query: Option<String>,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// 5. Persist results
// ---------------------------------------------------------------------------

/// Why one analysis result could not be persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceFailure {
    pub repo_url: String,
    pub while_trying_to: String,
    pub message: String,
}

/// Outcome of persisting one or more analysis results.
///
/// Results combine associatively: counts add, lists concatenate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistResult {
    pub attempted_count: usize,
    pub succeeded: Vec<String>,
    pub failed: Vec<PersistenceFailure>,
}

impl PersistResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn success(id: impl Into<String>) -> Self {
        Self {
            attempted_count: 1,
            succeeded: vec![id.into()],
            failed: Vec::new(),
        }
    }

    pub fn failure(failure: PersistenceFailure) -> Self {
        Self {
            attempted_count: 1,
            succeeded: Vec::new(),
            failed: vec![failure],
        }
    }

    pub fn combine(mut self, other: PersistResult) -> Self {
        self.attempted_count += other.attempted_count;
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
        self
    }
}

impl Sum for PersistResult {
    fn sum<I: Iterator<Item = PersistResult>>(iter: I) -> Self {
        iter.fold(PersistResult::empty(), PersistResult::combine)
    }
}

impl FromIterator<PersistResult> for PersistResult {
    fn from_iter<I: IntoIterator<Item = PersistResult>>(iter: I) -> Self {
        iter.into_iter().sum()
    }
}

// ---------------------------------------------------------------------------
// 6. Ideals
// ---------------------------------------------------------------------------

/// An aspirational target for a fingerprint kind within a workspace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Ideal {
    /// The target is a specific fingerprint value.
    Concrete { ideal: Fingerprint, reason: String },
    /// The target is the absence of the fingerprint.
    Elimination {
        #[serde(rename = "type")]
        fingerprint_type: String,
        name: String,
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// 7. Analytics
// ---------------------------------------------------------------------------

/// Spread of values for one fingerprint kind across a cohort of repos.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CohortAnalysis {
    pub count: usize,
    pub variants: usize,
    pub entropy: f64,
}

/// One row of `fingerprint_analytics`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FingerprintUsage {
    #[serde(rename = "type")]
    pub fingerprint_type: String,
    pub name: String,
    pub count: i64,
    pub variants: i64,
    pub entropy: Option<f64>,
}
