//! Orgviz core library: fingerprint persistence and tree queries for
//! organization-wide visualization.
//!
//! Analysis results are stored as repo snapshots linked to content-addressed
//! fingerprints in SQLite. Tree queries read them back as sunburst trees
//! (fingerprint name, then value, then the repos carrying it), and the
//! analytics job records how varied each fingerprint kind is per workspace.

pub mod analytics;
pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod persist;
pub mod query;
pub mod registry;
pub mod store;

pub use config::StoreConfig;
pub use errors::{OrgVizError, OrgVizResult};
pub use models::{
    Fingerprint, FingerprintKind, Ideal, Payload, PersistResult, PersistenceFailure, ProjectAnalysis,
    ProjectAnalysisResult, RepoRef,
};
pub use persist::async_store::AsyncResultStore;
pub use persist::AnalysisResultStore;
pub use query::repo_tree::{RootName, TreeQuery, TreeQueryEngine};
pub use query::tree::{Level, PlantedTree, SunburstNode};
pub use registry::{Aspect, AspectRegistry};
pub use store::database::Database;
