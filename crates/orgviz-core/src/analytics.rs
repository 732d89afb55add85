//! Fingerprint analytics: how many repos carry each fingerprint kind, how many
//! distinct values it takes, and how evenly those values are spread.

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;

use crate::errors::OrgVizResult;
use crate::models::{CohortAnalysis, Fingerprint, FingerprintKind};
use crate::registry::AspectRegistry;
use crate::store::database::Database;

/// Count, variant count and base-2 Shannon entropy of the sha distribution.
pub fn analyze_cohort(fingerprints: &[Fingerprint]) -> CohortAnalysis {
    let mut by_sha: HashMap<&str, usize> = HashMap::new();
    for fp in fingerprints {
        *by_sha.entry(fp.sha.as_str()).or_insert(0) += 1;
    }

    let count = fingerprints.len();
    let entropy = if count == 0 {
        0.0
    } else {
        let total = count as f64;
        by_sha
            .values()
            .map(|&n| {
                let p = n as f64 / total;
                -p * p.log2()
            })
            .sum::<f64>()
    };

    CohortAnalysis {
        count,
        variants: by_sha.len(),
        entropy: entropy.max(0.0),
    }
}

fn group_by_kind(fingerprints: Vec<Fingerprint>) -> BTreeMap<FingerprintKind, Vec<Fingerprint>> {
    let mut groups: BTreeMap<FingerprintKind, Vec<Fingerprint>> = BTreeMap::new();
    for fp in fingerprints {
        groups.entry(fp.kind()).or_default().push(fp);
    }
    groups
}

/// Analyze each group in parallel and store every row in one transaction.
fn compute_and_store(
    db: &Database,
    registry: &AspectRegistry,
    workspace_id: &str,
    groups: BTreeMap<FingerprintKind, Vec<Fingerprint>>,
) -> OrgVizResult<Vec<(FingerprintKind, CohortAnalysis)>> {
    let rows: Vec<(FingerprintKind, CohortAnalysis, bool)> = groups
        .into_par_iter()
        .map(|(kind, fps)| {
            let cohort = analyze_cohort(&fps);
            let entropy_enabled = registry.entropy_enabled(&kind.fingerprint_type);
            (kind, cohort, entropy_enabled)
        })
        .collect();

    db.upsert_fingerprint_analytics(workspace_id, &rows)?;
    tracing::info!(
        workspace = %workspace_id,
        kinds = rows.len(),
        "stored fingerprint analytics"
    );
    Ok(rows.into_iter().map(|(kind, cohort, _)| (kind, cohort)).collect())
}

/// Recompute analytics for one `(type, name)` kind in a workspace.
pub fn compute_analytics_for_kind(
    db: &Database,
    registry: &AspectRegistry,
    workspace_id: &str,
    fingerprint_type: &str,
    name: &str,
) -> OrgVizResult<CohortAnalysis> {
    let fingerprints =
        db.fingerprints_in_workspace(workspace_id, false, Some(fingerprint_type), Some(name))?;
    let kind = FingerprintKind {
        fingerprint_type: fingerprint_type.to_string(),
        name: name.to_string(),
    };
    let mut groups = BTreeMap::new();
    groups.insert(kind, fingerprints);
    let mut rows = compute_and_store(db, registry, workspace_id, groups)?;
    Ok(rows.pop().map(|(_, cohort)| cohort).unwrap_or(CohortAnalysis {
        count: 0,
        variants: 0,
        entropy: 0.0,
    }))
}

/// Recompute analytics for every fingerprint kind present in a workspace.
pub fn compute_analytics(
    db: &Database,
    registry: &AspectRegistry,
    workspace_id: &str,
) -> OrgVizResult<Vec<(FingerprintKind, CohortAnalysis)>> {
    let fingerprints = db.fingerprints_in_workspace(workspace_id, false, None, None)?;
    compute_and_store(db, registry, workspace_id, group_by_kind(fingerprints))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::models::{Payload, StoredSnapshot, DEFAULT_PROVIDER_ID};
    use crate::registry::Aspect;

    fn fp(name: &str, sha: &str) -> Fingerprint {
        Fingerprint::with_sha("npm", name, sha, Payload::from_raw(format!("\"{sha}\"")))
    }

    fn test_db() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("orgviz.db")).unwrap();
        db.init_schema().unwrap();
        (dir, db)
    }

    fn persist(db: &Database, repo: &str, fps: &[Fingerprint]) {
        let snapshot = StoredSnapshot {
            id: format!("org/{repo}_sha"),
            workspace_id: "ws".to_string(),
            provider_id: DEFAULT_PROVIDER_ID.to_string(),
            owner: "org".to_string(),
            name: repo.to_string(),
            url: format!("https://github.com/org/{repo}"),
            commit_sha: "sha".to_string(),
            analysis: Payload::from_raw("{}"),
            query: None,
            timestamp: Utc::now(),
        };
        db.replace_snapshot(&snapshot, fps).unwrap();
    }

    #[test]
    fn test_single_value_has_zero_entropy() {
        let cohort = analyze_cohort(&[fp("lodash", "a"), fp("lodash", "a")]);
        assert_eq!(cohort.count, 2);
        assert_eq!(cohort.variants, 1);
        assert_eq!(cohort.entropy, 0.0);
    }

    #[test]
    fn test_even_split_is_one_bit_per_doubling() {
        let two = analyze_cohort(&[fp("x", "a"), fp("x", "b")]);
        assert!((two.entropy - 1.0).abs() < 1e-9);
        let four = analyze_cohort(&[fp("x", "a"), fp("x", "b"), fp("x", "c"), fp("x", "d")]);
        assert!((four.entropy - 2.0).abs() < 1e-9);
        assert_eq!(four.variants, 4);
    }

    #[test]
    fn test_empty_cohort() {
        let cohort = analyze_cohort(&[]);
        assert_eq!(cohort.count, 0);
        assert_eq!(cohort.variants, 0);
        assert_eq!(cohort.entropy, 0.0);
    }

    #[test]
    fn test_compute_analytics_stores_every_kind() {
        let (_dir, db) = test_db();
        persist(&db, "a", &[fp("lodash", "4"), fp("react", "18")]);
        persist(&db, "b", &[fp("lodash", "3")]);
        persist(&db, "c", &[fp("lodash", "4")]);

        let rows = compute_analytics(&db, &AspectRegistry::empty(), "ws").unwrap();
        assert_eq!(rows.len(), 2);

        let usage = db.fingerprint_usage_for_type("ws", Some("npm")).unwrap();
        assert_eq!(usage.len(), 2);
        // Highest entropy first.
        assert_eq!(usage[0].name, "lodash");
        assert_eq!(usage[0].count, 3);
        assert_eq!(usage[0].variants, 2);
        assert!(usage[0].entropy.unwrap() > 0.9);
        assert_eq!(usage[1].name, "react");
        assert_eq!(usage[1].entropy, Some(0.0));
    }

    #[test]
    fn test_recompute_overwrites_previous_row() {
        let (_dir, db) = test_db();
        let registry = AspectRegistry::empty();
        persist(&db, "a", &[fp("lodash", "4")]);
        let first = compute_analytics_for_kind(&db, &registry, "ws", "npm", "lodash").unwrap();
        assert_eq!(first.count, 1);

        persist(&db, "b", &[fp("lodash", "3")]);
        let second = compute_analytics_for_kind(&db, &registry, "ws", "npm", "lodash").unwrap();
        assert_eq!(second.count, 2);

        let usage = db.fingerprint_usage_for_type("ws", None).unwrap();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].count, 2);
    }

    struct NoEntropy;

    impl Aspect for NoEntropy {
        fn name(&self) -> &str {
            "npm"
        }

        fn entropy_enabled(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_disabled_entropy_is_stored_as_null() {
        let (_dir, db) = test_db();
        persist(&db, "a", &[fp("lodash", "4")]);
        persist(&db, "b", &[fp("lodash", "3")]);
        let registry = AspectRegistry::builder()
            .with_aspect(Arc::new(NoEntropy))
            .build()
            .unwrap();

        compute_analytics(&db, &registry, "ws").unwrap();
        let usage = db.fingerprint_usage_for_type("ws", Some("npm")).unwrap();
        assert_eq!(usage[0].entropy, None);
        assert_eq!(usage[0].variants, 2);
    }
}
