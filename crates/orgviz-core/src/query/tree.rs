//! Sunburst tree shape returned by tree queries, and its depth invariant.

use serde::{Deserialize, Serialize};

use crate::errors::{OrgVizError, OrgVizResult};
use crate::models::{Fingerprint, Payload};

/// One node of a sunburst tree. Intermediate nodes carry `children`; repo
/// leaves carry `size` and the repo's identity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SunburstNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<SunburstNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub fingerprint_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl SunburstNode {
    pub fn branch(name: impl Into<String>, children: Vec<SunburstNode>) -> Self {
        Self {
            name: name.into(),
            children: Some(children),
            ..Self::default()
        }
    }

    pub fn leaf(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size: Some(size),
            ..Self::default()
        }
    }

    pub fn children(&self) -> &[SunburstNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// The fingerprint value this node stands for, when it is a value node.
    pub fn as_fingerprint(&self) -> Option<Fingerprint> {
        let sha = self.sha.as_ref()?;
        Some(Fingerprint::with_sha(
            self.fingerprint_type.clone().unwrap_or_default(),
            self.fingerprint_name.clone().unwrap_or_default(),
            sha.clone(),
            Payload::from_raw(self.data.clone().unwrap_or_default()),
        ))
    }
}

/// What the nodes at one depth of a tree mean.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub meaning: String,
}

impl Level {
    pub fn new(meaning: impl Into<String>) -> Self {
        Self { meaning: meaning.into() }
    }
}

/// A tree together with one declared level per depth.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlantedTree {
    pub tree: SunburstNode,
    pub levels: Vec<Level>,
}

impl PlantedTree {
    /// Check that the tree is exactly as deep as its declared levels.
    pub fn validate(&self) -> OrgVizResult<()> {
        let depth = max_depth(&self.tree);
        if depth + 1 == self.levels.len() {
            return Ok(());
        }
        let dump = serde_json::to_string(self).unwrap_or_else(|e| format!("<unserializable: {e}>"));
        tracing::error!(
            declared_levels = self.levels.len(),
            max_depth = depth,
            tree = %dump,
            "tree depth does not match declared levels"
        );
        Err(OrgVizError::InvalidTree {
            expected: self.levels.len(),
            actual: depth + 1,
        })
    }
}

/// Depth of the deepest node, counting the root as depth 0.
pub fn max_depth(node: &SunburstNode) -> usize {
    node.children()
        .iter()
        .map(|child| 1 + max_depth(child))
        .max()
        .unwrap_or(0)
}

/// Visit every node depth-first, parents before children. The callback's
/// return value decides whether to descend into that node's children.
pub fn visit_mut<F>(node: &mut SunburstNode, f: &mut F)
where
    F: FnMut(&mut SunburstNode, usize) -> bool,
{
    fn walk<F>(node: &mut SunburstNode, depth: usize, f: &mut F)
    where
        F: FnMut(&mut SunburstNode, usize) -> bool,
    {
        if !f(node, depth) {
            return;
        }
        if let Some(children) = node.children.as_mut() {
            for child in children {
                walk(child, depth + 1, f);
            }
        }
    }
    walk(node, 0, f);
}

/// All nodes under `node` that have no children.
pub fn leaves_under(node: &SunburstNode) -> Vec<&SunburstNode> {
    let children = node.children();
    if children.is_empty() {
        return vec![node];
    }
    children.iter().flat_map(leaves_under).collect()
}
