//! Fingerprint-to-repo tree queries.
//!
//! A [`TreeQuery`] is compiled into a single SQLite statement that builds the
//! whole nested tree with JSON1 aggregates: fingerprint names, then values
//! (one node per sha), then the repos carrying each value. The result is
//! parsed, given display names through the aspect registry, and checked
//! against its declared levels before it is returned.

use crate::config::{StoreConfig, DEFAULT_OTHER_LABEL};
use crate::errors::{OrgVizError, OrgVizResult};
use crate::query::tree::{visit_mut, Level, PlantedTree, SunburstNode};
use crate::registry::AspectRegistry;
use crate::store::database::Database;
use crate::store::sql::NamedParams;

/// Which fingerprint names a query drills into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RootName {
    Named(String),
    /// Every name of the aspect type; adds a level above the names.
    All,
}

impl RootName {
    /// `"*"` is the wildcard; anything else names a fingerprint.
    pub fn parse(raw: &str) -> Self {
        if raw == "*" {
            RootName::All
        } else {
            RootName::Named(raw.to_string())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeQuery {
    pub workspace_id: String,
    pub aspect_type: String,
    pub root: RootName,
    /// `false` selects fingerprints of the type whose name does NOT match.
    pub by_name: bool,
    /// Add a bucket of workspace repos with no matching fingerprint.
    pub include_complement: bool,
    pub other_label: String,
}

impl TreeQuery {
    pub fn new(workspace_id: impl Into<String>, aspect_type: impl Into<String>, root: RootName) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            aspect_type: aspect_type.into(),
            root,
            by_name: true,
            include_complement: false,
            other_label: DEFAULT_OTHER_LABEL.to_string(),
        }
    }

    /// A query over the configured default workspace, using the configured
    /// complement label if a complement is later requested.
    pub fn from_config(config: &StoreConfig, aspect_type: impl Into<String>, root: RootName) -> Self {
        let mut query = Self::new(config.default_workspace.clone(), aspect_type, root);
        query.other_label = config.other_label.clone();
        query
    }

    pub fn by_name(mut self, by_name: bool) -> Self {
        self.by_name = by_name;
        self
    }

    pub fn with_complement(mut self, other_label: impl Into<String>) -> Self {
        self.include_complement = true;
        self.other_label = other_label.into();
        self
    }

    /// Include the complement bucket under the current label.
    pub fn include_complement(mut self) -> Self {
        self.include_complement = true;
        self
    }

    /// Declared meaning of each depth of the full tree.
    pub fn levels(&self) -> Vec<Level> {
        let mut levels = Vec::with_capacity(4);
        if self.root == RootName::All {
            levels.push(Level::new("aspect"));
        }
        levels.push(Level::new("fingerprint name"));
        levels.push(Level::new("fingerprint value"));
        levels.push(Level::new("repository"));
        levels
    }

    /// Generate the statement text and the parameters it references.
    pub fn to_sql(&self) -> OrgVizResult<(String, NamedParams)> {
        if self.aspect_type.is_empty() {
            return Err(OrgVizError::Validation("tree query needs an aspect type".to_string()));
        }
        let mut params = NamedParams::new();
        let ty = params.bind(":type", self.aspect_type.clone());

        let sql = match &self.root {
            RootName::Named(name) => {
                let name_param = params.bind(":name", name.clone());
                let op = if self.by_name { "=" } else { "<>" };
                let name_pred = format!("f.name {op} {name_param}");
                let children = self.value_children(&mut params, ty, &name_pred);
                format!("SELECT json_object('name', {name_param}, 'children', {children});")
            }
            RootName::All => {
                if !self.by_name {
                    return Err(OrgVizError::Validation(
                        "cannot exclude the wildcard fingerprint name".to_string(),
                    ));
                }
                let ws = params.workspace_clause("rs", &self.workspace_id);
                let children = self.value_children(&mut params, ty, "f.name = n.name");
                format!(
                    "SELECT json_object('name', {ty}, 'children', json(( \
                        SELECT json_group_array(json(name_node)) FROM ( \
                            SELECT json_object('name', n.name, 'children', {children}) AS name_node \
                            FROM ( \
                                SELECT DISTINCT f.name AS name \
                                FROM fingerprints f \
                                JOIN repo_fingerprints rf ON rf.fingerprint_id = f.id \
                                JOIN repo_snapshots rs ON rs.id = rf.repo_snapshot_id \
                                WHERE f.feature_name = {ty} AND {ws} \
                            ) n \
                            ORDER BY n.name \
                        ) \
                    )));"
                )
            }
        };
        Ok((sql, params))
    }

    /// JSON array expression of value nodes for fingerprints matching
    /// `name_pred`, plus the complement bucket when requested.
    fn value_children(&self, params: &mut NamedParams, ty: &str, name_pred: &str) -> String {
        let ws = params.workspace_clause("rs", &self.workspace_id);
        let values = format!(
            "SELECT json_object( \
                 'name', f.sha, \
                 'sha', f.sha, \
                 'type', f.feature_name, \
                 'fingerprintName', f.name, \
                 'data', f.data, \
                 'children', json(( \
                     SELECT json_group_array(json(leaf)) FROM ( \
                         SELECT {leaf} AS leaf \
                         FROM repo_fingerprints rf \
                         JOIN repo_snapshots rs ON rs.id = rf.repo_snapshot_id \
                         WHERE rf.fingerprint_id = f.id AND {ws} \
                         ORDER BY rs.owner, rs.name \
                     ) \
                 )) \
             ) AS node \
             FROM fingerprints f \
             WHERE f.feature_name = {ty} AND {name_pred} \
               AND EXISTS ( \
                   SELECT 1 FROM repo_fingerprints rf \
                   JOIN repo_snapshots rs ON rs.id = rf.repo_snapshot_id \
                   WHERE rf.fingerprint_id = f.id AND {ws} \
               ) \
             ORDER BY f.sha",
            leaf = REPO_LEAF,
        );

        let nodes = if self.include_complement {
            let label = params.bind(":other_label", self.other_label.clone());
            format!(
                "SELECT node FROM ({values}) \
                 UNION ALL \
                 SELECT node FROM ({bucket}) WHERE json_array_length(node, '$.children') > 0",
                bucket = complement_bucket(label, ty, name_pred, &ws),
            )
        } else {
            format!("SELECT node FROM ({values})")
        };

        format!("json((SELECT json_group_array(json(node)) FROM ({nodes})))")
    }
}

/// JSON object for one repository leaf, over a `repo_snapshots rs` row.
const REPO_LEAF: &str = "json_object('name', rs.name, 'owner', rs.owner, 'url', rs.url, \
                         'commitSha', rs.commit_sha, 'size', 1)";

/// A single node holding every workspace repo that is linked to no
/// fingerprint matching `name_pred`.
fn complement_bucket(label: &str, ty: &str, name_pred: &str, ws: &str) -> String {
    format!(
        "SELECT json_object('name', {label}, 'children', json(( \
             SELECT json_group_array(json(leaf)) FROM ( \
                 SELECT {REPO_LEAF} AS leaf \
                 FROM repo_snapshots rs \
                 WHERE {ws} AND rs.id NOT IN ( \
                     SELECT rf.repo_snapshot_id FROM repo_fingerprints rf \
                     JOIN fingerprints f ON f.id = rf.fingerprint_id \
                     WHERE f.feature_name = {ty} AND {name_pred} \
                 ) \
                 ORDER BY rs.owner, rs.name \
             ) \
         ))) AS node"
    )
}

/// Runs tree queries against a store, resolving display names through the
/// registry it was built with.
pub struct TreeQueryEngine<'a> {
    db: &'a Database,
    registry: &'a AspectRegistry,
}

impl<'a> TreeQueryEngine<'a> {
    pub fn new(db: &'a Database, registry: &'a AspectRegistry) -> Self {
        Self { db, registry }
    }

    /// Run `query` and return its tree. Storage failures and depth invariant
    /// violations are errors.
    pub fn repo_tree(&self, query: &TreeQuery) -> OrgVizResult<PlantedTree> {
        let (sql, params) = query.to_sql()?;
        tracing::debug!(sql = %sql, "running repo tree query");

        let raw: String = {
            let conn = self.db.connect()?;
            conn.query_row(&sql, params.as_named().as_slice(), |row| row.get(0))
                .map_err(|e| {
                    tracing::warn!(
                        workspace = %query.workspace_id,
                        aspect = %query.aspect_type,
                        error = %e,
                        "repo tree query failed"
                    );
                    OrgVizError::from(e)
                })?
        };

        let mut tree: SunburstNode = serde_json::from_str(&raw)?;
        self.resolve_display_names(query, &mut tree);

        let mut levels = query.levels();
        if tree.children().is_empty() {
            // Nothing observed: a bare root is the whole tree.
            levels.truncate(1);
        }

        let planted = PlantedTree { tree, levels };
        planted.validate()?;
        Ok(planted)
    }

    /// Value nodes go through the owning aspect's fingerprint display, name
    /// nodes through its name display. A wildcard root shows the aspect's
    /// display name. Unowned types keep their stored names.
    fn resolve_display_names(&self, query: &TreeQuery, tree: &mut SunburstNode) {
        let aspect = self.registry.aspect_of(&query.aspect_type);
        let name_depth = if query.root == RootName::All { 1 } else { 0 };
        visit_mut(tree, &mut |node, depth| {
            if let Some(fp) = node.as_fingerprint() {
                node.name = self.registry.displayable_fingerprint(&fp);
            } else if let Some(aspect) = aspect {
                if depth == name_depth {
                    node.name = aspect.to_displayable_fingerprint_name(&node.name);
                } else if depth == 0 {
                    node.name = aspect.display_name().to_string();
                }
            }
            // Nothing below the value level needs renaming.
            depth <= name_depth
        });
    }
}
