//! Named-parameter bookkeeping for generated SQL.
//!
//! rusqlite rejects bound names that the statement text never mentions, so
//! generated queries register a parameter at the point where they emit its
//! placeholder and bind exactly that set.

use indexmap::IndexMap;
use rusqlite::types::{ToSql, Value};

use crate::models::ALL_WORKSPACES;

#[derive(Debug, Default)]
pub struct NamedParams {
    values: IndexMap<&'static str, Value>,
}

impl NamedParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` under `name` and return the placeholder to splice into
    /// the SQL text. Binding the same name twice keeps the latest value.
    pub fn bind(&mut self, name: &'static str, value: impl Into<Value>) -> &'static str {
        self.values.insert(name, value.into());
        name
    }

    /// Predicate restricting `alias` (a `repo_snapshots` row) to a workspace.
    pub fn workspace_clause(&mut self, alias: &str, workspace_id: &str) -> String {
        if workspace_id == ALL_WORKSPACES {
            "1 = 1".to_string()
        } else {
            let placeholder = self.bind(":workspace", workspace_id.to_string());
            format!("{alias}.workspace_id = {placeholder}")
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parameters in the shape rusqlite accepts for named binding.
    pub fn as_named(&self) -> Vec<(&str, &dyn ToSql)> {
        self.values
            .iter()
            .map(|(name, value)| (*name, value as &dyn ToSql))
            .collect()
    }
}
