//! Store configuration, read from `ORGVIZ_*` environment variables.

use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "~/.orgviz/orgviz.db";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_WORKSPACE: &str = "local";
pub const DEFAULT_OTHER_LABEL: &str = "None";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    /// How long a connection waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    pub default_workspace: String,
    /// Label of the bucket holding repos without a matching fingerprint.
    pub other_label: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: expand_tilde(DEFAULT_DB_PATH),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            default_workspace: DEFAULT_WORKSPACE.to_string(),
            other_label: DEFAULT_OTHER_LABEL.to_string(),
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Blank and unparseable
    /// values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_blank = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            db_path: non_blank("ORGVIZ_DB_PATH")
                .map(|p| expand_tilde(&p))
                .unwrap_or(defaults.db_path),
            busy_timeout_ms: non_blank("ORGVIZ_BUSY_TIMEOUT_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(defaults.busy_timeout_ms),
            default_workspace: non_blank("ORGVIZ_WORKSPACE").unwrap_or(defaults.default_workspace),
            other_label: non_blank("ORGVIZ_OTHER_LABEL").unwrap_or(defaults.other_label),
        }
    }

    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut expanded = PathBuf::from(home);
            if path.len() > 2 {
                expanded.push(&path[2..]);
            }
            return expanded;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_from_lookup_uses_defaults_when_unset() {
        let config = StoreConfig::from_lookup(|_| None);
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_from_lookup_reads_overrides() {
        let env: HashMap<&str, &str> = [
            ("ORGVIZ_DB_PATH", "/tmp/orgviz/test.db"),
            ("ORGVIZ_BUSY_TIMEOUT_MS", "250"),
            ("ORGVIZ_WORKSPACE", "TJVC"),
            ("ORGVIZ_OTHER_LABEL", " Other "),
        ]
        .into_iter()
        .collect();
        let config = StoreConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.db_path, PathBuf::from("/tmp/orgviz/test.db"));
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(config.default_workspace, "TJVC");
        assert_eq!(config.other_label, "Other");
    }

    #[test]
    fn test_bad_timeout_falls_back() {
        let config = StoreConfig::from_lookup(|k| {
            (k == "ORGVIZ_BUSY_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert_eq!(config.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
    }

    #[test]
    fn test_expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/var/db"), PathBuf::from("/var/db"));
    }
}
