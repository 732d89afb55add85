//! Aspect registry: the handlers that own each fingerprint type.
//!
//! Built once at startup and handed to the query engine and analytics job.
//! Lookup is a direct map from type name to aspect; aspects registered with a
//! legacy selector pattern are scanned afterwards in registration order, and
//! the first match wins.

use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;

use crate::errors::{OrgVizError, OrgVizResult};
use crate::models::Fingerprint;

/// Presentation and statistics hooks for one fingerprint type.
pub trait Aspect: Send + Sync {
    /// Type name of the fingerprints this aspect produces.
    fn name(&self) -> &str;

    fn display_name(&self) -> &str {
        self.name()
    }

    fn to_displayable_fingerprint_name(&self, fingerprint_name: &str) -> String {
        fingerprint_name.to_string()
    }

    fn to_displayable_fingerprint(&self, fp: &Fingerprint) -> String {
        fp.data.as_str().to_string()
    }

    /// Whether entropy is meaningful for this aspect's values.
    fn entropy_enabled(&self) -> bool {
        true
    }
}

struct LegacySelector {
    pattern: Regex,
    aspect: Arc<dyn Aspect>,
}

#[derive(Default)]
pub struct AspectRegistry {
    by_type: IndexMap<String, Arc<dyn Aspect>>,
    legacy: Vec<LegacySelector>,
}

impl AspectRegistry {
    pub fn builder() -> AspectRegistryBuilder {
        AspectRegistryBuilder::default()
    }

    /// A registry with no aspects; every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The aspect owning `fingerprint_type`, if any.
    pub fn aspect_of(&self, fingerprint_type: &str) -> Option<&dyn Aspect> {
        if fingerprint_type.is_empty() {
            return None;
        }
        if let Some(aspect) = self.by_type.get(fingerprint_type) {
            return Some(aspect.as_ref());
        }
        self.legacy
            .iter()
            .find(|selector| selector.pattern.is_match(fingerprint_type))
            .map(|selector| selector.aspect.as_ref())
    }

    pub fn aspects(&self) -> impl Iterator<Item = &Arc<dyn Aspect>> {
        self.by_type
            .values()
            .chain(self.legacy.iter().map(|s| &s.aspect))
    }

    pub fn len(&self) -> usize {
        self.by_type.len() + self.legacy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Display text for a fingerprint value, falling back to its raw data.
    pub fn displayable_fingerprint(&self, fp: &Fingerprint) -> String {
        match self.aspect_of(&fp.fingerprint_type) {
            Some(aspect) => aspect.to_displayable_fingerprint(fp),
            None => fp.data.as_str().to_string(),
        }
    }

    /// Whether analytics should compute entropy for this type. Unowned types
    /// get entropy.
    pub fn entropy_enabled(&self, fingerprint_type: &str) -> bool {
        self.aspect_of(fingerprint_type)
            .map(|a| a.entropy_enabled())
            .unwrap_or(true)
    }
}

#[derive(Default)]
pub struct AspectRegistryBuilder {
    aspects: Vec<Arc<dyn Aspect>>,
    legacy: Vec<(String, Arc<dyn Aspect>)>,
}

impl AspectRegistryBuilder {
    pub fn with_aspect(mut self, aspect: Arc<dyn Aspect>) -> Self {
        self.aspects.push(aspect);
        self
    }

    /// Register an aspect that claims any fingerprint type matching `pattern`.
    pub fn with_legacy_selector(mut self, pattern: impl Into<String>, aspect: Arc<dyn Aspect>) -> Self {
        self.legacy.push((pattern.into(), aspect));
        self
    }

    /// Aspect names must be unique across both kinds of registration.
    pub fn build(self) -> OrgVizResult<AspectRegistry> {
        let mut registry = AspectRegistry::default();
        for aspect in self.aspects {
            let name = aspect.name().to_string();
            if name.is_empty() {
                return Err(OrgVizError::Registry("aspect with empty name".to_string()));
            }
            if registry.by_type.insert(name.clone(), aspect).is_some() {
                return Err(OrgVizError::Registry(format!("duplicate aspect '{name}'")));
            }
        }
        for (pattern, aspect) in self.legacy {
            let name = aspect.name();
            if registry.by_type.contains_key(name)
                || registry.legacy.iter().any(|s| s.aspect.name() == name)
            {
                return Err(OrgVizError::Registry(format!("duplicate aspect '{name}'")));
            }
            registry.legacy.push(LegacySelector {
                pattern: Regex::new(&pattern)?,
                aspect,
            });
        }
        tracing::debug!(aspects = registry.len(), "built aspect registry");
        Ok(registry)
    }
}
