//! Project context
//!
//! The scanner does not load workspaces itself; it consumes a small project
//! abstraction: an id, the production root that job output lands under, and
//! a dictionary of filepath variables substituted into path patterns.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::ProjectSettings;
use crate::error::{ProductError, Result};
use crate::pathvar::{SystemEntry, SystemHandler, SystemVarRegistry};

/// Identity and roots of the project being scanned
#[derive(Debug, Clone)]
pub struct Project {
    /// Recorded in (and checked against) the scan cache
    pub id: String,
    /// Root directory of job output
    pub production_root: PathBuf,
    /// Filepath variables available as `${name}` in path patterns
    pub vars: HashMap<String, String>,
}

impl Project {
    pub fn new(id: impl Into<String>, production_root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            production_root: production_root.into(),
            vars: HashMap::new(),
        }
    }

    pub fn from_settings(settings: &ProjectSettings) -> Self {
        Self {
            id: settings.id.clone(),
            production_root: settings.production_root.clone(),
            vars: settings.vars.clone(),
        }
    }

    /// Substitute `${name}` references in a path pattern.
    ///
    /// `${production-root}` resolves to the project's production root; other
    /// names come from the variable dictionary. Unknown names are errors.
    pub fn substitute(&self, pattern: &str) -> Result<String> {
        let mut out = String::with_capacity(pattern.len());
        let mut rest = pattern;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| {
                ProductError::InvalidConfig(format!("unterminated variable reference in '{}'", pattern))
            })?;
            let name = &after[..end];
            match name {
                "production-root" => out.push_str(&self.production_root.to_string_lossy()),
                _ => match self.vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        return Err(ProductError::InvalidConfig(format!(
                            "unknown filepath variable '{}' in '{}'",
                            name, pattern
                        )))
                    }
                },
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Registry with the stock `production` enumerator registered.
    ///
    /// `!production` opens a pattern at the project's production root;
    /// callers add their own handlers for domain enumerators.
    pub fn default_registry(&self) -> SystemVarRegistry {
        let mut registry = SystemVarRegistry::new();
        registry.register(
            "production",
            std::sync::Arc::new(ProductionRootHandler {
                root: self.production_root.clone(),
            }),
        );
        registry
    }
}

/// Emits the production root as the single entry of the opening segment
struct ProductionRootHandler {
    root: PathBuf,
}

impl SystemHandler for ProductionRootHandler {
    fn enumerate(&self, _scan_root: Option<&Path>) -> Result<Vec<SystemEntry>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        Ok(vec![SystemEntry::for_dir(self.root.clone(), "production")])
    }
}
