//! Declarative path structures
//!
//! A path structure compiles a `/`-delimited pattern string into typed
//! segments and scans a file-system subtree against them. Prefix tags select
//! the segment kind: a bare token is a fixed folder name, `?name` a user
//! variable, `=name` a single-capture regex, `!name` a registered system
//! enumerator. The same scan loop thereby expresses rigid folder conventions
//! and caller-injected discovery without knowing anything about either.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::category::CategoryCollection;
use crate::config::VarConfig;
use crate::error::{ProductError, Result};
use crate::node::{Node, NodeId, NodeKind, NodePayload, Tree};
use crate::pathvar::{LabelFormat, PathVar, PathVarKind, SystemVarRegistry};

/// An ordered sequence of typed path segments
#[derive(Debug, Clone)]
pub struct PathStructure {
    pattern: String,
    vars: Vec<PathVar>,
}

impl PathStructure {
    /// Compile a pattern string.
    ///
    /// The terminal segment produces `terminal` nodes; all earlier segments
    /// produce path nodes. Fails eagerly on an unregistered system variable,
    /// a `=name` segment without a parse regex, an invalid regex, or a
    /// variable referencing an unknown category.
    pub fn parse(
        pattern: &str,
        terminal: NodeKind,
        categories: &CategoryCollection,
        var_configs: &BTreeMap<String, VarConfig>,
        registry: &SystemVarRegistry,
    ) -> Result<Self> {
        let malformed = |reason: &str| ProductError::MalformedPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if pattern.is_empty() {
            return Err(malformed("empty pattern"));
        }

        let tokens: Vec<&str> = pattern.split('/').collect();
        let mut vars = Vec::with_capacity(tokens.len());

        for (index, token) in tokens.iter().enumerate() {
            if token.is_empty() {
                return Err(malformed("empty segment"));
            }
            let is_last = index + 1 == tokens.len();
            let node_kind = if is_last { terminal } else { NodeKind::Path };

            let (kind, id) = match token.chars().next() {
                Some('?') => (PathVarKind::User, &token[1..]),
                Some('=') => (PathVarKind::Regex, &token[1..]),
                Some('!') => (PathVarKind::System, &token[1..]),
                _ => (PathVarKind::Fixed, *token),
            };
            if id.is_empty() {
                return Err(malformed("segment without a name"));
            }

            let mut var = PathVar::new(id, kind, node_kind);

            if kind != PathVarKind::Fixed {
                if let Some(config) = var_configs.get(id) {
                    if let Some(name) = &config.name {
                        var.name = name.clone();
                    }
                    if let Some(pattern) = &config.regex_parse_value {
                        var.parse_regex = Some(compile_full_match(id, pattern)?);
                    }
                    var.replace_value = config.regex_replace_value.clone();
                    var.categories = config.categories.clone();
                }
            }

            match kind {
                PathVarKind::Regex if var.parse_regex.is_none() => {
                    return Err(ProductError::MissingRegex(id.to_string()));
                }
                PathVarKind::System => {
                    var.handler = Some(registry.resolve(id)?);
                }
                _ => {}
            }

            for category in &var.categories {
                if !categories.contains(category) {
                    return Err(ProductError::UnknownCategory {
                        var: id.to_string(),
                        category: category.clone(),
                    });
                }
            }

            vars.push(var);
        }

        Ok(Self {
            pattern: pattern.to_string(),
            vars,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn vars(&self) -> &[PathVar] {
        &self.vars
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Level of the terminal segment
    pub fn max_level(&self) -> i32 {
        self.vars.len() as i32 - 1
    }

    /// Ids of all segments, in order
    pub fn var_ids(&self) -> Vec<&str> {
        self.vars.iter().map(|v| v.id.as_str()).collect()
    }

    /// Segments that enumerate values, with their level
    pub fn enumerated_vars(&self) -> impl Iterator<Item = (usize, &PathVar)> {
        self.vars
            .iter()
            .enumerate()
            .filter(|(_, v)| v.kind != PathVarKind::Fixed)
    }

    /// Look up a non-fixed segment by id
    pub fn find_var(&self, var_id: &str) -> Result<(usize, &PathVar)> {
        self.enumerated_vars()
            .find(|(_, v)| v.id == var_id)
            .ok_or_else(|| ProductError::UnknownVariable(var_id.to_string()))
    }

    /// Install a display-label hook on a segment
    pub fn set_label_format(&mut self, var_id: &str, hook: LabelFormat) -> Result<()> {
        let var = self
            .vars
            .iter_mut()
            .find(|v| v.id == var_id)
            .ok_or_else(|| ProductError::UnknownVariable(var_id.to_string()))?;
        var.label_format = Some(hook);
        Ok(())
    }

    /// Recursively scan the file system below `scan_root` against the
    /// segments from `level` on, attaching discovered nodes under `parent`.
    ///
    /// `scan_root` is `None` only at the start of a pattern whose first
    /// segment provides its own roots (a system enumerator or a fixed
    /// absolute name).
    pub fn scan_file_system(
        &self,
        tree: &mut Tree,
        parent: NodeId,
        scan_root: Option<&Path>,
        level: usize,
    ) -> Result<()> {
        if level >= self.vars.len() {
            return Ok(());
        }
        let var = &self.vars[level];
        let more = level + 1 < self.vars.len() && var.node_kind != NodeKind::Artefact;

        match var.kind {
            PathVarKind::System => {
                let handler = var
                    .handler
                    .as_ref()
                    .ok_or_else(|| ProductError::UndefinedSystemVar(var.id.clone()))?
                    .clone();
                for entry in handler.enumerate(scan_root)? {
                    let mut node = Node::new(entry.name, var.node_kind, level as i32);
                    node.path_name = entry.path_name;
                    node.payload = entry.payload.map(NodePayload::Data);
                    node.fs_path = entry.sub_path.clone();
                    let child = tree.add_child(parent, node);
                    if more {
                        if let Some(sub) = &entry.sub_path {
                            self.scan_file_system(tree, child, Some(sub), level + 1)?;
                        }
                    }
                }
            }
            PathVarKind::User => {
                let root = scan_root.ok_or_else(|| ProductError::VarNeedsRoot(var.id.clone()))?;
                for (entry_name, entry_path) in
                    list_entries(root, var.node_kind != NodeKind::Artefact)?
                {
                    let display = match &var.parse_regex {
                        Some(regex) => match regex.captures(&entry_name) {
                            Some(captures) => captures
                                .get(1)
                                .map(|m| m.as_str().to_string())
                                .unwrap_or_else(|| entry_name.clone()),
                            None => continue,
                        },
                        None => entry_name.clone(),
                    };
                    let mut node = Node::new(display, var.node_kind, level as i32);
                    if node.name != entry_name {
                        node.path_name = Some(entry_name);
                    }
                    node.fs_path = Some(entry_path.clone());
                    let child = tree.add_child(parent, node);
                    if more {
                        self.scan_file_system(tree, child, Some(&entry_path), level + 1)?;
                    }
                }
            }
            PathVarKind::Fixed => {
                let candidate = match scan_root {
                    Some(root) => root.join(&var.name),
                    // An opening fixed segment names an absolute location: a
                    // drive-qualified name stands alone, anything else hangs
                    // off the root directory.
                    None if var.name.contains(':') => PathBuf::from(&var.name),
                    None => Path::new("/").join(&var.name),
                };
                let found = if var.node_kind == NodeKind::Artefact {
                    candidate.is_file()
                } else {
                    candidate.is_dir()
                };
                if found {
                    let mut node = Node::new(var.name.clone(), var.node_kind, level as i32);
                    node.fs_path = Some(candidate.clone());
                    let child = tree.add_child(parent, node);
                    if more {
                        self.scan_file_system(tree, child, Some(&candidate), level + 1)?;
                    }
                }
            }
            PathVarKind::Regex => {
                let root = scan_root.ok_or_else(|| ProductError::VarNeedsRoot(var.id.clone()))?;
                let regex = var
                    .parse_regex
                    .as_ref()
                    .ok_or_else(|| ProductError::MissingRegex(var.id.clone()))?;
                // Only the first matching entry is taken; any further matches
                // in the same directory are skipped.
                for (entry_name, entry_path) in
                    list_entries(root, var.node_kind != NodeKind::Artefact)?
                {
                    if !regex.is_match(&entry_name) {
                        continue;
                    }
                    let mut node = Node::new(var.id.clone(), var.node_kind, level as i32);
                    node.path_name = Some(entry_name);
                    node.fs_path = Some(entry_path.clone());
                    let child = tree.add_child(parent, node);
                    if more {
                        self.scan_file_system(tree, child, Some(&entry_path), level + 1)?;
                    }
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Anchor a configured pattern so matches must span the whole entry name
fn compile_full_match(var_id: &str, pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| ProductError::InvalidRegex {
        var: var_id.to_string(),
        source: e,
    })
}

/// Directory entries of `root`, name-sorted; directories or files only
fn list_entries(root: &Path, want_dirs: bool) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() != want_dirs {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push((name, entry.path()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}
