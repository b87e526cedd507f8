//! Typed path segments
//!
//! A path-structure pattern compiles into an ordered list of [`PathVar`]
//! segments. Four segment kinds cover the layouts jobs produce: a fixed
//! folder name, a user-defined capture (optionally regex-filtered), a
//! system-provided enumerator, and a single-capture regex.

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ProductError, Result};
use crate::node::NodeKind;

/// Kind of a path segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathVarKind {
    /// Literal folder name
    Fixed,
    /// Free capture over directory entries, optionally regex-filtered
    User,
    /// Driven by a registered enumerator callback
    System,
    /// Single-capture regex; only the first matching entry is taken
    Regex,
}

/// Hook that formats a raw value into a display label
pub type LabelFormat = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// One segment of a declarative path pattern
#[derive(Clone)]
pub struct PathVar {
    /// Identifier within the pattern
    pub id: String,
    /// Display name
    pub name: String,
    /// Segment kind
    pub kind: PathVarKind,
    /// Kind of node this segment produces
    pub node_kind: NodeKind,
    /// Full-match filter; the first capture group becomes the display name
    pub parse_regex: Option<Regex>,
    /// Template mapping a value back to a file-system name
    pub replace_value: Option<String>,
    /// Ids of categories attached to this variable's values
    pub categories: Vec<String>,
    /// Optional display-label hook
    pub label_format: Option<LabelFormat>,
    pub(crate) handler: Option<Arc<dyn SystemHandler>>,
}

impl PathVar {
    /// Create a segment with no regex, categories or handler
    pub fn new(id: impl Into<String>, kind: PathVarKind, node_kind: NodeKind) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind,
            node_kind,
            parse_regex: None,
            replace_value: None,
            categories: Vec::new(),
            label_format: None,
            handler: None,
        }
    }

    /// Format a raw value into its display label
    pub fn label(&self, value: &str) -> String {
        match &self.label_format {
            Some(f) => f(value),
            None => value.to_string(),
        }
    }

    /// Map a captured value back to the file-system name it came from.
    ///
    /// The replace template is the inverse of the parse regex; `$1` stands
    /// for the value. Without a template the value is the name.
    pub fn path_name_for(&self, value: &str) -> String {
        match &self.replace_value {
            Some(template) => template.replace("$1", value),
            None => value.to_string(),
        }
    }
}

impl fmt::Debug for PathVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathVar")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("node_kind", &self.node_kind)
            .field("parse_regex", &self.parse_regex.as_ref().map(|r| r.as_str()))
            .field("categories", &self.categories)
            .finish()
    }
}

/// One entry yielded by a system-variable handler
#[derive(Debug, Clone)]
pub struct SystemEntry {
    /// File-system path to recurse into; `None` stops the descent here
    pub sub_path: Option<PathBuf>,
    /// Display name of the produced node
    pub name: String,
    /// Free-form payload attached to the produced node
    pub payload: Option<serde_json::Value>,
    /// Literal file-system name when it differs from `name`
    pub path_name: Option<String>,
}

impl SystemEntry {
    /// Entry pointing at a directory, named after it
    pub fn for_dir(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            sub_path: Some(path.into()),
            name: name.into(),
            payload: None,
            path_name: None,
        }
    }
}

/// Enumerator backing a system path segment
///
/// Invoked with the file-system path scanned so far, or `None` when the
/// segment opens the pattern.
pub trait SystemHandler: Send + Sync {
    fn enumerate(&self, scan_root: Option<&Path>) -> Result<Vec<SystemEntry>>;
}

impl fmt::Debug for dyn SystemHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SystemHandler")
    }
}

struct FnHandler<F>(F);

impl<F> SystemHandler for FnHandler<F>
where
    F: Fn(Option<&Path>) -> Result<Vec<SystemEntry>> + Send + Sync,
{
    fn enumerate(&self, scan_root: Option<&Path>) -> Result<Vec<SystemEntry>> {
        (self.0)(scan_root)
    }
}

/// Registry of system-variable handlers, keyed by variable id
#[derive(Default, Clone)]
pub struct SystemVarRegistry {
    handlers: HashMap<String, Arc<dyn SystemHandler>>,
}

impl SystemVarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; a later registration under the same id wins
    pub fn register(&mut self, id: impl Into<String>, handler: Arc<dyn SystemHandler>) {
        self.handlers.insert(id.into(), handler);
    }

    /// Register a closure as a handler
    pub fn register_fn<F>(&mut self, id: impl Into<String>, f: F)
    where
        F: Fn(Option<&Path>) -> Result<Vec<SystemEntry>> + Send + Sync + 'static,
    {
        self.register(id, Arc::new(FnHandler(f)));
    }

    /// Resolve a handler, failing on an unregistered id
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn SystemHandler>> {
        self.handlers
            .get(id)
            .cloned()
            .ok_or_else(|| ProductError::UndefinedSystemVar(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
    }
}

impl fmt::Debug for SystemVarRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.handlers.keys().collect();
        ids.sort();
        f.debug_struct("SystemVarRegistry").field("ids", &ids).finish()
    }
}
