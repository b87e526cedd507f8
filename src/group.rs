//! Scan groups and artefact types
//!
//! A group combines one group-level path structure with any number of
//! artefact-type structures sharing the group leaves as their roots. Scanning
//! rebuilds the group's tree from scratch: the group structure is walked
//! first, branches that bottom out early are pruned, and every surviving leaf
//! is extended with one artefact-group anchor per declared artefact type.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::category::CategoryCollection;
use crate::config::GroupConfig;
use crate::error::{ProductError, Result};
use crate::node::{Node, NodeId, NodeKind, NodePayload, Tree};
use crate::pathvar::SystemVarRegistry;
use crate::progress::ScanProgress;
use crate::structure::PathStructure;

/// A named kind of leaf file discoverable under a group
#[derive(Debug, Clone)]
pub struct ArtefactType {
    pub id: String,
    pub name: String,
    /// Path structure rooted at a group leaf; terminal segment is an artefact
    pub structure: PathStructure,
    /// Free-form metadata passed through to export consumers
    pub meta: serde_json::Value,
}

/// One scan group: a group path structure plus its artefact types
#[derive(Debug, Clone)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub structure: PathStructure,
    pub artefact_types: BTreeMap<String, ArtefactType>,
    pub categories: CategoryCollection,
    tree: Option<Tree>,
}

/// Serialized form of one scanned node: name, path name, level, kind tag,
/// payload representation, children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleNode(
    pub String,
    pub Option<String>,
    pub i32,
    pub u8,
    pub Option<String>,
    pub Vec<TupleNode>,
);

impl Group {
    /// Build a group from its configuration block.
    ///
    /// Path patterns must already have filepath variables substituted; all
    /// schema errors (unknown system variables, bad regexes, unknown
    /// categories) surface here.
    pub fn from_config(
        id: &str,
        config: &GroupConfig,
        categories: &CategoryCollection,
        registry: &SystemVarRegistry,
    ) -> Result<Self> {
        let structure = PathStructure::parse(
            &config.path_structure,
            NodeKind::Path,
            categories,
            &config.vars,
            registry,
        )?;

        let mut artefact_types = BTreeMap::new();
        for (type_id, type_config) in &config.artefact_types {
            let type_structure = PathStructure::parse(
                &type_config.path_structure,
                NodeKind::Artefact,
                categories,
                &type_config.vars,
                registry,
            )?;
            artefact_types.insert(
                type_id.clone(),
                ArtefactType {
                    id: type_id.clone(),
                    name: type_config.name.clone().unwrap_or_else(|| type_id.clone()),
                    structure: type_structure,
                    meta: type_config.meta.clone(),
                },
            );
        }

        Ok(Self {
            id: id.to_string(),
            name: config.name.clone().unwrap_or_else(|| id.to_string()),
            structure,
            artefact_types,
            categories: categories.clone(),
            tree: None,
        })
    }

    /// The scanned tree; fails until a scan or cache load populated it
    pub fn tree(&self) -> Result<&Tree> {
        self.tree
            .as_ref()
            .ok_or_else(|| ProductError::NotScanned(self.id.clone()))
    }

    pub fn is_scanned(&self) -> bool {
        self.tree.is_some()
    }

    /// Look up an artefact type by id
    pub fn artefact_type(&self, type_id: &str) -> Result<&ArtefactType> {
        self.artefact_types
            .get(type_id)
            .ok_or_else(|| ProductError::UnknownArtefactType(type_id.to_string()))
    }

    /// Rebuild the group tree from the file system.
    ///
    /// Clears any previous scan. Group branches that end above the terminal
    /// level are pruned; pruning repeats until a fixpoint since removing a
    /// branch can expose new short leaves.
    pub fn scan_artefacts(&mut self, progress: &dyn ScanProgress) -> Result<()> {
        progress.status(&format!("Scanning group '{}'", self.id));
        self.tree = None;

        let mut tree = Tree::new(Node::new(self.name.clone(), NodeKind::Group, -1));
        let root = tree.root();
        self.structure.scan_file_system(&mut tree, root, None, 0)?;

        let max_level = self.structure.max_level();
        loop {
            let short: Vec<NodeId> = tree
                .leaves(root)
                .into_iter()
                .filter(|id| *id != root && tree.node(*id).level < max_level)
                .collect();
            if short.is_empty() {
                break;
            }
            for id in short {
                tree.detach(id);
            }
        }

        let leaves: Vec<(NodeId, Option<PathBuf>)> = tree
            .leaves(root)
            .into_iter()
            .filter(|id| *id != root)
            .map(|id| (id, tree.node(id).fs_path.clone()))
            .collect();

        let total = leaves.len() * self.artefact_types.len();
        progress.iter_init(&format!("Artefacts of '{}'", self.id), total);
        let mut done = 0;
        for (leaf, fs_path) in leaves {
            for (type_id, artefact_type) in &self.artefact_types {
                let mut anchor = Node::new(type_id.clone(), NodeKind::ArtGroup, -1);
                anchor.payload = Some(NodePayload::ArtefactType(type_id.clone()));
                anchor.fs_path = fs_path.clone();
                let anchor_id = tree.add_child(leaf, anchor);
                if let Some(fs_path) = &fs_path {
                    artefact_type
                        .structure
                        .scan_file_system(&mut tree, anchor_id, Some(fs_path), 0)?;
                }
                done += 1;
                progress.iter_update(1, done == total);
            }
        }

        self.tree = Some(tree);
        Ok(())
    }

    /// Observed values per group variable, across all branches.
    ///
    /// For every enumerated (non-fixed) segment this collects the distinct
    /// node names at that depth anywhere in the tree, not along one sample
    /// path, sorted by the observed-value policy.
    pub fn group_var_value_lists(&self) -> Result<Vec<(String, Vec<String>)>> {
        let tree = self.tree()?;
        let root = tree.root();
        let mut out = Vec::new();
        for (level, var) in self.structure.enumerated_vars() {
            let names: BTreeSet<String> = tree
                .at_depth(root, level + 1, |n| n.kind != NodeKind::ArtGroup)
                .into_iter()
                .map(|id| tree.node(id).name.clone())
                .collect();
            let mut values: Vec<String> = names.into_iter().collect();
            sort_observed_values(&mut values);
            out.push((var.id.clone(), values));
        }
        Ok(out)
    }

    /// Observed values per artefact variable, per artefact type.
    ///
    /// With `same_var_value_union` (the default of every caller), a variable
    /// id appearing in the structures of two or more artefact types gets the
    /// union of its value sets written back under each of those types, so a
    /// shared axis presents one consistent list even when individual types
    /// are missing values.
    pub fn artefact_var_values(
        &self,
        same_var_value_union: bool,
    ) -> Result<BTreeMap<String, Vec<(String, Vec<String>)>>> {
        let tree = self.tree()?;
        let mut per_type: BTreeMap<String, Vec<(String, Vec<String>)>> = BTreeMap::new();

        for (type_id, artefact_type) in &self.artefact_types {
            let anchors = artgroup_anchors(tree, type_id);
            let mut lists = Vec::new();
            for (level, var) in artefact_type.structure.enumerated_vars() {
                let mut names: BTreeSet<String> = BTreeSet::new();
                for anchor in &anchors {
                    for id in tree.at_depth(*anchor, level + 1, |_| true) {
                        names.insert(tree.node(id).name.clone());
                    }
                }
                let mut values: Vec<String> = names.into_iter().collect();
                sort_observed_values(&mut values);
                lists.push((var.id.clone(), values));
            }
            per_type.insert(type_id.clone(), lists);
        }

        if same_var_value_union {
            let mut unions: BTreeMap<String, (usize, BTreeSet<String>)> = BTreeMap::new();
            for lists in per_type.values() {
                for (var_id, values) in lists {
                    let entry = unions.entry(var_id.clone()).or_default();
                    entry.0 += 1;
                    entry.1.extend(values.iter().cloned());
                }
            }
            for lists in per_type.values_mut() {
                for (var_id, values) in lists.iter_mut() {
                    if let Some((count, union)) = unions.get(var_id) {
                        if *count >= 2 {
                            let mut merged: Vec<String> = union.iter().cloned().collect();
                            sort_observed_values(&mut merged);
                            *values = merged;
                        }
                    }
                }
            }
        }

        Ok(per_type)
    }

    /// Flatten the scanned tree into its serialized tuple form
    pub fn serialize_scan(&self) -> Result<TupleNode> {
        let tree = self.tree()?;
        Ok(serialize_node(tree, tree.root()))
    }

    /// Rebuild the scanned tree from its serialized tuple form.
    ///
    /// Artefact-group payloads are re-linked to the live artefact types by
    /// id; a payload referencing a type absent from this group's schema is
    /// invalid scan data.
    pub fn deserialize_scan(&mut self, data: &TupleNode) -> Result<()> {
        let root = self.node_from_tuple(data)?;
        let mut tree = Tree::new(root);
        let root_id = tree.root();
        for child in &data.5 {
            self.add_tuple(&mut tree, root_id, child)?;
        }
        self.tree = Some(tree);
        Ok(())
    }

    fn add_tuple(&self, tree: &mut Tree, parent: NodeId, data: &TupleNode) -> Result<()> {
        let node = self.node_from_tuple(data)?;
        let id = tree.add_child(parent, node);
        for child in &data.5 {
            self.add_tuple(tree, id, child)?;
        }
        Ok(())
    }

    fn node_from_tuple(&self, data: &TupleNode) -> Result<Node> {
        let kind = NodeKind::from_int(data.3)
            .ok_or_else(|| ProductError::InvalidScanData(format!("unknown node kind {}", data.3)))?;
        let mut node = Node::new(data.0.clone(), kind, data.2);
        node.path_name = data.1.clone();
        if let Some(repr) = &data.4 {
            node.payload = Some(self.payload_from_repr(repr)?);
        }
        Ok(node)
    }

    fn payload_from_repr(&self, repr: &str) -> Result<NodePayload> {
        if let Some(id) = repr
            .strip_prefix("CArtefactType(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            if !self.artefact_types.contains_key(id) {
                return Err(ProductError::InvalidScanData(format!(
                    "scan references unknown artefact type '{}'",
                    id
                )));
            }
            return Ok(NodePayload::ArtefactType(id.to_string()));
        }
        let value: serde_json::Value = serde_json::from_str(repr)
            .map_err(|_| ProductError::InvalidScanData(format!("unreadable payload '{}'", repr)))?;
        Ok(NodePayload::Data(value))
    }
}

fn serialize_node(tree: &Tree, id: NodeId) -> TupleNode {
    let node = tree.node(id);
    let payload = node.payload.as_ref().map(|p| match p {
        NodePayload::ArtefactType(type_id) => format!("CArtefactType({})", type_id),
        NodePayload::Data(value) => value.to_string(),
    });
    TupleNode(
        node.name.clone(),
        node.path_name.clone(),
        node.level,
        node.kind.as_int(),
        payload,
        node.children()
            .iter()
            .map(|child| serialize_node(tree, *child))
            .collect(),
    )
}

/// All artefact-group anchors of one artefact type
pub(crate) fn artgroup_anchors(tree: &Tree, type_id: &str) -> Vec<NodeId> {
    let mut anchors = Vec::new();
    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        if node.kind == NodeKind::ArtGroup {
            if let Some(NodePayload::ArtefactType(t)) = &node.payload {
                if t == type_id {
                    anchors.push(id);
                }
            }
            continue;
        }
        stack.extend(node.children().iter().copied());
    }
    anchors
}

/// Sort observed values: numerically when every value parses as an integer,
/// lexically otherwise
pub fn sort_observed_values(values: &mut [String]) {
    if values.iter().all(|v| v.parse::<i64>().is_ok()) {
        values.sort_by_key(|v| v.parse::<i64>().unwrap_or(0));
    } else {
        values.sort();
    }
}
