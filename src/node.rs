//! Scanned-tree nodes
//!
//! An owning arena tree: the `Tree` holds all nodes in a flat vector, parents
//! own their children by index and each child keeps a back-reference to its
//! parent. Detached subtrees stay allocated but become unreachable; every walk
//! starts at the root, so they are never visited again.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Role of a node in the scanned tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// Top of a products tree
    Root,
    /// Root of one scanned group
    Group,
    /// Anchor of one artefact type below a group leaf
    ArtGroup,
    /// Leaf file produced by a job
    Artefact,
    /// Intermediate folder level
    Path,
}

impl NodeKind {
    /// Stable integer tag used by the serialized scan cache
    pub fn as_int(&self) -> u8 {
        match self {
            NodeKind::Root => 0,
            NodeKind::Group => 1,
            NodeKind::ArtGroup => 2,
            NodeKind::Artefact => 3,
            NodeKind::Path => 4,
        }
    }

    /// Inverse of [`NodeKind::as_int`]
    pub fn from_int(value: u8) -> Option<Self> {
        match value {
            0 => Some(NodeKind::Root),
            1 => Some(NodeKind::Group),
            2 => Some(NodeKind::ArtGroup),
            3 => Some(NodeKind::Artefact),
            4 => Some(NodeKind::Path),
            _ => None,
        }
    }
}

/// Opaque payload attached to a node
#[derive(Debug, Clone, PartialEq)]
pub enum NodePayload {
    /// Id of the artefact type anchored at an [`NodeKind::ArtGroup`] node
    ArtefactType(String),
    /// Free-form data yielded by a system-variable handler
    Data(serde_json::Value),
}

/// Index of a node within its [`Tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// One vertex of the scanned tree
#[derive(Debug, Clone)]
pub struct Node {
    /// Display name (regex capture, handler name, or the literal entry name)
    pub name: String,
    /// Literal file-system name when it differs from `name`
    pub path_name: Option<String>,
    /// Tree level; structure roots sit at -1, segment `i` nodes at `i`
    pub level: i32,
    /// Role of this node
    pub kind: NodeKind,
    /// Optional payload
    pub payload: Option<NodePayload>,
    /// Resolved file-system location; scan-time only, absent after a cache load
    pub fs_path: Option<PathBuf>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    /// Create a detached node
    pub fn new(name: impl Into<String>, kind: NodeKind, level: i32) -> Self {
        Self {
            name: name.into(),
            path_name: None,
            level,
            kind,
            payload: None,
            fs_path: None,
            parent: None,
            children: Vec::new(),
        }
    }

    /// The literal file-system name of this node
    pub fn fs_name(&self) -> &str {
        self.path_name.as_deref().unwrap_or(&self.name)
    }

    /// Ids of this node's children
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Id of this node's parent, if any
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Owning arena tree of scanned nodes
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Create a tree consisting of the given root node
    pub fn new(root: Node) -> Self {
        Self { nodes: vec![root] }
    }

    /// Id of the root node
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Borrow a node
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Mutably borrow a node
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Attach `node` as the last child of `parent`
    pub fn add_child(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Detach `id` from its parent, making its whole subtree unreachable
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
        self.nodes[id.0].parent = None;
    }

    /// First child of `parent` whose display name equals `name`
    pub fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|c| self.node(*c).name == name)
    }

    /// Display names on the path from the root (exclusive) down to `id`
    pub fn name_path(&self, id: NodeId) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            let node = self.node(c);
            if node.parent.is_none() {
                break;
            }
            names.push(node.name.clone());
            current = node.parent;
        }
        names.reverse();
        names
    }

    /// Nearest ancestor of `id` (including `id` itself) with the given kind
    pub fn ancestor_of_kind(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(c) = current {
            let node = self.node(c);
            if node.kind == kind {
                return Some(c);
            }
            current = node.parent;
        }
        None
    }

    /// Reachable nodes at `depth` below `root`, left to right.
    ///
    /// `descend` gates which children are entered, so a walk over group levels
    /// can stop at artefact-group anchors.
    pub fn at_depth(
        &self,
        root: NodeId,
        depth: usize,
        descend: impl Fn(&Node) -> bool,
    ) -> Vec<NodeId> {
        let mut current = vec![root];
        for _ in 0..depth {
            let mut next = Vec::new();
            for id in current {
                for child in self.node(id).children() {
                    if descend(self.node(*child)) {
                        next.push(*child);
                    }
                }
            }
            current = next;
        }
        current
    }

    /// Reachable leaves below `id`, depth first
    pub fn leaves(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_leaves(id, &mut out);
        out
    }

    fn collect_leaves(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let node = self.node(id);
        if node.children.is_empty() {
            out.push(id);
        } else {
            for child in &node.children {
                self.collect_leaves(*child, out);
            }
        }
    }

    /// Number of reachable nodes, root included
    pub fn reachable_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            count += 1;
            stack.extend(self.node(id).children().iter().copied());
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> (Tree, NodeId, NodeId) {
        let mut tree = Tree::new(Node::new("std", NodeKind::Group, -1));
        let root = tree.root();
        let a = tree.add_child(root, Node::new("a", NodeKind::Path, 0));
        let b = tree.add_child(root, Node::new("b", NodeKind::Path, 0));
        tree.add_child(a, Node::new("1", NodeKind::Path, 1));
        tree.add_child(a, Node::new("2", NodeKind::Path, 1));
        (tree, a, b)
    }

    #[test]
    fn test_name_path_excludes_root() {
        let (tree, a, _) = sample_tree();
        let leaf = tree.find_child(a, "2").unwrap();
        assert_eq!(tree.name_path(leaf), vec!["a", "2"]);
    }

    #[test]
    fn test_detach_makes_subtree_unreachable() {
        let (mut tree, a, b) = sample_tree();
        assert_eq!(tree.reachable_count(), 5);
        tree.detach(a);
        assert_eq!(tree.reachable_count(), 2);
        assert_eq!(tree.node(tree.root()).children(), &[b]);
    }

    #[test]
    fn test_at_depth_collects_across_branches() {
        let (mut tree, _, b) = sample_tree();
        tree.add_child(b, Node::new("3", NodeKind::Path, 1));
        let names: Vec<_> = tree
            .at_depth(tree.root(), 2, |_| true)
            .into_iter()
            .map(|id| tree.node(id).name.clone())
            .collect();
        assert_eq!(names, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_ancestor_of_kind() {
        let (tree, a, _) = sample_tree();
        let leaf = tree.find_child(a, "1").unwrap();
        let group = tree.ancestor_of_kind(leaf, NodeKind::Group).unwrap();
        assert_eq!(group, tree.root());
        assert!(tree.ancestor_of_kind(leaf, NodeKind::Artefact).is_none());
    }

    #[test]
    fn test_kind_int_round_trip() {
        for kind in [
            NodeKind::Root,
            NodeKind::Group,
            NodeKind::ArtGroup,
            NodeKind::Artefact,
            NodeKind::Path,
        ] {
            assert_eq!(NodeKind::from_int(kind.as_int()), Some(kind));
        }
        assert_eq!(NodeKind::from_int(9), None);
    }
}
