//! Multi-dimensional product views
//!
//! A view turns the value selections of a UI or export run into independent,
//! odometer-like dimensions and resolves every counter combination to a node
//! of the scanned tree. Variables fall into three classes: group variables,
//! artefact variables shared by two or more artefact types (presented as one
//! common axis), and variables unique to a single artefact type. Only
//! variables with more than one selected value become iterable dimensions;
//! a single-value selection pins its variable instead.

use std::collections::BTreeMap;

use crate::error::{ProductError, Result};
use crate::group::{sort_observed_values, Group};
use crate::node::{NodeId, NodeKind, NodePayload};
use crate::node_path::ViewDimNodePath;
use crate::pathvar::{PathVar, PathVarKind};
use crate::structure::PathStructure;

/// Role of a view dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewDimKind {
    /// A group variable
    Group,
    /// An artefact variable shared by two or more artefact types
    ArtCommon,
    /// The artefact-type selector
    ArtType,
    /// An artefact variable unique to one artefact type
    Art(String),
}

/// One independently iterable axis: a bounded counter over a value list
#[derive(Debug, Clone)]
pub struct ViewDim {
    pub kind: ViewDimKind,
    pub var_id: String,
    values: Vec<String>,
    labels: Vec<String>,
    index: usize,
}

impl ViewDim {
    pub fn new(
        kind: ViewDimKind,
        var_id: impl Into<String>,
        values: Vec<String>,
        labels: Vec<String>,
    ) -> Self {
        debug_assert_eq!(values.len(), labels.len());
        Self {
            kind,
            var_id: var_id.into(),
            values,
            labels,
            index: 0,
        }
    }

    /// Move back to the first value
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Advance one step; wraps to the first value and reports `false` on
    /// overflow. The caller drives the carry across dimensions.
    pub fn next(&mut self) -> bool {
        if self.index + 1 < self.values.len() {
            self.index += 1;
            true
        } else {
            self.index = 0;
            false
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn min(&self) -> usize {
        0
    }

    pub fn max(&self) -> usize {
        self.values.len().saturating_sub(1)
    }

    /// Current value
    pub fn value(&self) -> &str {
        &self.values[self.index]
    }

    /// Display label of the current value
    pub fn label(&self) -> &str {
        &self.labels[self.index]
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Ordered value selection per variable of one structure
type Selection = Vec<(String, Vec<String>)>;

/// Cross-product view over one scanned group
pub struct ProductView<'a> {
    group: &'a Group,
    selected_group: Selection,
    selected_art: BTreeMap<String, Selection>,
    group_dims: Vec<ViewDim>,
    art_type_dim: Option<ViewDim>,
    common_dims: Vec<ViewDim>,
    special_dims: BTreeMap<String, Vec<ViewDim>>,
}

impl<'a> ProductView<'a> {
    pub fn new(group: &'a Group) -> Self {
        Self {
            group,
            selected_group: Vec::new(),
            selected_art: BTreeMap::new(),
            group_dims: Vec::new(),
            art_type_dim: None,
            common_dims: Vec::new(),
            special_dims: BTreeMap::new(),
        }
    }

    pub fn group(&self) -> &Group {
        self.group
    }

    /// Install the group-variable selection.
    ///
    /// Every enumerated group variable needs a non-empty value list; unknown
    /// variable ids are errors. Variables with more than one selected value
    /// become group dimensions.
    pub fn set_selected_group_var_value_lists(
        &mut self,
        selection: &BTreeMap<String, Vec<String>>,
    ) -> Result<()> {
        self.selected_group = ordered_selection(&self.group.structure, selection)?;
        self.group_dims = self
            .group
            .structure
            .enumerated_vars()
            .filter_map(|(_, var)| {
                let values = &self.selected_group.iter().find(|(id, _)| id == &var.id)?.1;
                if values.len() > 1 {
                    Some(make_dim(ViewDimKind::Group, var, values.clone()))
                } else {
                    None
                }
            })
            .collect();
        Ok(())
    }

    /// Install the artefact-variable selection for one artefact type.
    ///
    /// Recomputes the artefact-side dimensions: the type selector becomes a
    /// dimension once two or more types carry selections, variables shared
    /// across types merge into common dimensions over the union of their
    /// selected values, and single-type variables become per-type dimensions.
    pub fn set_selected_artefact_var_value_lists_for_type(
        &mut self,
        type_id: &str,
        selection: &BTreeMap<String, Vec<String>>,
    ) -> Result<()> {
        let artefact_type = self.group.artefact_type(type_id)?;
        let ordered = ordered_selection(&artefact_type.structure, selection)?;
        self.selected_art.insert(type_id.to_string(), ordered);
        self.rebuild_artefact_dims();
        Ok(())
    }

    fn rebuild_artefact_dims(&mut self) {
        let type_ids: Vec<String> = self.selected_art.keys().cloned().collect();

        self.art_type_dim = if type_ids.len() >= 2 {
            let labels = type_ids
                .iter()
                .map(|id| {
                    self.group
                        .artefact_types
                        .get(id)
                        .map(|t| t.name.clone())
                        .unwrap_or_else(|| id.clone())
                })
                .collect();
            Some(ViewDim::new(
                ViewDimKind::ArtType,
                "artefact-type",
                type_ids.clone(),
                labels,
            ))
        } else {
            None
        };

        // Which types carry each variable id, in type order.
        let mut carriers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for type_id in &type_ids {
            for (var_id, _) in &self.selected_art[type_id] {
                carriers.entry(var_id.clone()).or_default().push(type_id.clone());
            }
        }

        let group = self.group;
        self.common_dims = Vec::new();
        self.special_dims = BTreeMap::new();
        for (var_id, carrying_types) in &carriers {
            if carrying_types.len() >= 2 {
                let mut union: Vec<String> = Vec::new();
                for type_id in carrying_types {
                    for (id, values) in &self.selected_art[type_id] {
                        if id == var_id {
                            for value in values {
                                if !union.contains(value) {
                                    union.push(value.clone());
                                }
                            }
                        }
                    }
                }
                sort_observed_values(&mut union);
                if union.len() > 1 {
                    if let Some(var) = find_artefact_var(group, &carrying_types[0], var_id) {
                        self.common_dims
                            .push(make_dim(ViewDimKind::ArtCommon, var, union));
                    }
                }
            } else {
                let type_id = &carrying_types[0];
                let values = self.selected_art[type_id]
                    .iter()
                    .find(|(id, _)| id == var_id)
                    .map(|(_, v)| v.clone())
                    .unwrap_or_default();
                if values.len() > 1 {
                    if let Some(var) = find_artefact_var(group, type_id, var_id) {
                        let dim = make_dim(ViewDimKind::Art(type_id.clone()), var, values);
                        self.special_dims.entry(type_id.clone()).or_default().push(dim);
                    }
                }
            }
        }
    }

    /// The artefact type the current counters address: the type-selector
    /// value when it iterates, the single selected type otherwise
    pub fn current_artefact_type(&self) -> Option<&str> {
        match &self.art_type_dim {
            Some(dim) => Some(dim.value()),
            None => {
                let mut ids = self.selected_art.keys();
                match (ids.next(), ids.next()) {
                    (Some(id), None) => Some(id),
                    _ => None,
                }
            }
        }
    }

    pub fn group_dims(&self) -> &[ViewDim] {
        &self.group_dims
    }

    pub fn art_type_dim(&self) -> Option<&ViewDim> {
        self.art_type_dim.as_ref()
    }

    pub fn common_dims(&self) -> &[ViewDim] {
        &self.common_dims
    }

    pub fn special_dims(&self, type_id: &str) -> &[ViewDim] {
        self.special_dims
            .get(type_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Active dimensions in display order: group, type selector, common,
    /// then the current type's own dimensions
    pub fn active_dims(&self) -> Vec<&ViewDim> {
        let mut dims: Vec<&ViewDim> = self.group_dims.iter().collect();
        if let Some(dim) = &self.art_type_dim {
            dims.push(dim);
        }
        dims.extend(self.common_dims.iter());
        if let Some(type_id) = self.current_artefact_type() {
            if let Some(special) = self.special_dims.get(type_id) {
                dims.extend(special.iter());
            }
        }
        dims
    }

    /// Reset every dimension to its first value
    pub fn reset(&mut self) {
        for dim in &mut self.group_dims {
            dim.reset();
        }
        if let Some(dim) = &mut self.art_type_dim {
            dim.reset();
        }
        for dim in &mut self.common_dims {
            dim.reset();
        }
        for dims in self.special_dims.values_mut() {
            for dim in dims {
                dim.reset();
            }
        }
    }

    /// Default carry chain over the active dimensions, innermost first:
    /// current-type dimensions, common dimensions, the type selector, group
    /// dimensions. Returns `false` once every combination has been visited.
    ///
    /// Callers with their own iteration order drive [`ViewDim::next`]
    /// directly instead.
    pub fn advance(&mut self) -> bool {
        let current_type = self.current_artefact_type().map(str::to_string);
        if let Some(type_id) = &current_type {
            if let Some(special) = self.special_dims.get_mut(type_id) {
                for dim in special.iter_mut().rev() {
                    if dim.next() {
                        return true;
                    }
                }
            }
        }
        for dim in self.common_dims.iter_mut().rev() {
            if dim.next() {
                return true;
            }
        }
        if let Some(dim) = &mut self.art_type_dim {
            if dim.next() {
                // A new type brings its own dimension set; start it fresh.
                for dims in self.special_dims.values_mut() {
                    for dim in dims {
                        dim.reset();
                    }
                }
                return true;
            }
        }
        for dim in self.group_dims.iter_mut().rev() {
            if dim.next() {
                return true;
            }
        }
        false
    }

    fn current_value(
        &self,
        dims: &[ViewDim],
        use_common: bool,
        selection: &Selection,
        var: &PathVar,
    ) -> Result<String> {
        if let Some(dim) = dims.iter().find(|d| d.var_id == var.id) {
            return Ok(dim.value().to_string());
        }
        if use_common {
            if let Some(dim) = self.common_dims.iter().find(|d| d.var_id == var.id) {
                return Ok(dim.value().to_string());
            }
        }
        selection
            .iter()
            .find(|(id, _)| id == &var.id)
            .and_then(|(_, values)| values.first())
            .cloned()
            .ok_or_else(|| ProductError::UnknownVariable(var.id.clone()))
    }

    /// Resolve the tree node the current counters address, or `None` when
    /// that combination was never scanned (the cross product is sparse)
    pub fn view_dim_node_iteration_value(&self) -> Result<Option<NodeId>> {
        if self.selected_group.is_empty() {
            return Err(ProductError::InvalidConfig(
                "no group selection installed".to_string(),
            ));
        }
        let tree = self.group.tree()?;
        let mut node = tree.root();

        for var in self.group.structure.vars() {
            let name = match var.kind {
                PathVarKind::Fixed => var.name.clone(),
                _ => self.current_value(&self.group_dims, false, &self.selected_group, var)?,
            };
            match tree.find_child(node, &name) {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }

        let Some(type_id) = self.current_artefact_type() else {
            return Ok(Some(node));
        };
        let artefact_type = self.group.artefact_type(type_id)?;
        let anchor = tree.node(node).children().iter().copied().find(|id| {
            let n = tree.node(*id);
            n.kind == NodeKind::ArtGroup
                && matches!(&n.payload, Some(NodePayload::ArtefactType(t)) if t == type_id)
        });
        let Some(mut node) = anchor else {
            return Ok(None);
        };

        let selection = self
            .selected_art
            .get(type_id)
            .ok_or_else(|| ProductError::UnknownArtefactType(type_id.to_string()))?;
        let special = self.special_dims(type_id);
        for var in artefact_type.structure.vars() {
            let name = match var.kind {
                PathVarKind::Fixed => var.name.clone(),
                _ => self.current_value(special, true, selection, var)?,
            };
            match tree.find_child(node, &name) {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }
        Ok(Some(node))
    }

    /// The concrete node path of the current counters, used as the category
    /// lookup key. Positions cover the enumerated variables only.
    pub fn dim_node_path(&self) -> Result<ViewDimNodePath> {
        if self.selected_group.is_empty() {
            return Err(ProductError::InvalidConfig(
                "no group selection installed".to_string(),
            ));
        }
        let mut group_values = Vec::new();
        for (_, var) in self.group.structure.enumerated_vars() {
            group_values.push(self.current_value(&self.group_dims, false, &self.selected_group, var)?);
        }
        let mut path = ViewDimNodePath::from_group_values(group_values);

        if let Some(type_id) = self.current_artefact_type() {
            let artefact_type = self.group.artefact_type(type_id)?;
            let selection = self
                .selected_art
                .get(type_id)
                .ok_or_else(|| ProductError::UnknownArtefactType(type_id.to_string()))?;
            let special = self.special_dims(type_id);
            let mut art_values = Vec::new();
            for (_, var) in artefact_type.structure.enumerated_vars() {
                art_values.push(self.current_value(special, true, selection, var)?);
            }
            path = path.with_artefact(type_id, art_values);
        }
        Ok(path)
    }
}

fn make_dim(kind: ViewDimKind, var: &PathVar, values: Vec<String>) -> ViewDim {
    let labels = values.iter().map(|v| var.label(v)).collect();
    ViewDim::new(kind, var.id.clone(), values, labels)
}

fn find_artefact_var<'g>(group: &'g Group, type_id: &str, var_id: &str) -> Option<&'g PathVar> {
    group
        .artefact_types
        .get(type_id)
        .and_then(|t| t.structure.find_var(var_id).ok())
        .map(|(_, var)| var)
}

/// Order a selection map along a structure's enumerated variables.
///
/// Every enumerated variable needs a non-empty list; ids the structure does
/// not know are rejected.
fn ordered_selection(
    structure: &PathStructure,
    selection: &BTreeMap<String, Vec<String>>,
) -> Result<Selection> {
    for id in selection.keys() {
        structure.find_var(id)?;
    }
    let mut ordered = Vec::new();
    for (_, var) in structure.enumerated_vars() {
        let values = selection
            .get(&var.id)
            .ok_or_else(|| ProductError::UnknownVariable(var.id.clone()))?;
        if values.is_empty() {
            return Err(ProductError::InvalidConfig(format!(
                "empty value selection for variable '{}'",
                var.id
            )));
        }
        ordered.push((var.id.clone(), values.clone()));
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategoryCollection;
    use crate::config::GroupConfig;
    use crate::pathvar::{SystemEntry, SystemVarRegistry};
    use crate::progress::NullProgress;
    use std::fs;
    use std::path::Path;

    #[test]
    fn test_dim_odometer_contract() {
        let mut dim = ViewDim::new(
            ViewDimKind::Group,
            "camera",
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
        );
        assert_eq!(dim.value(), "a");
        assert!(dim.next());
        assert!(dim.next());
        assert_eq!(dim.value(), "c");
        assert_eq!(dim.index(), dim.max());
        // Overflow wraps to min and reports the carry.
        assert!(!dim.next());
        assert_eq!(dim.index(), dim.min());
        dim.next();
        dim.reset();
        assert_eq!(dim.value(), "a");
    }

    fn scanned_group(root: &Path) -> Group {
        fs::create_dir_all(root.join("cam1/img")).unwrap();
        fs::create_dir_all(root.join("cam1/lbl")).unwrap();
        fs::create_dir_all(root.join("cam2/img")).unwrap();
        fs::create_dir_all(root.join("cam2/lbl")).unwrap();
        for cam in ["cam1", "cam2"] {
            fs::write(root.join(cam).join("img/1"), b"x").unwrap();
            fs::write(root.join(cam).join("lbl/1"), b"x").unwrap();
        }
        fs::write(root.join("cam1/img/2"), b"x").unwrap();

        let mut registry = SystemVarRegistry::new();
        let root_path = root.to_path_buf();
        registry.register_fn("production", move |_| {
            Ok(vec![SystemEntry::for_dir(root_path.clone(), "production")])
        });
        let config: GroupConfig = serde_json::from_value(serde_json::json!({
            "sPathStructure": "!production/?camera",
            "mArtefactTypes": {
                "image": { "sName": "Images", "sPathStructure": "img/?frame" },
                "label": { "sName": "Labels", "sPathStructure": "lbl/?frame" }
            }
        }))
        .unwrap();
        let mut group =
            Group::from_config("std", &config, &CategoryCollection::new(), &registry).unwrap();
        group.scan_artefacts(&NullProgress).unwrap();
        group
    }

    fn selection(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(id, values)| {
                (
                    id.to_string(),
                    values.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect()
    }

    fn view_over(group: &Group) -> ProductView<'_> {
        let mut view = ProductView::new(group);
        view.set_selected_group_var_value_lists(&selection(&[
            ("production", &["production"]),
            ("camera", &["cam1", "cam2"]),
        ]))
        .unwrap();
        view.set_selected_artefact_var_value_lists_for_type(
            "image",
            &selection(&[("frame", &["1", "2"])]),
        )
        .unwrap();
        view.set_selected_artefact_var_value_lists_for_type(
            "label",
            &selection(&[("frame", &["1", "2"])]),
        )
        .unwrap();
        view
    }

    #[test]
    fn test_dimension_classification() {
        let dir = tempfile::tempdir().unwrap();
        let group = scanned_group(dir.path());
        let view = view_over(&group);

        // camera iterates, production is pinned.
        assert_eq!(view.group_dims().len(), 1);
        assert_eq!(view.group_dims()[0].var_id, "camera");
        // Two types selected: the type selector is a dimension.
        assert!(view.art_type_dim().is_some());
        // frame is carried by both types: one common dimension, no specials.
        assert_eq!(view.common_dims().len(), 1);
        assert_eq!(view.common_dims()[0].var_id, "frame");
        assert!(view.special_dims("image").is_empty());
        assert!(view.special_dims("label").is_empty());
    }

    #[test]
    fn test_single_type_variable_is_special() {
        let dir = tempfile::tempdir().unwrap();
        let group = scanned_group(dir.path());
        let mut view = ProductView::new(&group);
        view.set_selected_group_var_value_lists(&selection(&[
            ("production", &["production"]),
            ("camera", &["cam1"]),
        ]))
        .unwrap();
        view.set_selected_artefact_var_value_lists_for_type(
            "image",
            &selection(&[("frame", &["1", "2"])]),
        )
        .unwrap();

        assert!(view.art_type_dim().is_none());
        assert!(view.common_dims().is_empty());
        let special = view.special_dims("image");
        assert_eq!(special.len(), 1);
        assert_eq!(special[0].kind, ViewDimKind::Art("image".to_string()));
        assert_eq!(view.current_artefact_type(), Some("image"));
    }

    #[test]
    fn test_selection_validation() {
        let dir = tempfile::tempdir().unwrap();
        let group = scanned_group(dir.path());
        let mut view = ProductView::new(&group);

        let err = view
            .set_selected_group_var_value_lists(&selection(&[("nope", &["x"])]))
            .unwrap_err();
        assert!(matches!(err, ProductError::UnknownVariable(_)));

        let err = view
            .set_selected_group_var_value_lists(&selection(&[("camera", &["cam1"])]))
            .unwrap_err();
        assert!(matches!(err, ProductError::UnknownVariable(_)));

        let err = view
            .set_selected_artefact_var_value_lists_for_type("depth", &selection(&[]))
            .unwrap_err();
        assert!(matches!(err, ProductError::UnknownArtefactType(_)));
    }

    #[test]
    fn test_iteration_resolves_sparse_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let group = scanned_group(dir.path());
        let mut view = view_over(&group);
        view.reset();

        let tree = group.tree().unwrap();
        let mut resolved = Vec::new();
        loop {
            let node = view.view_dim_node_iteration_value().unwrap();
            resolved.push((
                view.dim_node_path().unwrap().to_string(),
                node.map(|id| tree.node(id).name.clone()),
            ));
            if !view.advance() {
                break;
            }
        }

        // 2 cameras x 2 types x 2 frames.
        assert_eq!(resolved.len(), 8);
        let as_map: BTreeMap<String, Option<String>> = resolved.into_iter().collect();
        // Frame 2 exists only for cam1 images.
        assert_eq!(
            as_map.get("production|cam1;image;2"),
            Some(&Some("2".to_string()))
        );
        assert_eq!(as_map.get("production|cam2;image;2"), Some(&None));
        assert_eq!(as_map.get("production|cam1;label;2"), Some(&None));
        assert_eq!(
            as_map.get("production|cam2;label;1"),
            Some(&Some("1".to_string()))
        );
    }

    #[test]
    fn test_group_level_resolution_without_artefact_selection() {
        let dir = tempfile::tempdir().unwrap();
        let group = scanned_group(dir.path());
        let mut view = ProductView::new(&group);
        view.set_selected_group_var_value_lists(&selection(&[
            ("production", &["production"]),
            ("camera", &["cam2"]),
        ]))
        .unwrap();

        let tree = group.tree().unwrap();
        let node = view.view_dim_node_iteration_value().unwrap().unwrap();
        assert_eq!(tree.node(node).name, "cam2");
        assert_eq!(view.dim_node_path().unwrap().to_string(), "production|cam2");
    }
}
