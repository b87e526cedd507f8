//! Availability analysis
//!
//! Compares a scanned group tree against the variable values a consumer
//! expects to find, and reports which values are absent at which position.
//! The descent stops below an incomplete level: missing values are reported
//! where they first break the expectation, not repeated for every deeper
//! combination they would have produced.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{ProductError, Result};
use crate::group::Group;
use crate::node::{NodeId, NodeKind, NodePayload, Tree};

/// Reserved report key for the group-level path
pub const GROUP_KEY: &str = "__group__";

/// Requested values that were absent below one resolved parent path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingValues {
    /// Concrete values from the group root down to the parent node
    pub parent_path: Vec<String>,
    /// Structure level the missing values belong to
    pub level: i32,
    /// Requested values with no matching child
    pub missing: Vec<String>,
}

/// Result of one availability analysis, keyed by artefact type id plus the
/// reserved group key
#[derive(Debug, Clone, Default, Serialize)]
pub struct AvailabilityReport {
    pub missing: BTreeMap<String, Vec<MissingValues>>,
}

impl AvailabilityReport {
    /// No requested value was absent anywhere
    pub fn is_complete(&self) -> bool {
        self.missing.values().all(Vec::is_empty)
    }

    /// Group-level missing values, flattened to (resolved path, values)
    pub fn missing_group_var_values(&self) -> Vec<(Vec<String>, Vec<String>)> {
        self.missing
            .get(GROUP_KEY)
            .map(|records| {
                records
                    .iter()
                    .map(|r| (r.parent_path.clone(), r.missing.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn record(&mut self, key: &str, entry: MissingValues) {
        self.missing.entry(key.to_string()).or_default().push(entry);
    }
}

/// Availability analysis over one scanned group
pub struct ProductAvailability<'a> {
    group: &'a Group,
}

impl<'a> ProductAvailability<'a> {
    pub fn new(group: &'a Group) -> Self {
        Self { group }
    }

    /// Analyze the group tree against requested values.
    ///
    /// `requested_group` holds one value list per group-structure level, in
    /// order; it may cover fewer levels than the structure has. Artefact
    /// availability is checked per entry of `requested_artefacts` once a
    /// full group path resolved. Referencing an artefact type the group does
    /// not declare is an error.
    pub fn analyze(
        &self,
        requested_group: &[Vec<String>],
        requested_artefacts: &BTreeMap<String, Vec<Vec<String>>>,
    ) -> Result<AvailabilityReport> {
        let tree = self.group.tree()?;

        if requested_group.len() > self.group.structure.len() {
            return Err(ProductError::InvalidConfig(format!(
                "requested {} group levels, structure has {}",
                requested_group.len(),
                self.group.structure.len()
            )));
        }
        for (type_id, levels) in requested_artefacts {
            let artefact_type = self.group.artefact_type(type_id)?;
            if levels.len() > artefact_type.structure.len() {
                return Err(ProductError::InvalidConfig(format!(
                    "requested {} levels for artefact type '{}', structure has {}",
                    levels.len(),
                    type_id,
                    artefact_type.structure.len()
                )));
            }
        }

        let mut report = AvailabilityReport::default();
        let mut path = Vec::new();
        self.descend_group(
            tree,
            tree.root(),
            0,
            requested_group,
            requested_artefacts,
            &mut path,
            &mut report,
        );
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn descend_group(
        &self,
        tree: &Tree,
        node: NodeId,
        level: usize,
        requested_group: &[Vec<String>],
        requested_artefacts: &BTreeMap<String, Vec<Vec<String>>>,
        path: &mut Vec<String>,
        report: &mut AvailabilityReport,
    ) {
        if level >= requested_group.len() {
            if tree.node(node).level == self.group.structure.max_level() {
                self.check_artefacts(tree, node, requested_artefacts, path, report);
            }
            return;
        }

        let requested = &requested_group[level];
        let missing: Vec<String> = requested
            .iter()
            .filter(|value| tree.find_child(node, value).is_none())
            .cloned()
            .collect();

        if !missing.is_empty() {
            report.record(
                GROUP_KEY,
                MissingValues {
                    parent_path: path.clone(),
                    level: level as i32,
                    missing,
                },
            );
            return;
        }

        for value in requested {
            if let Some(child) = tree.find_child(node, value) {
                path.push(value.clone());
                self.descend_group(
                    tree,
                    child,
                    level + 1,
                    requested_group,
                    requested_artefacts,
                    path,
                    report,
                );
                path.pop();
            }
        }
    }

    fn check_artefacts(
        &self,
        tree: &Tree,
        leaf: NodeId,
        requested_artefacts: &BTreeMap<String, Vec<Vec<String>>>,
        path: &mut Vec<String>,
        report: &mut AvailabilityReport,
    ) {
        for (type_id, requested) in requested_artefacts {
            if requested.is_empty() {
                continue;
            }
            let anchor = tree.node(leaf).children().iter().copied().find(|id| {
                let node = tree.node(*id);
                node.kind == NodeKind::ArtGroup
                    && matches!(&node.payload, Some(NodePayload::ArtefactType(t)) if t == type_id)
            });
            match anchor {
                Some(anchor) => {
                    self.descend_artefact(tree, anchor, 0, requested, type_id, path, report);
                }
                None => {
                    // No anchor at all: the first requested level is fully absent.
                    report.record(
                        type_id,
                        MissingValues {
                            parent_path: path.clone(),
                            level: 0,
                            missing: requested[0].clone(),
                        },
                    );
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn descend_artefact(
        &self,
        tree: &Tree,
        node: NodeId,
        level: usize,
        requested: &[Vec<String>],
        type_id: &str,
        path: &mut Vec<String>,
        report: &mut AvailabilityReport,
    ) {
        if level >= requested.len() {
            return;
        }
        let wanted = &requested[level];
        let missing: Vec<String> = wanted
            .iter()
            .filter(|value| tree.find_child(node, value).is_none())
            .cloned()
            .collect();

        if !missing.is_empty() {
            report.record(
                type_id,
                MissingValues {
                    parent_path: path.clone(),
                    level: level as i32,
                    missing,
                },
            );
            return;
        }

        for value in wanted {
            if let Some(child) = tree.find_child(node, value) {
                path.push(value.clone());
                self.descend_artefact(tree, child, level + 1, requested, type_id, path, report);
                path.pop();
            }
        }
    }
}

/// Render values compactly: consecutive integer runs collapse to `a-b`,
/// non-numeric lists join verbatim
pub fn cluster_numeric_ranges(values: &[String]) -> String {
    let numbers: Option<Vec<i64>> = values.iter().map(|v| v.parse().ok()).collect();
    let Some(mut numbers) = numbers else {
        return values.join(", ");
    };
    numbers.sort_unstable();
    numbers.dedup();

    let mut parts = Vec::new();
    let mut i = 0;
    while i < numbers.len() {
        let start = numbers[i];
        let mut end = start;
        while i + 1 < numbers.len() && numbers[i + 1] == end + 1 {
            i += 1;
            end = numbers[i];
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{}-{}", start, end));
        }
        i += 1;
    }
    parts.join(", ")
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

    fn scanned_group(root: &Path, config: serde_json::Value) -> Group {
        let mut registry = SystemVarRegistry::new();
        let root_path = root.to_path_buf();
        registry.register_fn("production", move |_| {
            Ok(vec![SystemEntry::for_dir(root_path.clone(), "production")])
        });
        let config: GroupConfig = serde_json::from_value(config).unwrap();
        let mut group =
            Group::from_config("std", &config, &CategoryCollection::new(), &registry).unwrap();
        group.scan_artefacts(&NullProgress).unwrap();
        group
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_missing_values_reported_per_parent() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("A/1")).unwrap();
        fs::create_dir_all(dir.path().join("B/2")).unwrap();

        let group = scanned_group(
            dir.path(),
            serde_json::json!({ "sPathStructure": "!production/?take/?index" }),
        );
        let report = ProductAvailability::new(&group)
            .analyze(
                &[
                    strings(&["production"]),
                    strings(&["A", "B"]),
                    strings(&["1", "2"]),
                ],
                &BTreeMap::new(),
            )
            .unwrap();

        let mut flattened = report.missing_group_var_values();
        flattened.sort();
        assert_eq!(
            flattened,
            vec![
                (strings(&["production", "A"]), strings(&["2"])),
                (strings(&["production", "B"]), strings(&["1"])),
            ]
        );
    }

    #[test]
    fn test_complete_tree_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("A/1")).unwrap();
        fs::create_dir_all(dir.path().join("A/2")).unwrap();

        let group = scanned_group(
            dir.path(),
            serde_json::json!({ "sPathStructure": "!production/?take/?index" }),
        );
        let report = ProductAvailability::new(&group)
            .analyze(
                &[
                    strings(&["production"]),
                    strings(&["A"]),
                    strings(&["1", "2"]),
                ],
                &BTreeMap::new(),
            )
            .unwrap();
        assert!(report.is_complete());
    }

    #[test]
    fn test_descent_stops_below_incomplete_level() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("A/1")).unwrap();

        let group = scanned_group(
            dir.path(),
            serde_json::json!({ "sPathStructure": "!production/?take/?index" }),
        );
        let report = ProductAvailability::new(&group)
            .analyze(
                &[
                    strings(&["production"]),
                    strings(&["A", "B"]),
                    strings(&["1"]),
                ],
                &BTreeMap::new(),
            )
            .unwrap();

        // B is missing at the take level; nothing below A or B is reported.
        let flattened = report.missing_group_var_values();
        assert_eq!(flattened, vec![(strings(&["production"]), strings(&["B"]))]);
    }

    #[test]
    fn test_artefact_availability_checked_at_group_leaves() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("cam/img")).unwrap();
        fs::write(dir.path().join("cam/img/1"), b"x").unwrap();

        let group = scanned_group(
            dir.path(),
            serde_json::json!({
                "sPathStructure": "!production/?camera",
                "mArtefactTypes": { "image": { "sPathStructure": "img/?frame" } }
            }),
        );
        let mut requested_art = BTreeMap::new();
        requested_art.insert(
            "image".to_string(),
            vec![strings(&["img"]), strings(&["1", "2", "3"])],
        );
        let report = ProductAvailability::new(&group)
            .analyze(
                &[strings(&["production"]), strings(&["cam"])],
                &requested_art,
            )
            .unwrap();

        let image = report.missing.get("image").unwrap();
        assert_eq!(image.len(), 1);
        assert_eq!(
            image[0].parent_path,
            strings(&["production", "cam", "img"])
        );
        assert_eq!(image[0].level, 1);
        assert_eq!(image[0].missing, strings(&["2", "3"]));
    }

    #[test]
    fn test_unknown_artefact_type_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("cam")).unwrap();
        let group = scanned_group(
            dir.path(),
            serde_json::json!({ "sPathStructure": "!production/?camera" }),
        );
        let mut requested_art = BTreeMap::new();
        requested_art.insert("depth".to_string(), vec![strings(&["x"])]);
        let err = ProductAvailability::new(&group)
            .analyze(&[strings(&["production"])], &requested_art)
            .unwrap_err();
        assert!(matches!(err, ProductError::UnknownArtefactType(_)));
    }

    #[test]
    fn test_too_many_requested_levels_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("cam")).unwrap();
        let group = scanned_group(
            dir.path(),
            serde_json::json!({ "sPathStructure": "!production/?camera" }),
        );
        let err = ProductAvailability::new(&group)
            .analyze(
                &[strings(&["production"]), strings(&["cam"]), strings(&["x"])],
                &BTreeMap::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ProductError::InvalidConfig(_)));
    }

    #[test]
    fn test_cluster_numeric_ranges() {
        assert_eq!(
            cluster_numeric_ranges(&strings(&["3", "1", "2", "7", "10", "9"])),
            "1-3, 7, 9-10"
        );
        assert_eq!(cluster_numeric_ranges(&strings(&["b", "a"])), "b, a");
        assert_eq!(cluster_numeric_ranges(&[]), "");
    }
}
