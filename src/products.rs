//! Products: all scan groups of one project
//!
//! Builds the groups from a production configuration, drives scans across
//! them with injected progress reporting, and persists scan results as a
//! JSON cache keyed by project id and production-file timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::category::CategoryCollection;
use crate::checksum::Checksum;
use crate::config::{file_mtime, ProductionConfig};
use crate::error::{ProductError, Result};
use crate::group::{Group, TupleNode};
use crate::pathvar::SystemVarRegistry;
use crate::progress::ScanProgress;
use crate::project::Project;

/// Type identifier prefix of scan-cache files
pub const DTI_SCAN: &str = "/catharsys/production/scan:";

/// Persisted scan results for a whole project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanCache {
    #[serde(rename = "sDTI")]
    pub dti: String,

    #[serde(rename = "sProjectId")]
    pub project_id: String,

    /// Modification time of the production configuration the scan was built
    /// from, seconds since the epoch; a mismatch against the live file marks
    /// the cache stale
    #[serde(rename = "fProdFileTimestamp")]
    pub prod_file_timestamp: f64,

    #[serde(
        rename = "sProdFileChecksum",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub prod_file_checksum: Option<Checksum>,

    #[serde(rename = "mGroups")]
    pub groups: BTreeMap<String, TupleNode>,
}

/// All scan groups of one project
#[derive(Debug, Clone)]
pub struct Products {
    pub project: Project,
    pub categories: CategoryCollection,
    groups: BTreeMap<String, Group>,
    prod_file_timestamp: f64,
    prod_file_checksum: Option<Checksum>,
    scan_timestamp: Option<DateTime<Utc>>,
}

impl Products {
    /// Build the groups from an already-parsed production configuration.
    ///
    /// Filepath variables in all path patterns are substituted from the
    /// project before the patterns compile; every schema error surfaces here.
    pub fn from_config(
        project: Project,
        config: &ProductionConfig,
        registry: &SystemVarRegistry,
    ) -> Result<Self> {
        let categories = CategoryCollection::from_config(&config.categories)?;

        let mut groups = BTreeMap::new();
        for (id, group_config) in &config.groups {
            let mut group_config = group_config.clone();
            group_config.path_structure = project.substitute(&group_config.path_structure)?;
            for type_config in group_config.artefact_types.values_mut() {
                type_config.path_structure = project.substitute(&type_config.path_structure)?;
            }
            groups.insert(
                id.clone(),
                Group::from_config(id, &group_config, &categories, registry)?,
            );
        }

        Ok(Self {
            project,
            categories,
            groups,
            prod_file_timestamp: 0.0,
            prod_file_checksum: None,
            scan_timestamp: None,
        })
    }

    /// Load and parse a production configuration file, recording its
    /// timestamp and checksum for cache staleness checks
    pub fn load(
        project: Project,
        prod_file: impl AsRef<Path>,
        registry: &SystemVarRegistry,
    ) -> Result<Self> {
        let (config, timestamp, checksum) = ProductionConfig::load(prod_file)?;
        let mut products = Self::from_config(project, &config, registry)?;
        products.prod_file_timestamp = timestamp;
        products.prod_file_checksum = Some(checksum);
        Ok(products)
    }

    pub fn group_ids(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    pub fn group(&self, id: &str) -> Result<&Group> {
        self.groups
            .get(id)
            .ok_or_else(|| ProductError::UnknownGroup(id.to_string()))
    }

    pub fn group_mut(&mut self, id: &str) -> Result<&mut Group> {
        self.groups
            .get_mut(id)
            .ok_or_else(|| ProductError::UnknownGroup(id.to_string()))
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// When the last in-process scan finished
    pub fn scan_timestamp(&self) -> Option<DateTime<Utc>> {
        self.scan_timestamp
    }

    /// Scan one group, or all groups when `group_id` is `None`
    pub fn scan_artefacts(
        &mut self,
        group_id: Option<&str>,
        progress: &dyn ScanProgress,
    ) -> Result<()> {
        let ids: Vec<String> = match group_id {
            Some(id) => {
                self.group(id)?;
                vec![id.to_string()]
            }
            None => self.groups.keys().cloned().collect(),
        };

        progress.iter_init("Scanning groups", ids.len());
        let total = ids.len();
        for (index, id) in ids.iter().enumerate() {
            let group = self.group_mut(id)?;
            group.scan_artefacts(progress)?;
            progress.iter_update(1, index + 1 == total);
        }
        self.scan_timestamp = Some(Utc::now());
        Ok(())
    }

    /// Flatten all scanned groups into a cache record
    pub fn serialize_scans(&self) -> Result<ScanCache> {
        let mut groups = BTreeMap::new();
        for (id, group) in &self.groups {
            if group.is_scanned() {
                groups.insert(id.clone(), group.serialize_scan()?);
            }
        }
        Ok(ScanCache {
            dti: format!("{}1.0", DTI_SCAN),
            project_id: self.project.id.clone(),
            prod_file_timestamp: self.prod_file_timestamp,
            prod_file_checksum: self.prod_file_checksum.clone(),
            groups,
        })
    }

    /// Write the scan cache file
    pub fn save_scan(&self, path: impl AsRef<Path>) -> Result<()> {
        let cache = self.serialize_scans()?;
        let content = serde_json::to_string_pretty(&cache)?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load a scan cache and rebuild the group trees from it.
    ///
    /// A cache from a different project is fatal. A cached group absent from
    /// the current schema is skipped with a warning. Returns whether the
    /// cache still matches the live production configuration.
    pub fn load_scan(&mut self, path: impl AsRef<Path>) -> Result<bool> {
        let content = std::fs::read_to_string(path)?;
        let cache: ScanCache = serde_json::from_str(&content)?;
        self.apply_scan(&cache)
    }

    /// Apply an in-memory cache record; see [`Products::load_scan`]
    pub fn apply_scan(&mut self, cache: &ScanCache) -> Result<bool> {
        if !cache.dti.starts_with(DTI_SCAN) {
            return Err(ProductError::UnsupportedDti(cache.dti.clone()));
        }
        if cache.project_id != self.project.id {
            return Err(ProductError::ProjectMismatch {
                expected: self.project.id.clone(),
                found: cache.project_id.clone(),
            });
        }

        for (id, data) in &cache.groups {
            match self.groups.get_mut(id) {
                Some(group) => group.deserialize_scan(data)?,
                None => {
                    tracing::warn!(
                        group = id.as_str(),
                        "scan cache contains a group not present in the production configuration; skipping"
                    );
                }
            }
        }

        Ok(self.scan_matches_prod_file(cache))
    }

    /// Whether a cache record was built from the production configuration
    /// this instance loaded
    pub fn scan_matches_prod_file(&self, cache: &ScanCache) -> bool {
        cache.prod_file_timestamp == self.prod_file_timestamp
    }
}

/// Whether a cached timestamp matches the live production file's mtime
pub fn does_scan_match_prod_file(cache_timestamp: f64, prod_file: &Path) -> Result<bool> {
    Ok(file_mtime(prod_file)? == cache_timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathvar::SystemEntry;
    use crate::progress::NullProgress;
    use std::fs;
    use std::path::Path;

    fn registry_for(root: &Path) -> SystemVarRegistry {
        let mut registry = SystemVarRegistry::new();
        let root = root.to_path_buf();
        registry.register_fn("production", move |_| {
            Ok(vec![SystemEntry::for_dir(root.clone(), "production")])
        });
        registry
    }

    fn config(groups: serde_json::Value) -> ProductionConfig {
        serde_json::from_value(serde_json::json!({
            "sDTI": "/catharsys/production:1.0",
            "mGroups": groups
        }))
        .unwrap()
    }

    fn scanned_products(root: &Path) -> Products {
        let config = config(serde_json::json!({
            "std": {
                "sPathStructure": "!production/?camera",
                "mArtefactTypes": { "image": { "sPathStructure": "img/?frame" } }
            }
        }));
        let mut products =
            Products::from_config(Project::new("p1", root), &config, &registry_for(root)).unwrap();
        products.scan_artefacts(None, &NullProgress).unwrap();
        products
    }

    fn layout(root: &Path) {
        fs::create_dir_all(root.join("cam/img")).unwrap();
        fs::write(root.join("cam/img/0001.png"), b"x").unwrap();
    }

    #[test]
    fn test_scan_unknown_group_fails() {
        let dir = tempfile::tempdir().unwrap();
        layout(dir.path());
        let mut products = scanned_products(dir.path());
        let err = products
            .scan_artefacts(Some("nope"), &NullProgress)
            .unwrap_err();
        assert!(matches!(err, ProductError::UnknownGroup(_)));
    }

    #[test]
    fn test_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        layout(dir.path());
        let products = scanned_products(dir.path());

        let cache_file = dir.path().join("scan.json");
        products.save_scan(&cache_file).unwrap();

        let config = config(serde_json::json!({
            "std": {
                "sPathStructure": "!production/?camera",
                "mArtefactTypes": { "image": { "sPathStructure": "img/?frame" } }
            }
        }));
        let mut reloaded = Products::from_config(
            Project::new("p1", dir.path()),
            &config,
            &registry_for(dir.path()),
        )
        .unwrap();
        reloaded.load_scan(&cache_file).unwrap();

        let tree = reloaded.group("std").unwrap().tree().unwrap();
        assert!(tree.find_child(tree.root(), "cam").is_some());
    }

    #[test]
    fn test_cache_project_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        layout(dir.path());
        let products = scanned_products(dir.path());
        let cache = products.serialize_scans().unwrap();

        let config = config(serde_json::json!({
            "std": { "sPathStructure": "!production/?camera" }
        }));
        let mut other = Products::from_config(
            Project::new("p2", dir.path()),
            &config,
            &registry_for(dir.path()),
        )
        .unwrap();
        let err = other.apply_scan(&cache).unwrap_err();
        assert!(matches!(err, ProductError::ProjectMismatch { .. }));
    }

    #[test]
    fn test_cache_unknown_group_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        layout(dir.path());
        let products = scanned_products(dir.path());
        let mut cache = products.serialize_scans().unwrap();
        let data = cache.groups.remove("std").unwrap();
        cache.groups.insert("renamed".to_string(), data);

        let config = config(serde_json::json!({
            "std": {
                "sPathStructure": "!production/?camera",
                "mArtefactTypes": { "image": { "sPathStructure": "img/?frame" } }
            }
        }));
        let mut reloaded = Products::from_config(
            Project::new("p1", dir.path()),
            &config,
            &registry_for(dir.path()),
        )
        .unwrap();
        reloaded.apply_scan(&cache).unwrap();
        assert!(!reloaded.group("std").unwrap().is_scanned());
    }

    #[test]
    fn test_staleness_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        layout(dir.path());
        let prod_file = dir.path().join("production.json");
        fs::write(
            &prod_file,
            serde_json::to_string(&config(serde_json::json!({
                "std": { "sPathStructure": "!production/?camera" }
            })))
            .unwrap(),
        )
        .unwrap();

        let mut products = Products::load(
            Project::new("p1", dir.path()),
            &prod_file,
            &registry_for(dir.path()),
        )
        .unwrap();
        products.scan_artefacts(None, &NullProgress).unwrap();
        let cache = products.serialize_scans().unwrap();
        assert!(products.scan_matches_prod_file(&cache));
        assert!(does_scan_match_prod_file(cache.prod_file_timestamp, &prod_file).unwrap());

        let mismatched = ScanCache {
            prod_file_timestamp: cache.prod_file_timestamp + 5.0,
            ..cache
        };
        assert!(!products.scan_matches_prod_file(&mismatched));
    }
}
