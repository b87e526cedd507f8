//! Persisted category assignments
//!
//! User-assigned category values are stored sparsely: an entry exists only
//! where the value deviates from what the next most specific wildcard pattern
//! (or the category default) already implies. Writing the inherited value
//! removes entries instead of adding them, and removals cascade upward through
//! emptied maps, so the persisted file stays minimal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::category::{Category, CategoryCollection, CategoryValue};
use crate::checksum::Checksum;
use crate::error::{ProductError, Result};
use crate::node_path::ViewDimNodePath;

/// Type identifier prefix of category-data files
pub const DTI_CATEGORY_DATA: &str = "/catharsys/production/category-data:";

/// Sparse mapping from wildcard node paths to category values.
///
/// Lookup scans all stored patterns and returns the value of the most
/// specific one containing the queried path. The linear scan is the
/// correctness baseline; datasets stay small enough that indexing has not
/// been worth it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathDict {
    entries: BTreeMap<String, CategoryValue>,
}

impl PathDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CategoryValue)> {
        self.entries.iter()
    }

    /// Most specific stored entry containing `path`, skipping the key
    /// `exclude` when given.
    fn best_match(
        &self,
        path: &ViewDimNodePath,
        exclude: Option<&str>,
    ) -> Result<Option<(i64, CategoryValue)>> {
        let mut best: Option<(i64, CategoryValue)> = None;
        for (key, value) in &self.entries {
            if exclude == Some(key.as_str()) {
                continue;
            }
            let pattern: ViewDimNodePath = key.parse()?;
            let score = pattern.specificity(path);
            if score < 0 {
                continue;
            }
            if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
                best = Some((score, *value));
            }
        }
        Ok(best)
    }

    /// Value for `path`: the most specific containing entry, or `default`
    pub fn get(&self, path: &ViewDimNodePath, default: CategoryValue) -> Result<CategoryValue> {
        Ok(self
            .best_match(path, None)?
            .map(|(_, value)| value)
            .unwrap_or(default))
    }

    /// Record `value` for `path`, storing only deviations.
    ///
    /// An exact entry is deleted when the next most specific containing entry
    /// already carries `value`, or when no more general match exists and
    /// `value` equals `default`. A new entry is inserted only when `value`
    /// differs from what `path` would inherit.
    pub fn set(
        &mut self,
        path: &ViewDimNodePath,
        value: CategoryValue,
        default: CategoryValue,
    ) -> Result<()> {
        let key = path.to_string();
        if self.entries.contains_key(&key) {
            let inherited = self.best_match(path, Some(&key))?;
            match inherited {
                Some((_, general)) if general == value => {
                    self.entries.remove(&key);
                }
                None if value == default => {
                    self.entries.remove(&key);
                }
                _ => {
                    self.entries.insert(key, value);
                }
            }
        } else {
            match self.best_match(path, None)? {
                Some((_, general)) => {
                    if general != value {
                        self.entries.insert(key, value);
                    }
                }
                None => {
                    if value != default {
                        self.entries.insert(key, value);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Metadata block of a category-data file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryDataMeta {
    #[serde(rename = "sProjectId", default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(rename = "sSavedAt", default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,

    #[serde(
        rename = "sProdFileChecksum",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub prod_file_checksum: Option<Checksum>,
}

type VarData = BTreeMap<String, BTreeMap<String, BTreeMap<String, PathDict>>>;

#[derive(Debug, Serialize, Deserialize)]
struct CategoryDataFile {
    #[serde(rename = "sDTI")]
    dti: String,

    #[serde(rename = "mMeta", default)]
    meta: CategoryDataMeta,

    #[serde(rename = "mCategories", default)]
    categories: CategoryCollection,

    #[serde(rename = "mData", default)]
    data: VarData,
}

/// User-assigned category values per variable value, persisted as JSON
#[derive(Debug, Clone)]
pub struct CategoryData {
    categories: CategoryCollection,
    pub meta: CategoryDataMeta,
    data: VarData,
}

impl CategoryData {
    /// Empty data set over the given categories
    pub fn new(categories: CategoryCollection) -> Self {
        Self {
            categories,
            meta: CategoryDataMeta::default(),
            data: BTreeMap::new(),
        }
    }

    pub fn categories(&self) -> &CategoryCollection {
        &self.categories
    }

    fn category(&self, var_id: &str, category_id: &str) -> Result<&Category> {
        self.categories
            .get(category_id)
            .ok_or_else(|| ProductError::UnknownCategory {
                var: var_id.to_string(),
                category: category_id.to_string(),
            })
    }

    fn check_value(category: &Category, value: CategoryValue) -> Result<()> {
        match (category, value) {
            (Category::Boolean { .. }, CategoryValue::Bool(_)) => Ok(()),
            (Category::BooleanGroup { choices, .. }, CategoryValue::Index(i)) => {
                if i < choices.len() {
                    Ok(())
                } else {
                    Err(ProductError::InvalidConfig(format!(
                        "choice index {} out of range for category '{}'",
                        i,
                        category.id()
                    )))
                }
            }
            _ => Err(ProductError::InvalidConfig(format!(
                "value type does not match category '{}'",
                category.id()
            ))),
        }
    }

    /// Record a category value for one variable value at a wildcard path
    pub fn set_value(
        &mut self,
        var_id: &str,
        var_value: &str,
        category_id: &str,
        path: &ViewDimNodePath,
        value: CategoryValue,
    ) -> Result<()> {
        let category = self.category(var_id, category_id)?;
        Self::check_value(category, value)?;
        let default = category.default_value();

        let dict = self
            .data
            .entry(var_id.to_string())
            .or_default()
            .entry(var_value.to_string())
            .or_default()
            .entry(category_id.to_string())
            .or_default();
        dict.set(path, value, default)?;

        // Sparse representation: emptied maps are removed all the way up.
        if let Some(var_map) = self.data.get_mut(var_id) {
            if let Some(value_map) = var_map.get_mut(var_value) {
                if value_map
                    .get(category_id)
                    .map(PathDict::is_empty)
                    .unwrap_or(false)
                {
                    value_map.remove(category_id);
                }
                if value_map.is_empty() {
                    var_map.remove(var_value);
                }
            }
            if var_map.is_empty() {
                self.data.remove(var_id);
            }
        }
        Ok(())
    }

    /// Resolve the category value for one variable value at a path
    pub fn get_value(
        &self,
        var_id: &str,
        var_value: &str,
        category_id: &str,
        path: &ViewDimNodePath,
    ) -> Result<CategoryValue> {
        let category = self.category(var_id, category_id)?;
        let default = category.default_value();
        match self
            .data
            .get(var_id)
            .and_then(|m| m.get(var_value))
            .and_then(|m| m.get(category_id))
        {
            Some(dict) => dict.get(path, default),
            None => Ok(default),
        }
    }

    /// Number of stored path entries across all variables
    pub fn entry_count(&self) -> usize {
        self.data
            .values()
            .flat_map(|m| m.values())
            .flat_map(|m| m.values())
            .map(PathDict::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write the data set as a whole-file JSON rewrite
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = CategoryDataFile {
            dti: format!("{}1.0", DTI_CATEGORY_DATA),
            meta: CategoryDataMeta {
                saved_at: Some(Utc::now()),
                ..self.meta.clone()
            },
            categories: self.categories.clone(),
            data: self.data.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load persisted data and merge it onto the live category schema.
    ///
    /// Entries whose category no longer exists, or whose persisted definition
    /// is incompatible with the live one, are dropped with a warning.
    pub fn load(path: impl AsRef<Path>, live: &CategoryCollection) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: CategoryDataFile = serde_json::from_str(&content)?;
        if !file.dti.starts_with(DTI_CATEGORY_DATA) {
            return Err(ProductError::UnsupportedDti(file.dti));
        }

        let mut data = file.data;
        for value_map in data.values_mut() {
            for cat_map in value_map.values_mut() {
                cat_map.retain(|cat_id, _| {
                    let keep = match (file.categories.get(cat_id), live.get(cat_id)) {
                        (Some(old), Some(new)) => old.is_compatible(new),
                        (None, Some(_)) => true,
                        _ => false,
                    };
                    if !keep {
                        tracing::warn!(
                            category = cat_id.as_str(),
                            "dropping persisted category data after schema change"
                        );
                    }
                    keep
                });
            }
            value_map.retain(|_, cat_map| !cat_map.is_empty());
        }
        data.retain(|_, value_map| !value_map.is_empty());

        Ok(Self {
            categories: live.clone(),
            meta: file.meta,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryConfig;
    use std::collections::BTreeMap as Map;

    fn collection() -> CategoryCollection {
        let mut blocks: Map<String, CategoryConfig> = Map::new();
        blocks.insert(
            "usable".to_string(),
            serde_json::from_value(serde_json::json!({
                "sDTI": "/catharsys/production/category/boolean:1.0",
                "sName": "Usable",
                "bDefaultValue": true
            }))
            .unwrap(),
        );
        blocks.insert(
            "rating".to_string(),
            serde_json::from_value(serde_json::json!({
                "sDTI": "/catharsys/production/category/boolean-group:1.0",
                "sName": "Rating",
                "iDefaultValue": 0,
                "lGroup": [
                    { "sDescription": "bad" },
                    { "sDescription": "good" }
                ]
            }))
            .unwrap(),
        );
        CategoryCollection::from_config(&blocks).unwrap()
    }

    fn path(s: &str) -> ViewDimNodePath {
        s.parse().unwrap()
    }

    #[test]
    fn test_path_dict_most_specific_wins() {
        let mut dict = PathDict::new();
        let default = CategoryValue::Index(0);
        dict.set(&path("a|*|*"), CategoryValue::Index(1), default).unwrap();
        dict.set(&path("a|b|*"), CategoryValue::Index(2), default).unwrap();
        dict.set(&path("a|b|c"), CategoryValue::Index(3), default).unwrap();

        assert_eq!(dict.get(&path("a|b|c"), default).unwrap(), CategoryValue::Index(3));
        assert_eq!(dict.get(&path("a|b|d"), default).unwrap(), CategoryValue::Index(2));
        assert_eq!(dict.get(&path("a|x|y"), default).unwrap(), CategoryValue::Index(1));
        assert_eq!(dict.get(&path("z|q|r"), default).unwrap(), default);
    }

    #[test]
    fn test_writing_default_is_a_no_op() {
        let mut dict = PathDict::new();
        let default = CategoryValue::Bool(true);
        dict.set(&path("a|b"), CategoryValue::Bool(true), default).unwrap();
        assert!(dict.is_empty());
        assert_eq!(dict.get(&path("a|b"), default).unwrap(), default);
    }

    #[test]
    fn test_inherited_value_is_not_duplicated() {
        let mut dict = PathDict::new();
        let default = CategoryValue::Bool(true);
        dict.set(&path("a|*"), CategoryValue::Bool(false), default).unwrap();
        dict.set(&path("a|b"), CategoryValue::Bool(false), default).unwrap();
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn test_redundant_override_is_removed() {
        let mut dict = PathDict::new();
        let default = CategoryValue::Bool(true);
        dict.set(&path("a|*"), CategoryValue::Bool(false), default).unwrap();
        dict.set(&path("a|b"), CategoryValue::Bool(true), default).unwrap();
        assert_eq!(dict.len(), 2);
        // Flipping the specific entry back to the inherited value deletes it.
        dict.set(&path("a|b"), CategoryValue::Bool(false), default).unwrap();
        assert_eq!(dict.len(), 1);
        // Resetting the general entry to the default deletes it too.
        dict.set(&path("a|*"), CategoryValue::Bool(true), default).unwrap();
        assert!(dict.is_empty());
    }

    #[test]
    fn test_set_value_cascades_removal() {
        let mut data = CategoryData::new(collection());
        let p = path("cam|4");
        data.set_value("camera", "cam", "usable", &p, CategoryValue::Bool(false))
            .unwrap();
        assert_eq!(data.entry_count(), 1);
        data.set_value("camera", "cam", "usable", &p, CategoryValue::Bool(true))
            .unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_unknown_category_is_an_error() {
        let mut data = CategoryData::new(collection());
        let err = data
            .set_value("camera", "cam", "nope", &path("cam"), CategoryValue::Bool(false))
            .unwrap_err();
        assert!(matches!(err, ProductError::UnknownCategory { .. }));
    }

    #[test]
    fn test_value_kind_must_match_category() {
        let mut data = CategoryData::new(collection());
        let err = data
            .set_value("camera", "cam", "usable", &path("cam"), CategoryValue::Index(1))
            .unwrap_err();
        assert!(matches!(err, ProductError::InvalidConfig(_)));
        let err = data
            .set_value("camera", "cam", "rating", &path("cam"), CategoryValue::Index(5))
            .unwrap_err();
        assert!(matches!(err, ProductError::InvalidConfig(_)));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("category-data.json");
        let live = collection();

        let mut data = CategoryData::new(live.clone());
        data.set_value(
            "camera",
            "cam",
            "rating",
            &path("cam|*"),
            CategoryValue::Index(1),
        )
        .unwrap();
        data.save(&file).unwrap();

        let loaded = CategoryData::load(&file, &live).unwrap();
        assert_eq!(
            loaded
                .get_value("camera", "cam", "rating", &path("cam|7"))
                .unwrap(),
            CategoryValue::Index(1)
        );
        assert_eq!(loaded.entry_count(), 1);
    }

    #[test]
    fn test_load_drops_incompatible_categories() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("category-data.json");
        let old = collection();

        let mut data = CategoryData::new(old);
        data.set_value("camera", "cam", "usable", &path("cam"), CategoryValue::Bool(false))
            .unwrap();
        data.save(&file).unwrap();

        // The live schema flipped the default; persisted entries are stale.
        let mut blocks: Map<String, CategoryConfig> = Map::new();
        blocks.insert(
            "usable".to_string(),
            serde_json::from_value(serde_json::json!({
                "sDTI": "/catharsys/production/category/boolean:1.0",
                "sName": "Usable",
                "bDefaultValue": false
            }))
            .unwrap(),
        );
        let live = CategoryCollection::from_config(&blocks).unwrap();

        let loaded = CategoryData::load(&file, &live).unwrap();
        assert!(loaded.is_empty());
    }
}
