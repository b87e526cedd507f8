//! Typed value categories
//!
//! Categories tag enumerated variable values with user-assigned metadata: a
//! plain boolean flag, or a pick from a fixed list of labelled choices. The
//! category kind is selected by the DTI of its configuration block through an
//! explicit match; unknown DTIs fail at collection construction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{CategoryConfig, ChoiceConfig};
use crate::error::{ProductError, Result};

/// DTI prefix of boolean categories
pub const DTI_CATEGORY_BOOL: &str = "/catharsys/production/category/boolean:";
/// DTI prefix of boolean-group categories
pub const DTI_CATEGORY_BOOL_GROUP: &str = "/catharsys/production/category/boolean-group:";

/// Kind tag of a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryKind {
    Boolean,
    BooleanGroup,
}

/// One labelled choice of a boolean-group category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
}

impl From<ChoiceConfig> for Choice {
    fn from(config: ChoiceConfig) -> Self {
        Self {
            description: config.description,
            icon: config.icon,
            color: config.color,
        }
    }
}

/// A typed value domain attachable to path variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Category {
    Boolean {
        id: String,
        name: String,
        default: bool,
        #[serde(default)]
        icon: Option<String>,
        #[serde(default)]
        color: Option<String>,
    },
    BooleanGroup {
        id: String,
        name: String,
        default_index: usize,
        choices: Vec<Choice>,
    },
}

/// A concrete value of a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryValue {
    Bool(bool),
    Index(usize),
}

impl Category {
    /// Build a category from its configuration block, dispatching on the DTI
    pub fn from_config(id: &str, config: &CategoryConfig) -> Result<Self> {
        if config.dti.starts_with(DTI_CATEGORY_BOOL_GROUP) {
            if config.choices.is_empty() {
                return Err(ProductError::InvalidConfig(format!(
                    "boolean-group category '{}' has an empty choice list",
                    id
                )));
            }
            let default_index = config.default_index.unwrap_or(0);
            if default_index >= config.choices.len() {
                return Err(ProductError::InvalidConfig(format!(
                    "boolean-group category '{}': default index {} out of range",
                    id, default_index
                )));
            }
            Ok(Category::BooleanGroup {
                id: id.to_string(),
                name: config.name.clone(),
                default_index,
                choices: config.choices.iter().cloned().map(Choice::from).collect(),
            })
        } else if config.dti.starts_with(DTI_CATEGORY_BOOL) {
            Ok(Category::Boolean {
                id: id.to_string(),
                name: config.name.clone(),
                default: config.default_bool.unwrap_or(false),
                icon: config.icon.clone(),
                color: config.color.clone(),
            })
        } else {
            Err(ProductError::UnsupportedDti(config.dti.clone()))
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Category::Boolean { id, .. } => id,
            Category::BooleanGroup { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Category::Boolean { name, .. } => name,
            Category::BooleanGroup { name, .. } => name,
        }
    }

    pub fn kind(&self) -> CategoryKind {
        match self {
            Category::Boolean { .. } => CategoryKind::Boolean,
            Category::BooleanGroup { .. } => CategoryKind::BooleanGroup,
        }
    }

    /// The value assumed when nothing is stored
    pub fn default_value(&self) -> CategoryValue {
        match self {
            Category::Boolean { default, .. } => CategoryValue::Bool(*default),
            Category::BooleanGroup { default_index, .. } => CategoryValue::Index(*default_index),
        }
    }

    /// Same id, same kind, same default.
    ///
    /// Display metadata may differ; persisted data stays valid across pure
    /// renames and icon changes.
    pub fn is_compatible(&self, other: &Category) -> bool {
        self.id() == other.id()
            && self.kind() == other.kind()
            && self.default_value() == other.default_value()
    }
}

/// Registry of categories, keyed by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryCollection {
    categories: BTreeMap<String, Category>,
}

impl CategoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from configuration blocks
    pub fn from_config(blocks: &BTreeMap<String, CategoryConfig>) -> Result<Self> {
        let mut categories = BTreeMap::new();
        for (id, block) in blocks {
            categories.insert(id.clone(), Category::from_config(id, block)?);
        }
        Ok(Self { categories })
    }

    pub fn get(&self, id: &str) -> Option<&Category> {
        self.categories.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.categories.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Category)> {
        self.categories.iter()
    }

    /// Same ids and pairwise-compatible categories
    pub fn is_compatible(&self, other: &CategoryCollection) -> bool {
        self.categories.len() == other.categories.len()
            && self.categories.iter().all(|(id, cat)| {
                other
                    .categories
                    .get(id)
                    .map(|o| cat.is_compatible(o))
                    .unwrap_or(false)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bool_block(default: bool) -> CategoryConfig {
        serde_json::from_value(serde_json::json!({
            "sDTI": "/catharsys/production/category/boolean:1.0",
            "sName": "Usable",
            "bDefaultValue": default
        }))
        .unwrap()
    }

    fn group_block() -> CategoryConfig {
        serde_json::from_value(serde_json::json!({
            "sDTI": "/catharsys/production/category/boolean-group:1.0",
            "sName": "Rating",
            "iDefaultValue": 1,
            "lGroup": [
                { "sDescription": "bad", "sIcon": "thumb-down", "sColor": "#c00" },
                { "sDescription": "ok", "sIcon": "minus", "sColor": "#999" },
                { "sDescription": "good", "sIcon": "thumb-up", "sColor": "#0a0" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_boolean_category_from_config() {
        let cat = Category::from_config("usable", &bool_block(true)).unwrap();
        assert_eq!(cat.kind(), CategoryKind::Boolean);
        assert_eq!(cat.default_value(), CategoryValue::Bool(true));
    }

    #[test]
    fn test_boolean_group_from_config() {
        let cat = Category::from_config("rating", &group_block()).unwrap();
        assert_eq!(cat.kind(), CategoryKind::BooleanGroup);
        assert_eq!(cat.default_value(), CategoryValue::Index(1));
    }

    #[test]
    fn test_unknown_dti_rejected() {
        let mut block = bool_block(false);
        block.dti = "/catharsys/production/category/scalar:1.0".to_string();
        let err = Category::from_config("x", &block).unwrap_err();
        assert!(matches!(err, ProductError::UnsupportedDti(_)));
    }

    #[test]
    fn test_empty_choice_list_rejected() {
        let mut block = group_block();
        block.choices.clear();
        assert!(Category::from_config("rating", &block).is_err());
    }

    #[test]
    fn test_default_index_out_of_range_rejected() {
        let mut block = group_block();
        block.default_index = Some(7);
        assert!(Category::from_config("rating", &block).is_err());
    }

    #[test]
    fn test_compatibility_ignores_display_metadata() {
        let a = Category::from_config("usable", &bool_block(true)).unwrap();
        let mut renamed = bool_block(true);
        renamed.name = "Keep".to_string();
        renamed.icon = Some("star".to_string());
        let b = Category::from_config("usable", &renamed).unwrap();
        assert!(a.is_compatible(&b));

        let c = Category::from_config("usable", &bool_block(false)).unwrap();
        assert!(!a.is_compatible(&c));
    }

    #[test]
    fn test_collection_compatibility() {
        let mut blocks = BTreeMap::new();
        blocks.insert("usable".to_string(), bool_block(true));
        blocks.insert("rating".to_string(), group_block());
        let a = CategoryCollection::from_config(&blocks).unwrap();
        let b = CategoryCollection::from_config(&blocks).unwrap();
        assert!(a.is_compatible(&b));

        blocks.remove("rating");
        let c = CategoryCollection::from_config(&blocks).unwrap();
        assert!(!a.is_compatible(&c));
    }
}
