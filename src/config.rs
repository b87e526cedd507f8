//! Configuration for the product scanner
//!
//! Two layers load here:
//!
//! - The *production configuration*: the declarative JSON document describing
//!   groups, artefact types, path structures, variables and categories. Its
//!   wire keys follow the established `sName`/`mGroups` convention of the
//!   production tooling, mapped onto idiomatic field names via serde renames.
//! - The *tool settings*: where the production file, scan cache and category
//!   data live. Loaded from `catharsys.toml`, the XDG config directory and
//!   `CATHARSYS_*` environment variables.
//!
//! ## Example production configuration
//! ```json
//! {
//!   "sDTI": "/catharsys/production:1.0",
//!   "mCategories": {
//!     "usable": {
//!       "sDTI": "/catharsys/production/category/boolean:1.0",
//!       "sName": "Usable", "bDefaultValue": true
//!     }
//!   },
//!   "mGroups": {
//!     "std": {
//!       "sName": "Standard renders",
//!       "sPathStructure": "!production/?camera/rq",
//!       "mVars": { "camera": { "sName": "Camera", "lCategories": ["usable"] } },
//!       "mArtefactTypes": {
//!         "image": {
//!           "sName": "Images",
//!           "sPathStructure": "image/=quality/?frame",
//!           "mVars": { "quality": { "sRegExParseValue": "rq(\\d+)" } }
//!         }
//!       }
//!     }
//!   }
//! }
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::checksum::Checksum;
use crate::error::{ProductError, Result};

/// Type identifier prefix accepted for production configurations
pub const DTI_PRODUCTION: &str = "/catharsys/production:1";

/// Declarative production configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionConfig {
    #[serde(rename = "sDTI")]
    pub dti: String,

    /// Category definitions available to all groups, keyed by id
    #[serde(rename = "mCategories", default)]
    pub categories: BTreeMap<String, CategoryConfig>,

    /// Scan groups, keyed by id
    #[serde(rename = "mGroups")]
    pub groups: BTreeMap<String, GroupConfig>,
}

impl ProductionConfig {
    /// Parse a production configuration from JSON text, verifying its DTI
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        if !config.dti.starts_with(DTI_PRODUCTION) {
            return Err(ProductError::UnsupportedDti(config.dti));
        }
        Ok(config)
    }

    /// Load a production configuration file.
    ///
    /// Returns the parsed configuration together with the file's modification
    /// time (seconds since the epoch) and content checksum, both recorded in
    /// the scan cache for staleness detection.
    pub fn load(path: impl AsRef<Path>) -> Result<(Self, f64, Checksum)> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;
        let timestamp = file_mtime(path)?;
        Ok((config, timestamp, Checksum::from_content(&content)))
    }
}

/// Modification time of a file as seconds since the epoch
pub fn file_mtime(path: &Path) -> Result<f64> {
    let modified = std::fs::metadata(path)?.modified()?;
    let since_epoch = modified
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    Ok(since_epoch.as_secs_f64())
}

/// One category definition block, typed by its DTI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    #[serde(rename = "sDTI")]
    pub dti: String,

    #[serde(rename = "sName")]
    pub name: String,

    /// Default for boolean categories
    #[serde(rename = "bDefaultValue", default, skip_serializing_if = "Option::is_none")]
    pub default_bool: Option<bool>,

    /// Default choice index for boolean-group categories
    #[serde(rename = "iDefaultValue", default, skip_serializing_if = "Option::is_none")]
    pub default_index: Option<usize>,

    #[serde(rename = "sIcon", default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(rename = "sColor", default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Labelled choices of a boolean-group category
    #[serde(rename = "lGroup", default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<ChoiceConfig>,
}

/// One choice of a boolean-group category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceConfig {
    #[serde(rename = "sDescription")]
    pub description: String,

    #[serde(rename = "sIcon", default)]
    pub icon: String,

    #[serde(rename = "sColor", default)]
    pub color: String,
}

/// One scan group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(rename = "sName", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Group-level path pattern; its terminal segment produces path nodes
    #[serde(rename = "sPathStructure")]
    pub path_structure: String,

    /// Per-variable configuration, keyed by variable id
    #[serde(rename = "mVars", default)]
    pub vars: BTreeMap<String, VarConfig>,

    /// Artefact types discoverable below the group leaves, keyed by id
    #[serde(rename = "mArtefactTypes", default)]
    pub artefact_types: BTreeMap<String, ArtefactTypeConfig>,
}

/// Configuration of one user, regex or system variable
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VarConfig {
    #[serde(rename = "sName", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Full-match filter; its first capture group becomes the display name
    #[serde(
        rename = "sRegExParseValue",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub regex_parse_value: Option<String>,

    /// Template mapping a value back to a file-system name
    #[serde(
        rename = "sRegExReplaceValue",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub regex_replace_value: Option<String>,

    /// Ids of categories attached to this variable's values
    #[serde(rename = "lCategories", default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

/// One artefact type of a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtefactTypeConfig {
    #[serde(rename = "sName", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Artefact path pattern, rooted at a group leaf; its terminal segment
    /// produces artefact nodes
    #[serde(rename = "sPathStructure")]
    pub path_structure: String,

    #[serde(rename = "mVars", default)]
    pub vars: BTreeMap<String, VarConfig>,

    /// Free-form metadata passed through to export consumers
    #[serde(rename = "mMeta", default, skip_serializing_if = "serde_json::Value::is_null")]
    pub meta: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Tool settings
// ---------------------------------------------------------------------------

/// Settings for the scanner tools
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub project: ProjectSettings,

    #[serde(default)]
    pub scan: ScanSettings,
}

/// Project identity and roots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Project id recorded in (and checked against) the scan cache
    #[serde(default = "default_project_id")]
    pub id: String,

    /// Root directory that job output lands under
    #[serde(default = "default_production_root")]
    pub production_root: PathBuf,

    /// Filepath variables substituted into path patterns as `${name}`
    #[serde(default)]
    pub vars: HashMap<String, String>,
}

/// File locations used by the scan tools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    #[serde(default = "default_production_file")]
    pub production_file: PathBuf,

    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,

    #[serde(default = "default_category_file")]
    pub category_file: PathBuf,
}

fn default_project_id() -> String {
    "default".to_string()
}

fn default_production_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_production_file() -> PathBuf {
    PathBuf::from("production.json")
}

fn default_cache_file() -> PathBuf {
    PathBuf::from(".catharsys/scan.json")
}

fn default_category_file() -> PathBuf {
    PathBuf::from(".catharsys/category-data.json")
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            id: default_project_id(),
            production_root: default_production_root(),
            vars: HashMap::new(),
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            production_file: default_production_file(),
            cache_file: default_cache_file(),
            category_file: default_category_file(),
        }
    }
}

impl Settings {
    /// Load settings from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load settings, optionally forcing a specific file
    pub fn load_from(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for location in ["catharsys.toml", ".catharsys.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "catharsys", "products") {
            let xdg_config = dirs.config_dir().join("catharsys.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("CATHARSYS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save settings to a TOML file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.project.id, "default");
        assert_eq!(settings.scan.production_file, PathBuf::from("production.json"));
    }

    #[test]
    fn test_settings_serialize_to_toml() {
        let settings = Settings::default();
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        assert!(toml_str.contains("[project]"));
        assert!(toml_str.contains("[scan]"));
    }

    #[test]
    fn test_production_config_wire_keys() {
        let config = ProductionConfig::from_json(
            r#"{
                "sDTI": "/catharsys/production:1.0",
                "mGroups": {
                    "std": {
                        "sPathStructure": "!production/?camera",
                        "mVars": { "camera": { "sName": "Camera" } }
                    }
                }
            }"#,
        )
        .unwrap();
        let group = config.groups.get("std").unwrap();
        assert_eq!(group.path_structure, "!production/?camera");
        assert_eq!(group.vars.get("camera").unwrap().name.as_deref(), Some("Camera"));
    }

    #[test]
    fn test_production_config_rejects_foreign_dti() {
        let err = ProductionConfig::from_json(
            r#"{ "sDTI": "/catharsys/launch:1.0", "mGroups": {} }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ProductError::UnsupportedDti(_)));
    }
}
