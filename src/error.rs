//! Error types for the product scanner

use thiserror::Error;

/// Result type for scanner operations
pub type Result<T> = std::result::Result<T, ProductError>;

/// Product scanner errors
#[derive(Error, Debug)]
pub enum ProductError {
    #[error("Undefined system variable: {0}")]
    UndefinedSystemVar(String),

    #[error("Variable '{0}' requires a parse regex but none was configured")]
    MissingRegex(String),

    #[error("Invalid regex for variable '{var}': {source}")]
    InvalidRegex {
        var: String,
        #[source]
        source: regex::Error,
    },

    #[error("Category '{category}' referenced by variable '{var}' is not defined")]
    UnknownCategory { var: String, category: String },

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Unknown artefact type: {0}")]
    UnknownArtefactType(String),

    #[error("Unknown group: {0}")]
    UnknownGroup(String),

    #[error("Group '{0}' has no scan data")]
    NotScanned(String),

    #[error("Malformed path structure '{pattern}': {reason}")]
    MalformedPattern { pattern: String, reason: String },

    #[error("Variable '{0}' cannot form the first path segment without a scan root")]
    VarNeedsRoot(String),

    #[error("Invalid node path: {0}")]
    InvalidNodePath(String),

    #[error("Unsupported type identifier: {0}")]
    UnsupportedDti(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid scan data: {0}")]
    InvalidScanData(String),

    #[error("Scan cache belongs to project '{found}', expected '{expected}'")]
    ProjectMismatch { expected: String, found: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
