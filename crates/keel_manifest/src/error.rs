//! Error types for the manifest module.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Errors that can occur while loading manifests and account configuration.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Manifest not found at path: {0}")]
    NotFound(PathBuf),

    #[error("The following errors were found in your manifest:\n  {}", .0.join("\n  "))]
    Invalid(Vec<String>),

    #[error("Can't find the requested environment in the manifest: {0}")]
    EnvironmentNotFound(String),

    #[error("'{0}' field missing in the account config file")]
    MissingField(String),

    #[error("Invalid account config: {0}")]
    InvalidAccountConfig(String),

    #[error("Invalid extension specification '{spec}': {message}")]
    InvalidExtensionSpec { spec: String, message: String },

    #[error("Invalid service type '{0}': expected '<name>' or '<prefix>::<name>'")]
    InvalidServiceType(String),

    #[error("Invalid tag '{0}': expected <key>=<value>")]
    InvalidTag(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decoding error: {0}")]
    Base64(#[from] base64::DecodeError),
}
