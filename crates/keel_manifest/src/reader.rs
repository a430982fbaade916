//! Manifest file reading.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{ManifestError, ManifestResult};
use crate::models::Manifest;
use crate::validator::ManifestValidator;

/// Manifest file name looked up when none is given.
pub const DEFAULT_MANIFEST_FILE: &str = "keel.yml";

/// Reader for manifest files.
pub struct ManifestReader;

impl ManifestReader {
    /// Read and structurally validate a manifest file.
    pub fn read_file(path: impl AsRef<Path>) -> ManifestResult<Manifest> {
        let path = path.as_ref();
        debug!("Reading manifest from {:?}", path);

        if !path.exists() {
            return Err(ManifestError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse_str(&content)
    }

    /// Parse and structurally validate manifest content.
    ///
    /// Every structural error is reported at once in [`ManifestError::Invalid`].
    pub fn parse_str(content: &str) -> ManifestResult<Manifest> {
        let document: serde_yaml::Value = serde_yaml::from_str(content)?;

        let result = ManifestValidator::validate_document(&document);
        if !result.valid {
            return Err(ManifestError::Invalid(result.errors));
        }
        for warning in &result.warnings {
            debug!("Manifest warning: {}", warning);
        }

        Ok(serde_yaml::from_value(document)?)
    }
}
