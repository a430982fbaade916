//! Extension declarations.

use serde::{Deserialize, Serialize};

use crate::error::{ManifestError, ManifestResult};

/// Version requirement used when an extension spec names no version.
pub const ANY_VERSION: &str = "*";

/// An extension declared in the manifest's `extensions` block.
///
/// Service types from the extension are addressed as `<prefix>::<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionDefinition {
    pub prefix: String,
    pub name: String,
    pub version: String,
}

impl ExtensionDefinition {
    pub fn new(prefix: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            name: name.into(),
            version: ANY_VERSION.to_string(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Parse an extension spec of the form `name[@version]`.
    ///
    /// Scoped names (`@scope/name[@version]`) keep their leading `@`.
    pub fn parse(prefix: &str, spec: &str) -> ManifestResult<Self> {
        let invalid = |message: &str| ManifestError::InvalidExtensionSpec {
            spec: spec.to_string(),
            message: message.to_string(),
        };

        let spec = spec.trim();
        let (scope, rest) = match spec.strip_prefix('@') {
            Some(rest) => ("@", rest),
            None => ("", spec),
        };

        let (name, version) = match rest.split_once('@') {
            Some((name, version)) => (name, version),
            None => (rest, ANY_VERSION),
        };

        if name.is_empty() {
            return Err(invalid("extension name is empty"));
        }
        if version.is_empty() {
            return Err(invalid("version after '@' is empty"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(invalid("extension name may not contain whitespace"));
        }

        Ok(Self::new(prefix, format!("{}{}", scope, name)).with_version(version))
    }
}

impl std::fmt::Display for ExtensionDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{} as {}", self.name, self.version, self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_version() {
        let def = ExtensionDefinition::parse("graph", "neptune-extension@^0.2.0").unwrap();
        assert_eq!(def.prefix, "graph");
        assert_eq!(def.name, "neptune-extension");
        assert_eq!(def.version, "^0.2.0");
    }

    #[test]
    fn test_parse_without_version() {
        let def = ExtensionDefinition::parse("secrets", "random-secret").unwrap();
        assert_eq!(def.name, "random-secret");
        assert_eq!(def.version, ANY_VERSION);
    }

    #[test]
    fn test_parse_scoped_name() {
        let def = ExtensionDefinition::parse("acme", "@acme/queues@1.0.0").unwrap();
        assert_eq!(def.name, "@acme/queues");
        assert_eq!(def.version, "1.0.0");

        let unversioned = ExtensionDefinition::parse("acme", "@acme/queues").unwrap();
        assert_eq!(unversioned.name, "@acme/queues");
        assert_eq!(unversioned.version, ANY_VERSION);
    }

    #[test]
    fn test_parse_rejects_empty_parts() {
        assert!(ExtensionDefinition::parse("x", "").is_err());
        assert!(ExtensionDefinition::parse("x", "name@").is_err());
        assert!(ExtensionDefinition::parse("x", "@").is_err());
    }
}
