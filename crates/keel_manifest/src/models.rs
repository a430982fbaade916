//! Manifest data models.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ManifestError, ManifestResult};
use crate::extension::ExtensionDefinition;
use crate::tags::Tags;

/// Prefix under which the built-in service types are registered.
///
/// Service types from this namespace are written without a prefix in manifests.
pub const STDLIB_PREFIX: &str = "keel";

/// Separator between an extension prefix and a service type name.
pub const PREFIX_SEPARATOR: &str = "::";

/// A parsed application manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    pub version: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
    /// Extension prefix -> extension spec (`name[@version]`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, String>,
    pub environments: BTreeMap<String, EnvironmentDefinition>,
}

/// The services of one environment, keyed by service name.
pub type EnvironmentDefinition = BTreeMap<String, ServiceConfig>;

impl Manifest {
    /// Get an environment definition by name.
    pub fn environment(&self, name: &str) -> ManifestResult<&EnvironmentDefinition> {
        self.environments
            .get(name)
            .ok_or_else(|| ManifestError::EnvironmentNotFound(name.to_string()))
    }

    /// Get the names of all declared environments.
    pub fn environment_names(&self) -> Vec<&str> {
        self.environments.keys().map(|s| s.as_str()).collect()
    }

    /// Parse the `extensions` block into extension definitions.
    pub fn extension_definitions(&self) -> ManifestResult<Vec<ExtensionDefinition>> {
        self.extensions
            .iter()
            .map(|(prefix, spec)| ExtensionDefinition::parse(prefix, spec))
            .collect()
    }

    /// Overlay additional application-level tags, replacing existing keys.
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags.extend(tags);
        self
    }
}

/// Configuration of a single service as declared in the manifest.
///
/// Only the keys the orchestrator itself interprets are typed. Everything else is
/// kept in `params` for the deployer of the service type to interpret.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_consumers: Vec<ServiceEventConsumer>,
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl ServiceConfig {
    pub fn new(service_type: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
            ..Self::default()
        }
    }

    pub fn depends_on(mut self, service_name: impl Into<String>) -> Self {
        self.dependencies.push(service_name.into());
        self
    }

    pub fn event_consumer(mut self, service_name: impl Into<String>) -> Self {
        self.event_consumers.push(ServiceEventConsumer::new(service_name));
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Parse the declared `type` into a namespace-qualified service type.
    pub fn parsed_type(&self) -> ManifestResult<ServiceType> {
        self.service_type.parse()
    }

    /// Get a type-specific parameter.
    pub fn get_param<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.params
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }
}

/// A service that consumes events produced by the declaring service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServiceEventConsumer {
    pub service_name: String,
    /// Producer-specific settings (event filters, batch sizes, ...)
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl ServiceEventConsumer {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            params: serde_json::Map::new(),
        }
    }
}

/// A namespace-qualified service type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceType {
    pub prefix: String,
    pub name: String,
}

impl ServiceType {
    pub fn new(prefix: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            name: name.into(),
        }
    }

    /// A service type from the built-in namespace.
    pub fn stdlib(name: impl Into<String>) -> Self {
        Self::new(STDLIB_PREFIX, name)
    }

    pub fn is_stdlib(&self) -> bool {
        self.prefix == STDLIB_PREFIX
    }
}

impl FromStr for ServiceType {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ManifestError::InvalidServiceType(s.to_string());
        match s.split_once(PREFIX_SEPARATOR) {
            None if !s.is_empty() => Ok(Self::stdlib(s)),
            None => Err(invalid()),
            Some((prefix, name)) => {
                if prefix.is_empty() || name.is_empty() || name.contains(PREFIX_SEPARATOR) {
                    return Err(invalid());
                }
                Ok(Self::new(prefix, name))
            }
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_stdlib() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}{}{}", self.prefix, PREFIX_SEPARATOR, self.name)
        }
    }
}
