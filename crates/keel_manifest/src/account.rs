//! Account configuration loading.
//!
//! The account configuration describes the cloud account and network a deployment
//! targets. It is given on the command line either as a path to a YAML file or as a
//! base64-encoded YAML/JSON document.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::{ManifestError, ManifestResult};
use crate::tags::Tags;

/// Fields that must be present and non-empty in every account configuration.
const REQUIRED_FIELDS: [&str; 6] = [
    "account_id",
    "region",
    "vpc",
    "public_subnets",
    "private_subnets",
    "data_subnets",
];

/// Account and network settings shared by every service in a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccountConfig {
    #[serde(deserialize_with = "string_or_number")]
    pub account_id: String,
    pub region: String,
    pub vpc: String,
    pub public_subnets: Vec<String>,
    pub private_subnets: Vec<String>,
    pub data_subnets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_bastion_sg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elasticache_subnet_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rds_subnet_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redshift_subnet_group: Option<String>,
    /// Tag keys every taggable service must carry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_tags: Vec<String>,
    /// Tags applied to every resource in the account
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub resource_tags: Tags,
    /// Settings consumed by extensions
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(u64),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

impl AccountConfig {
    /// Get an extension-specific setting.
    pub fn get_extra<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.extra
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Loads and validates account configuration.
pub struct AccountConfigLoader;

impl AccountConfigLoader {
    /// Load from a file path, or from a base64-encoded document when no such file exists.
    pub fn load(param: &str) -> ManifestResult<AccountConfig> {
        let path = Path::new(param);
        if path.is_file() {
            return Self::load_file(path);
        }

        debug!("No account config file at {:?}, decoding as base64", param);
        let decoded = STANDARD.decode(param.trim())?;
        let content = String::from_utf8(decoded).map_err(|e| {
            ManifestError::InvalidAccountConfig(format!("decoded config is not UTF-8: {}", e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Load from a YAML file on disk.
    pub fn load_file(path: impl AsRef<Path>) -> ManifestResult<AccountConfig> {
        let path = path.as_ref();
        debug!("Reading account config from {:?}", path);

        if !path.exists() {
            return Err(ManifestError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse a YAML (or JSON) document and check its required fields.
    pub fn from_yaml_str(content: &str) -> ManifestResult<AccountConfig> {
        let document: serde_yaml::Value = serde_yaml::from_str(content)?;
        if !document.is_mapping() {
            return Err(ManifestError::InvalidAccountConfig(
                "account config must be a mapping".to_string(),
            ));
        }

        for field in REQUIRED_FIELDS {
            if !is_present(document.get(field)) {
                return Err(ManifestError::MissingField(field.to_string()));
            }
        }

        Ok(serde_yaml::from_value(document)?)
    }
}

fn is_present(value: Option<&serde_yaml::Value>) -> bool {
    match value {
        None | Some(serde_yaml::Value::Null) => false,
        Some(serde_yaml::Value::String(s)) => !s.is_empty(),
        Some(serde_yaml::Value::Sequence(items)) => !items.is_empty(),
        Some(_) => true,
    }
}
