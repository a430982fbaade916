//! Structural manifest validation.
//!
//! These rules only look at the shape of the document. Checks that need to know which
//! service types exist live with the service registry.

use std::collections::BTreeSet;

use regex::Regex;
use serde_yaml::Value;

use crate::extension::ExtensionDefinition;
use crate::models::STDLIB_PREFIX;
use crate::tags::{validate_tags, Tags};

/// Names of apps, environments, services and extension prefixes.
const NAME_PATTERN: &str = r"^[a-zA-Z0-9-]+$";
const APP_NAME_MAX_LENGTH: usize = 30;
const ENVIRONMENT_NAME_MAX_LENGTH: usize = 10;
const SERVICE_NAME_MAX_LENGTH: usize = 20;

/// Validation result with details.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn merge(&mut self, other: ValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Validator for the top-level manifest document.
pub struct ManifestValidator;

impl ManifestValidator {
    /// Validate a raw manifest document.
    pub fn validate_document(document: &Value) -> ValidationResult {
        let mut result = ValidationResult::new();

        if !document.is_mapping() {
            result.add_error("The manifest must be a YAML mapping");
            return result;
        }

        if document.get("version").is_none() {
            result.add_error("'version' field is required");
        } else if document
            .get("version")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .is_none()
        {
            result.add_error("'version' field must be a positive integer");
        }

        result.merge(Self::validate_name(document.get("name")));

        if let Some(tags) = document.get("tags") {
            result.merge(Self::validate_tag_block(tags, "Application tags"));
        }

        if let Some(extensions) = document.get("extensions") {
            result.merge(Self::validate_extensions(extensions));
        }

        result.merge(Self::validate_environments(document.get("environments")));

        result
    }

    fn validate_name(name: Option<&Value>) -> ValidationResult {
        let mut result = ValidationResult::new();

        let name = match name {
            None => {
                result.add_error("'name' field is required");
                return result;
            }
            Some(value) => match value.as_str() {
                Some(name) => name,
                None => {
                    result.add_error("'name' field must be a string");
                    return result;
                }
            },
        };

        if !is_valid_name(name) {
            result.add_error("'name' field may only use alphanumeric characters and dashes");
        } else if name.chars().count() > APP_NAME_MAX_LENGTH {
            result.add_error(format!(
                "'name' field may not be greater than {} characters",
                APP_NAME_MAX_LENGTH
            ));
        } else if name == STDLIB_PREFIX {
            result.add_error(format!(
                "You may not use the name '{}' for your app name",
                STDLIB_PREFIX
            ));
        }

        result
    }

    fn validate_tag_block(tags: &Value, location: &str) -> ValidationResult {
        let mut result = ValidationResult::new();

        match serde_yaml::from_value::<Tags>(tags.clone()) {
            Ok(tags) => {
                for error in validate_tags(&tags, location) {
                    result.add_error(error);
                }
            }
            Err(_) => result.add_error(format!(
                "{}: 'tags' must be a mapping of string keys to string values",
                location
            )),
        }

        result
    }

    fn validate_extensions(extensions: &Value) -> ValidationResult {
        let mut result = ValidationResult::new();

        let Some(extensions) = extensions.as_mapping() else {
            result.add_error("'extensions' field must be a mapping of prefix to extension name");
            return result;
        };

        for (prefix, spec) in extensions {
            let Some(prefix) = prefix.as_str() else {
                result.add_error("Extension prefixes must be strings");
                continue;
            };
            if !is_valid_name(prefix) {
                result.add_error(format!(
                    "Extension prefix '{}' may only use alphanumeric characters and dashes",
                    prefix
                ));
            }
            if prefix == STDLIB_PREFIX {
                result.add_error(format!(
                    "The extension prefix '{}' is reserved for the standard library",
                    STDLIB_PREFIX
                ));
            }

            match spec.as_str() {
                Some(spec) => {
                    if let Err(e) = ExtensionDefinition::parse(prefix, spec) {
                        result.add_error(e.to_string());
                    }
                }
                None => result.add_error(format!(
                    "Extension '{}' must be given as 'name' or 'name@version'",
                    prefix
                )),
            }
        }

        result
    }

    fn validate_environments(environments: Option<&Value>) -> ValidationResult {
        let mut result = ValidationResult::new();

        let Some(environments) = environments else {
            result.add_error("'environments' field is required");
            return result;
        };
        let environments = match environments.as_mapping() {
            Some(map) if !map.is_empty() => map,
            _ => {
                result.add_error(
                    "'environments' field must contain at least 1 environment definition",
                );
                return result;
            }
        };

        for (env_name, services) in environments {
            let env_name = env_name.as_str().unwrap_or_default();
            if !is_valid_name(env_name) || env_name.chars().count() > ENVIRONMENT_NAME_MAX_LENGTH {
                result.add_error(format!(
                    "Environment name fields may only contain alphanumeric characters and dashes, and be no greater than {} characters in length",
                    ENVIRONMENT_NAME_MAX_LENGTH
                ));
            }

            let Some(services) = services.as_mapping() else {
                result.add_error(format!(
                    "Environment '{}' must be a mapping of service names to service definitions",
                    env_name
                ));
                continue;
            };

            for (service_name, service) in services {
                let service_name = service_name.as_str().unwrap_or_default();
                result.merge(Self::validate_service(service_name, service));
            }
        }

        result
    }

    fn validate_service(service_name: &str, service: &Value) -> ValidationResult {
        let mut result = ValidationResult::new();

        if !is_valid_name(service_name) || service_name.chars().count() > SERVICE_NAME_MAX_LENGTH
        {
            result.add_error(format!(
                "Service name fields may only contain alphanumeric characters and dashes, and be no greater than {} characters in length",
                SERVICE_NAME_MAX_LENGTH
            ));
        }

        if !service.is_mapping() {
            result.add_error(format!(
                "Service '{}' must be a mapping of service parameters",
                service_name
            ));
            return result;
        }

        if service.get("type").and_then(Value::as_str).is_none() {
            result.add_error("'type' field is required in each service definition");
        }

        if let Some(dependencies) = service.get("dependencies") {
            let all_strings = dependencies
                .as_sequence()
                .map_or(false, |deps| deps.iter().all(Value::is_string));
            if !all_strings {
                result.add_error(format!(
                    "Service '{}': 'dependencies' must be a list of service names",
                    service_name
                ));
            } else {
                let names = dependencies
                    .as_sequence()
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_str);
                for name in repeated(names) {
                    result.add_error(format!(
                        "Service '{}': dependency '{}' is declared more than once",
                        service_name, name
                    ));
                }
            }
        }

        if let Some(consumers) = service.get("event_consumers") {
            let all_named = consumers.as_sequence().map_or(false, |items| {
                items
                    .iter()
                    .all(|item| item.get("service_name").map_or(false, Value::is_string))
            });
            if !all_named {
                result.add_error(format!(
                    "Service '{}': each 'event_consumers' entry requires a 'service_name'",
                    service_name
                ));
            } else {
                let names = consumers
                    .as_sequence()
                    .into_iter()
                    .flatten()
                    .filter_map(|item| item.get("service_name").and_then(Value::as_str));
                for name in repeated(names) {
                    result.add_error(format!(
                        "Service '{}': event consumer '{}' is declared more than once",
                        service_name, name
                    ));
                }
            }
        }

        if let Some(tags) = service.get("tags") {
            result.merge(Self::validate_tag_block(
                tags,
                &format!("Service '{}' tags", service_name),
            ));
        }

        result
    }
}

/// Names that appear more than once, each reported a single time in first-seen order.
fn repeated<'a>(names: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    let mut reported = BTreeSet::new();
    names
        .filter(|name| !seen.insert(*name) && reported.insert(*name))
        .collect()
}

fn is_valid_name(name: &str) -> bool {
    Regex::new(NAME_PATTERN).map_or(false, |re| re.is_match(name))
}
