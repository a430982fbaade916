//! Service registry mapping service types to deployer implementations.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures_util::future::join_all;
use keel_manifest::{ExtensionDefinition, ServiceType, STDLIB_PREFIX};
use tracing::{debug, info};

use crate::deployer::ServiceDeployer;
use crate::error::{CoreResult, RegistryError};
use crate::extension::{Extension, ExtensionCatalog, ExtensionContext};
use crate::services::{StandardLibrary, STDLIB_EXTENSION_NAME};

/// A registry of deployers, grouped by extension prefix.
///
/// The registry is filled once by [`ServiceRegistry::load`] and is read-only
/// afterwards.
#[derive(Default)]
pub struct ServiceRegistry {
    prefixes: BTreeMap<String, BTreeMap<String, Arc<dyn ServiceDeployer>>>,
}

impl ServiceRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the standard library and every declared extension.
    ///
    /// Declared extensions are resolved by name in `catalog`.
    pub async fn init(
        definitions: &[ExtensionDefinition],
        catalog: &ExtensionCatalog,
    ) -> CoreResult<Self> {
        let mut extensions: Vec<(ExtensionDefinition, Arc<dyn Extension>)> = vec![(
            ExtensionDefinition::new(STDLIB_PREFIX, STDLIB_EXTENSION_NAME),
            Arc::new(StandardLibrary),
        )];

        for definition in definitions {
            if definition.prefix == STDLIB_PREFIX {
                return Err(RegistryError::ExtensionLoading {
                    prefix: definition.prefix.clone(),
                    name: definition.name.clone(),
                    message: "prefix is reserved for the standard library".to_string(),
                }
                .into());
            }
            let extension =
                catalog
                    .get(&definition.name)
                    .ok_or_else(|| RegistryError::ExtensionLoading {
                        prefix: definition.prefix.clone(),
                        name: definition.name.clone(),
                        message: format!(
                            "extension is not available (known extensions: {})",
                            catalog.names().join(", ")
                        ),
                    })?;
            extensions.push((definition.clone(), extension));
        }

        Self::load(extensions).await
    }

    /// Load the given extensions concurrently, each into its own prefix.
    ///
    /// Fails without returning a registry if any extension fails to load. Each prefix
    /// may only be given to one extension.
    pub async fn load(
        extensions: Vec<(ExtensionDefinition, Arc<dyn Extension>)>,
    ) -> CoreResult<Self> {
        let mut prefixes = BTreeSet::new();
        for (definition, _) in &extensions {
            if !prefixes.insert(definition.prefix.as_str()) {
                return Err(RegistryError::ExtensionLoading {
                    prefix: definition.prefix.clone(),
                    name: definition.name.clone(),
                    message: "prefix is already used by another extension".to_string(),
                }
                .into());
            }
        }

        let loads = extensions.into_iter().map(|(definition, extension)| async move {
            debug!("Loading extension {}", definition);
            let loading_error = |message: String| RegistryError::ExtensionLoading {
                prefix: definition.prefix.clone(),
                name: definition.name.clone(),
                message,
            };

            let mut context = ExtensionContext::new(&definition.prefix);
            extension
                .load(&mut context)
                .await
                .map_err(|e| loading_error(e.to_string()))?;
            if let Some(name) = context.duplicate_services().first() {
                return Err(loading_error(format!(
                    "service type '{}' registered more than once",
                    name
                )));
            }
            Ok::<_, RegistryError>((definition.prefix.clone(), context.into_services()))
        });

        let mut registry = Self::new();
        for loaded in join_all(loads).await {
            let (prefix, services) = loaded?;
            info!("Loaded extension '{}' with {} service types", prefix, services.len());
            registry.prefixes.insert(prefix, services);
        }

        Ok(registry)
    }

    /// Get the deployer of a service type.
    pub fn get_service(
        &self,
        service_type: &ServiceType,
    ) -> Result<Arc<dyn ServiceDeployer>, RegistryError> {
        self.get(&service_type.prefix, &service_type.name)
    }

    /// Get a deployer by prefix and name.
    pub fn get(&self, prefix: &str, name: &str) -> Result<Arc<dyn ServiceDeployer>, RegistryError> {
        let services = self
            .prefixes
            .get(prefix)
            .ok_or_else(|| RegistryError::MissingPrefix {
                prefix: prefix.to_string(),
            })?;
        services
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::MissingDeployer {
                prefix: prefix.to_string(),
                name: name.to_string(),
            })
    }

    /// Check if a service type is registered.
    pub fn has_service(&self, service_type: &ServiceType) -> bool {
        self.prefixes
            .get(&service_type.prefix)
            .map_or(false, |services| services.contains_key(&service_type.name))
    }

    /// Get all loaded extension prefixes.
    pub fn all_prefixes(&self) -> BTreeSet<String> {
        self.prefixes.keys().cloned().collect()
    }

    /// Get all registered service types.
    pub fn service_types(&self) -> Vec<ServiceType> {
        self.prefixes
            .iter()
            .flat_map(|(prefix, services)| {
                services
                    .keys()
                    .map(move |name| ServiceType::new(prefix.clone(), name.clone()))
            })
            .collect()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("service_types", &self.service_types())
            .finish()
    }
}
