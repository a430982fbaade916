//! Service and environment contexts built from a manifest.

use std::collections::BTreeMap;
use std::sync::Arc;

use keel_manifest::{AccountConfig, Manifest, ServiceConfig, ServiceType, Tags};
use uuid::Uuid;

use crate::error::CoreResult;

/// One declared service instance of an environment.
///
/// Built once when the environment is created and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub app_name: String,
    pub environment_name: String,
    pub service_name: String,
    pub service_type: ServiceType,
    /// The service definition from the manifest, including type-specific parameters
    pub params: ServiceConfig,
    pub account_config: Arc<AccountConfig>,
    /// Application-level tags
    pub tags: Tags,
}

impl ServiceContext {
    pub fn new(
        app_name: impl Into<String>,
        environment_name: impl Into<String>,
        service_name: impl Into<String>,
        service_type: ServiceType,
        params: ServiceConfig,
        account_config: Arc<AccountConfig>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            environment_name: environment_name.into(),
            service_name: service_name.into(),
            service_type,
            params,
            account_config,
            tags: Tags::new(),
        }
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Names of the services this service depends on.
    pub fn dependencies(&self) -> &[String] {
        &self.params.dependencies
    }

    /// Application tags overlaid by the service's own tags.
    pub fn effective_tags(&self) -> Tags {
        let mut tags = self.tags.clone();
        tags.extend(self.params.tags.clone());
        tags
    }

    /// Name used for the cloud resources of this service.
    pub fn resource_name(&self) -> String {
        format!(
            "{}-{}-{}",
            self.app_name, self.environment_name, self.service_name
        )
    }
}

/// One environment of an application, ready to be deployed or deleted.
#[derive(Debug, Clone)]
pub struct EnvironmentContext {
    pub app_name: String,
    pub environment_name: String,
    pub deploy_version: String,
    pub account_config: Arc<AccountConfig>,
    pub tags: Tags,
    pub service_contexts: BTreeMap<String, ServiceContext>,
}

impl EnvironmentContext {
    pub fn new(
        app_name: impl Into<String>,
        environment_name: impl Into<String>,
        account_config: Arc<AccountConfig>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            environment_name: environment_name.into(),
            deploy_version: Self::generate_deploy_version(),
            account_config,
            tags: Tags::new(),
            service_contexts: BTreeMap::new(),
        }
    }

    pub fn with_deploy_version(mut self, deploy_version: impl Into<String>) -> Self {
        self.deploy_version = deploy_version.into();
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Add a service to the environment, replacing one with the same name.
    pub fn with_service(mut self, service: ServiceContext) -> Self {
        self.service_contexts
            .insert(service.service_name.clone(), service);
        self
    }

    /// Build the context of one environment declared in the manifest.
    pub fn from_manifest(
        manifest: &Manifest,
        environment_name: &str,
        account_config: Arc<AccountConfig>,
    ) -> CoreResult<Self> {
        let definition = manifest.environment(environment_name)?;

        let mut context = Self::new(&manifest.name, environment_name, account_config.clone())
            .with_tags(manifest.tags.clone());

        for (service_name, config) in definition {
            let service = ServiceContext::new(
                &manifest.name,
                environment_name,
                service_name,
                config.parsed_type()?,
                config.clone(),
                account_config.clone(),
            )
            .with_tags(manifest.tags.clone());
            context = context.with_service(service);
        }

        Ok(context)
    }

    /// A fresh unique deploy version.
    pub fn generate_deploy_version() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn service(&self, name: &str) -> Option<&ServiceContext> {
        self.service_contexts.get(name)
    }

    /// Service name -> names of its dependencies.
    pub fn dependency_graph(&self) -> BTreeMap<String, Vec<String>> {
        self.service_contexts
            .iter()
            .map(|(name, service)| (name.clone(), service.dependencies().to_vec()))
            .collect()
    }

    /// Services that declare `service_name` as a dependency.
    pub fn dependents_of(&self, service_name: &str) -> Vec<&ServiceContext> {
        self.service_contexts
            .values()
            .filter(|s| s.dependencies().iter().any(|d| d == service_name))
            .collect()
    }
}
