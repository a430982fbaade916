//! Extension API.
//!
//! An extension contributes a family of service types. Each extension is loaded into
//! its own [`ExtensionContext`], scoped to the prefix the manifest gives it, and
//! registers its deployers there by name.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::deployer::ServiceDeployer;

/// Error type returned by extension loading.
pub type ExtensionLoadError = Box<dyn std::error::Error + Send + Sync>;

/// A loadable bundle of service deployers.
#[async_trait]
pub trait Extension: Send + Sync {
    /// Register this extension's deployers.
    async fn load(&self, context: &mut ExtensionContext) -> Result<(), ExtensionLoadError>;
}

/// Registration target handed to an extension while it loads.
pub struct ExtensionContext {
    prefix: String,
    services: BTreeMap<String, Arc<dyn ServiceDeployer>>,
    duplicates: Vec<String>,
}

impl ExtensionContext {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            services: BTreeMap::new(),
            duplicates: Vec::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Register a deployer under `name` in this extension's namespace.
    ///
    /// The first registration of a name wins. Registering it again fails the load.
    pub fn service(
        &mut self,
        name: impl Into<String>,
        deployer: Arc<dyn ServiceDeployer>,
    ) -> &mut Self {
        let name = name.into();
        if self.services.contains_key(&name) {
            warn!("Service type {}::{} is already registered", self.prefix, name);
            self.duplicates.push(name);
            return self;
        }
        debug!("Registering service type {}::{}", self.prefix, name);
        self.services.insert(name, deployer);
        self
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(|s| s.as_str()).collect()
    }

    /// Names registered more than once, in registration order.
    pub fn duplicate_services(&self) -> &[String] {
        &self.duplicates
    }

    pub(crate) fn into_services(self) -> BTreeMap<String, Arc<dyn ServiceDeployer>> {
        self.services
    }
}

/// Extensions linked into this binary, keyed by the name manifests refer to them by.
#[derive(Default, Clone)]
pub struct ExtensionCatalog {
    extensions: BTreeMap<String, Arc<dyn Extension>>,
}

impl ExtensionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, extension: Arc<dyn Extension>) -> Self {
        self.extensions.insert(name.into(), extension);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Extension>> {
        self.extensions.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.extensions.keys().map(|s| s.as_str()).collect()
    }
}

impl std::fmt::Debug for ExtensionCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionCatalog")
            .field("extensions", &self.names())
            .finish()
    }
}
