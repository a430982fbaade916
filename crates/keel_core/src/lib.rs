//! # keel_core
//!
//! Deployment orchestration engine for keel.
//!
//! This crate turns a parsed manifest into environments of services and drives each
//! service through a fixed lifecycle, delegating the actual provisioning to the
//! deployer registered for its service type.
//!
//! # Architecture
//!
//! - **Registry**: Maps `prefix::name` service types to deployers contributed by extensions
//! - **Deploy order**: Groups services into levels so each level only depends on lower ones
//! - **Phases**: Run one lifecycle phase for a level (or all services) concurrently
//! - **Orchestrator**: Sequences the phases for deploy and delete
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use keel_core::{DeployOptions, ExtensionCatalog, Orchestrator};
//! use keel_manifest::{AccountConfigLoader, ManifestReader};
//!
//! let manifest = ManifestReader::read_file("keel.yml")?;
//! let account = Arc::new(AccountConfigLoader::load("account.yml")?);
//!
//! let orchestrator = Orchestrator::for_manifest(&manifest, &ExtensionCatalog::new()).await?;
//! let results = orchestrator
//!     .deploy(&manifest, account, &["dev".to_string()], &DeployOptions::new())
//!     .await?;
//! ```

pub mod context;
pub mod deploy_order;
pub mod deployer;
pub mod error;
pub mod extension;
pub mod graph;
pub mod lifecycle;
pub mod outputs;
pub mod phases;
pub mod registry;
pub mod services;
pub mod testing;
pub mod validation;

// Re-export main types for convenience
pub use context::{EnvironmentContext, ServiceContext};
pub use deploy_order::DeployOrder;
pub use deployer::{Capabilities, DeployOutputType, Phase, ServiceDeployer, ServiceInfo};
pub use error::{CoreError, CoreResult, DeployerError, DeployerResult, GraphError, RegistryError};
pub use extension::{Extension, ExtensionCatalog, ExtensionContext, ExtensionLoadError};
pub use graph::{topological_sort, DependencyGraph};
pub use lifecycle::{
    DeleteRecord, DeployOptions, DeployRecord, EnvironmentResult, EnvironmentStatus, Orchestrator,
};
pub use outputs::{
    BindContext, ConsumeEventsContext, DeployContext, PreDeployContext, ProduceEventsContext,
    SecurityGroupRef, UnBindContext, UnDeployContext, UnPreDeployContext,
};
pub use registry::ServiceRegistry;
pub use services::{StandardLibrary, STDLIB_EXTENSION_NAME};
pub use validation::validate_manifest;
