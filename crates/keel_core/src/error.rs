//! Error types for the core module.

use thiserror::Error;

use crate::deployer::Phase;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type alias for deployer calls.
pub type DeployerResult<T> = Result<T, DeployerError>;

/// Errors raised while loading extensions or resolving service types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No extension with the prefix '{prefix}' is loaded")]
    MissingPrefix { prefix: String },

    #[error("Extension '{prefix}' has no deployer for the service type '{name}'")]
    MissingDeployer { prefix: String, name: String },

    #[error("Failed to load extension '{name}' (prefix '{prefix}'): {message}")]
    ExtensionLoading {
        prefix: String,
        name: String,
        message: String,
    },
}

/// Errors raised by the dependency graph algorithms.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Your application has circular dependencies in your environment definition! (detected at '{node}')")]
    CircularDependency { node: String },

    #[error("Service '{service}' depends on '{dependency}', which is not defined in the environment")]
    UnknownDependency { service: String, dependency: String },
}

/// Errors raised by service deployers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeployerError {
    #[error("{service}: {message}")]
    Failed { service: String, message: String },

    #[error("The '{service_type}' service type doesn't implement the '{phase}' phase")]
    Unsupported { service_type: String, phase: Phase },

    #[error("Cloud API error: {0}")]
    Cloud(String),
}

impl DeployerError {
    pub fn failed(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            service: service.into(),
            message: message.into(),
        }
    }
}

/// Errors that can occur during orchestration.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Deployer(#[from] DeployerError),

    #[error("{phase} failed for service '{service}': {message}")]
    PhaseFailed {
        phase: Phase,
        service: String,
        message: String,
    },

    #[error("Level {level} failed: {source}")]
    LevelFailed {
        level: usize,
        source: Box<CoreError>,
    },

    #[error("Errors while checking deploy spec:\n{}", .0.join("\n"))]
    CheckFailed(Vec<String>),

    #[error("The following errors were found in your manifest:\n  {}", .0.join("\n  "))]
    InvalidManifest(Vec<String>),

    #[error(transparent)]
    Manifest(#[from] keel_manifest::ManifestError),
}

impl CoreError {
    /// Wrap a deployer failure with the phase and service it occurred in.
    pub fn phase(phase: Phase, service: impl Into<String>, error: DeployerError) -> Self {
        Self::PhaseFailed {
            phase,
            service: service.into(),
            message: error.to_string(),
        }
    }

    /// Attach the deploy order level a failure happened in.
    pub fn in_level(self, level: usize) -> Self {
        Self::LevelFailed {
            level,
            source: Box::new(self),
        }
    }

    /// The level a failure happened in, if it happened inside the level loop.
    pub fn level(&self) -> Option<usize> {
        match self {
            Self::LevelFailed { level, .. } => Some(*level),
            _ => None,
        }
    }
}
