//! The service deployer contract.
//!
//! Each service type is backed by a [`ServiceDeployer`]. A deployer declares which
//! lifecycle phases it implements through [`Capabilities`]; the orchestrator only
//! calls the phases a deployer declares and synthesizes empty results for the rest.
//!
//! # Example
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use keel_core::{
//!     Capabilities, DeployContext, DeployerResult, Phase, PreDeployContext, ServiceContext,
//!     ServiceDeployer, ServiceInfo,
//! };
//!
//! struct BucketDeployer;
//!
//! #[async_trait]
//! impl ServiceDeployer for BucketDeployer {
//!     fn info(&self) -> ServiceInfo {
//!         ServiceInfo::new(Capabilities::new().with(Phase::Check).with(Phase::Deploy))
//!     }
//!
//!     async fn deploy(
//!         &self,
//!         service: &ServiceContext,
//!         _pre_deploy: &PreDeployContext,
//!         _dependencies: &[DeployContext],
//!     ) -> DeployerResult<DeployContext> {
//!         Ok(DeployContext::new(service))
//!     }
//! }
//! ```

use std::collections::BTreeSet;

use async_trait::async_trait;
use keel_manifest::{ServiceEventConsumer, ServiceType};
use serde::{Deserialize, Serialize};

use crate::context::ServiceContext;
use crate::error::{DeployerError, DeployerResult};
use crate::outputs::{
    BindContext, ConsumeEventsContext, DeployContext, PreDeployContext, ProduceEventsContext,
    UnBindContext, UnDeployContext, UnPreDeployContext,
};

/// A lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Check,
    PreDeploy,
    GetPreDeployContext,
    Bind,
    Deploy,
    ConsumeEvents,
    ProduceEvents,
    UnDeploy,
    UnBind,
    UnPreDeploy,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::PreDeploy => "pre-deploy",
            Self::GetPreDeployContext => "get-pre-deploy-context",
            Self::Bind => "bind",
            Self::Deploy => "deploy",
            Self::ConsumeEvents => "consume-events",
            Self::ProduceEvents => "produce-events",
            Self::UnDeploy => "un-deploy",
            Self::UnBind => "un-bind",
            Self::UnPreDeploy => "un-pre-deploy",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kinds of output a deploy context can carry to dependent services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployOutputType {
    EnvironmentVariables,
    Policies,
    Credentials,
    SecurityGroups,
    Scripts,
}

/// The set of phases a deployer implements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    phases: BTreeSet<Phase>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, phase: Phase) -> Self {
        self.phases.insert(phase);
        self
    }

    pub fn supports(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }

    pub fn phases(&self) -> impl Iterator<Item = Phase> + '_ {
        self.phases.iter().copied()
    }
}

impl FromIterator<Phase> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Phase>>(iter: I) -> Self {
        Self {
            phases: iter.into_iter().collect(),
        }
    }
}

/// Static metadata of a deployer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub capabilities: Capabilities,
    pub produced_deploy_output_types: Vec<DeployOutputType>,
    pub consumed_deploy_output_types: Vec<DeployOutputType>,
    /// Service types that may consume events from this one
    pub produced_events_supported_services: Vec<ServiceType>,
    /// Whether required account tags are enforced for this service type
    pub supports_tagging: bool,
    /// Whether dependents must be bound to this service before they deploy
    pub requires_binding: bool,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            capabilities: Capabilities::new(),
            produced_deploy_output_types: Vec::new(),
            consumed_deploy_output_types: Vec::new(),
            produced_events_supported_services: Vec::new(),
            supports_tagging: true,
            requires_binding: false,
        }
    }
}

impl ServiceInfo {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }

    pub fn produces(mut self, output: DeployOutputType) -> Self {
        self.produced_deploy_output_types.push(output);
        self
    }

    pub fn consumes(mut self, output: DeployOutputType) -> Self {
        self.consumed_deploy_output_types.push(output);
        self
    }

    pub fn produces_events_for(mut self, service_type: ServiceType) -> Self {
        self.produced_events_supported_services.push(service_type);
        self
    }

    pub fn without_tagging(mut self) -> Self {
        self.supports_tagging = false;
        self
    }

    pub fn requires_binding(mut self) -> Self {
        self.requires_binding = true;
        self
    }

    pub fn supports(&self, phase: Phase) -> bool {
        self.capabilities.supports(phase)
    }

    /// Whether a dependency of this type can be consumed by `consumer`.
    ///
    /// The dependency must produce something, and the consumer must accept all of it.
    pub fn is_consumable_by(&self, consumer: &ServiceInfo) -> bool {
        !self.produced_deploy_output_types.is_empty()
            && self
                .produced_deploy_output_types
                .iter()
                .all(|output| consumer.consumed_deploy_output_types.contains(output))
    }
}

/// The lifecycle implementation for one service type.
///
/// Only phases listed in [`ServiceInfo::capabilities`] are ever called. The default
/// bodies report the phase as unsupported.
#[async_trait]
pub trait ServiceDeployer: Send + Sync {
    /// Metadata describing this deployer.
    fn info(&self) -> ServiceInfo;

    /// Validate the service parameters, returning one message per problem.
    fn check(&self, _service: &ServiceContext, _dependencies: &[&ServiceContext]) -> Vec<String> {
        Vec::new()
    }

    async fn pre_deploy(&self, service: &ServiceContext) -> DeployerResult<PreDeployContext> {
        Err(unsupported(service, Phase::PreDeploy))
    }

    /// Look up the pre-deploy resources of an existing service without creating them.
    async fn get_pre_deploy_context(
        &self,
        service: &ServiceContext,
    ) -> DeployerResult<PreDeployContext> {
        Err(unsupported(service, Phase::GetPreDeployContext))
    }

    /// Allow `dependent` to reach this service.
    async fn bind(
        &self,
        own: &ServiceContext,
        _own_pre_deploy: &PreDeployContext,
        _dependent: &ServiceContext,
        _dependent_pre_deploy: &PreDeployContext,
    ) -> DeployerResult<BindContext> {
        Err(unsupported(own, Phase::Bind))
    }

    async fn deploy(
        &self,
        service: &ServiceContext,
        _pre_deploy: &PreDeployContext,
        _dependencies: &[DeployContext],
    ) -> DeployerResult<DeployContext> {
        Err(unsupported(service, Phase::Deploy))
    }

    async fn consume_events(
        &self,
        own: &ServiceContext,
        _own_deploy: &DeployContext,
        _producer: &ServiceContext,
        _producer_deploy: &DeployContext,
    ) -> DeployerResult<ConsumeEventsContext> {
        Err(unsupported(own, Phase::ConsumeEvents))
    }

    async fn produce_events(
        &self,
        own: &ServiceContext,
        _own_deploy: &DeployContext,
        _consumer_config: &ServiceEventConsumer,
        _consumer: &ServiceContext,
        _consumer_deploy: &DeployContext,
    ) -> DeployerResult<ProduceEventsContext> {
        Err(unsupported(own, Phase::ProduceEvents))
    }

    async fn un_deploy(&self, service: &ServiceContext) -> DeployerResult<UnDeployContext> {
        Err(unsupported(service, Phase::UnDeploy))
    }

    async fn un_bind(
        &self,
        own: &ServiceContext,
        _own_pre_deploy: &PreDeployContext,
        _dependent: &ServiceContext,
        _dependent_pre_deploy: &PreDeployContext,
    ) -> DeployerResult<UnBindContext> {
        Err(unsupported(own, Phase::UnBind))
    }

    async fn un_pre_deploy(&self, service: &ServiceContext) -> DeployerResult<UnPreDeployContext> {
        Err(unsupported(service, Phase::UnPreDeploy))
    }
}

fn unsupported(service: &ServiceContext, phase: Phase) -> DeployerError {
    DeployerError::Unsupported {
        service_type: service.service_type.to_string(),
        phase,
    }
}
