//! Fake deployers and extensions for testing.
//!
//! [`FakeDeployer`] records every phase call into a shared [`CallLog`] and returns
//! canned contexts, so orchestration can be verified without any cloud access.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use keel_manifest::ServiceEventConsumer;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Barrier;

use crate::context::ServiceContext;
use crate::deployer::{Capabilities, DeployOutputType, Phase, ServiceDeployer, ServiceInfo};
use crate::error::{DeployerError, DeployerResult};
use crate::extension::{Extension, ExtensionContext, ExtensionLoadError};
use crate::outputs::{
    BindContext, ConsumeEventsContext, DeployContext, PreDeployContext, ProduceEventsContext,
    SecurityGroupRef, UnBindContext, UnDeployContext, UnPreDeployContext,
};

/// Every phase a deployer can implement.
pub const ALL_PHASES: [Phase; 10] = [
    Phase::Check,
    Phase::PreDeploy,
    Phase::GetPreDeployContext,
    Phase::Bind,
    Phase::Deploy,
    Phase::ConsumeEvents,
    Phase::ProduceEvents,
    Phase::UnDeploy,
    Phase::UnBind,
    Phase::UnPreDeploy,
];

/// A captured deployer call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub phase: Phase,
    pub service: String,
    /// The other service of a paired call (bind, events), or the dependencies of a deploy
    pub other: Option<String>,
}

/// Ordered log of deployer calls, shareable between deployers.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, phase: Phase, service: &str, other: Option<String>) {
        self.calls.lock().push(RecordedCall {
            phase,
            service: service.to_string(),
            other,
        });
    }

    /// Get all captured calls.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Services called in `phase`, in call order.
    pub fn services_in(&self, phase: Phase) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.phase == phase)
            .map(|c| c.service.clone())
            .collect()
    }

    /// Calls made in `phase`, in call order.
    pub fn phase_calls(&self, phase: Phase) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.phase == phase)
            .cloned()
            .collect()
    }

    /// Index of the first call to `phase` for `service`.
    pub fn position(&self, phase: Phase, service: &str) -> Option<usize> {
        self.calls
            .lock()
            .iter()
            .position(|c| c.phase == phase && c.service == service)
    }

    pub fn was_called(&self, phase: Phase, service: &str) -> bool {
        self.position(phase, service).is_some()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}

/// Recording deployer with configurable capabilities and failures.
#[derive(Clone)]
pub struct FakeDeployer {
    info: ServiceInfo,
    log: CallLog,
    failures: Arc<RwLock<BTreeSet<(Phase, String)>>>,
    check_errors: Arc<RwLock<Vec<String>>>,
    delays: Arc<RwLock<BTreeMap<String, Duration>>>,
    barriers: Arc<RwLock<BTreeMap<Phase, Arc<Barrier>>>>,
}

impl FakeDeployer {
    /// A deployer implementing every phase, producing and consuming
    /// environment variables and policies.
    pub fn new(log: &CallLog) -> Self {
        let info = ServiceInfo::new(ALL_PHASES.into_iter().collect())
            .produces(DeployOutputType::EnvironmentVariables)
            .produces(DeployOutputType::Policies)
            .consumes(DeployOutputType::EnvironmentVariables)
            .consumes(DeployOutputType::Policies);
        Self::with_info(log, info)
    }

    /// A deployer implementing only `phases`.
    pub fn with_phases(log: &CallLog, phases: &[Phase]) -> Self {
        let mut deployer = Self::new(log);
        deployer.info.capabilities = phases.iter().copied().collect::<Capabilities>();
        deployer
    }

    pub fn with_info(log: &CallLog, info: ServiceInfo) -> Self {
        Self {
            info,
            log: log.clone(),
            failures: Arc::new(RwLock::new(BTreeSet::new())),
            check_errors: Arc::new(RwLock::new(Vec::new())),
            delays: Arc::new(RwLock::new(BTreeMap::new())),
            barriers: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Make `phase` fail for `service`.
    pub fn fail_on(self, phase: Phase, service: impl Into<String>) -> Self {
        self.failures.write().insert((phase, service.into()));
        self
    }

    /// Report `message` from every check call.
    pub fn check_error(self, message: impl Into<String>) -> Self {
        self.check_errors.write().push(message.into());
        self
    }

    /// Delay every async call for `service`.
    pub fn delay_for(self, service: impl Into<String>, delay: Duration) -> Self {
        self.delays.write().insert(service.into(), delay);
        self
    }

    /// Hold every `phase` call until `parties` of them are in flight at once.
    ///
    /// A runner that awaits these calls one at a time never releases the first one,
    /// so tests should bound the run with `tokio::time::timeout`.
    pub fn rendezvous(self, phase: Phase, parties: usize) -> Self {
        self.barriers
            .write()
            .insert(phase, Arc::new(Barrier::new(parties)));
        self
    }

    pub fn into_arc(self) -> Arc<dyn ServiceDeployer> {
        Arc::new(self)
    }

    async fn call(&self, phase: Phase, service: &str, other: Option<String>) -> DeployerResult<()> {
        let delay = self.delays.read().get(service).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let barrier = self.barriers.read().get(&phase).cloned();
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }

        self.log.record(phase, service, other);
        if self.failures.read().contains(&(phase, service.to_string())) {
            return Err(DeployerError::failed(
                service,
                format!("simulated {} failure", phase),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceDeployer for FakeDeployer {
    fn info(&self) -> ServiceInfo {
        self.info.clone()
    }

    fn check(&self, service: &ServiceContext, dependencies: &[&ServiceContext]) -> Vec<String> {
        let names: Vec<_> = dependencies.iter().map(|d| d.service_name.as_str()).collect();
        self.log
            .record(Phase::Check, &service.service_name, Some(names.join(",")));
        self.check_errors.read().clone()
    }

    async fn pre_deploy(&self, service: &ServiceContext) -> DeployerResult<PreDeployContext> {
        self.call(Phase::PreDeploy, &service.service_name, None).await?;
        Ok(PreDeployContext::new(service).with_security_group(SecurityGroupRef::new(format!(
            "sg-{}",
            service.service_name
        ))))
    }

    async fn get_pre_deploy_context(
        &self,
        service: &ServiceContext,
    ) -> DeployerResult<PreDeployContext> {
        self.call(Phase::GetPreDeployContext, &service.service_name, None)
            .await?;
        Ok(PreDeployContext::new(service).with_security_group(SecurityGroupRef::new(format!(
            "sg-{}",
            service.service_name
        ))))
    }

    async fn bind(
        &self,
        own: &ServiceContext,
        _own_pre_deploy: &PreDeployContext,
        dependent: &ServiceContext,
        _dependent_pre_deploy: &PreDeployContext,
    ) -> DeployerResult<BindContext> {
        self.call(Phase::Bind, &own.service_name, Some(dependent.service_name.clone()))
            .await?;
        Ok(BindContext::new(own, dependent))
    }

    async fn deploy(
        &self,
        service: &ServiceContext,
        _pre_deploy: &PreDeployContext,
        dependencies: &[DeployContext],
    ) -> DeployerResult<DeployContext> {
        let names: Vec<_> = dependencies.iter().map(|d| d.service_name.as_str()).collect();
        self.call(Phase::Deploy, &service.service_name, Some(names.join(",")))
            .await?;

        let mut context = DeployContext::new(service);
        context.add_environment_variable("URL", format!("fake://{}", service.service_name));
        Ok(context)
    }

    async fn consume_events(
        &self,
        own: &ServiceContext,
        _own_deploy: &DeployContext,
        producer: &ServiceContext,
        _producer_deploy: &DeployContext,
    ) -> DeployerResult<ConsumeEventsContext> {
        self.call(
            Phase::ConsumeEvents,
            &own.service_name,
            Some(producer.service_name.clone()),
        )
        .await?;
        Ok(ConsumeEventsContext::new(own, producer))
    }

    async fn produce_events(
        &self,
        own: &ServiceContext,
        _own_deploy: &DeployContext,
        _consumer_config: &ServiceEventConsumer,
        consumer: &ServiceContext,
        _consumer_deploy: &DeployContext,
    ) -> DeployerResult<ProduceEventsContext> {
        self.call(
            Phase::ProduceEvents,
            &own.service_name,
            Some(consumer.service_name.clone()),
        )
        .await?;
        Ok(ProduceEventsContext::new(own, consumer))
    }

    async fn un_deploy(&self, service: &ServiceContext) -> DeployerResult<UnDeployContext> {
        self.call(Phase::UnDeploy, &service.service_name, None).await?;
        Ok(UnDeployContext::new(service))
    }

    async fn un_bind(
        &self,
        own: &ServiceContext,
        _own_pre_deploy: &PreDeployContext,
        dependent: &ServiceContext,
        _dependent_pre_deploy: &PreDeployContext,
    ) -> DeployerResult<UnBindContext> {
        self.call(Phase::UnBind, &own.service_name, Some(dependent.service_name.clone()))
            .await?;
        Ok(UnBindContext::new(own))
    }

    async fn un_pre_deploy(&self, service: &ServiceContext) -> DeployerResult<UnPreDeployContext> {
        self.call(Phase::UnPreDeploy, &service.service_name, None)
            .await?;
        Ok(UnPreDeployContext::new(service))
    }
}

/// Extension registering a fixed set of deployers.
#[derive(Clone, Default)]
pub struct FakeExtension {
    services: Vec<(String, Arc<dyn ServiceDeployer>)>,
    failure: Option<String>,
}

impl FakeExtension {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn service(mut self, name: impl Into<String>, deployer: Arc<dyn ServiceDeployer>) -> Self {
        self.services.push((name.into(), deployer));
        self
    }

    /// Make loading fail with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn into_arc(self) -> Arc<dyn Extension> {
        Arc::new(self)
    }
}

#[async_trait]
impl Extension for FakeExtension {
    async fn load(&self, context: &mut ExtensionContext) -> Result<(), ExtensionLoadError> {
        if let Some(message) = &self.failure {
            return Err(message.clone().into());
        }
        for (name, deployer) in &self.services {
            context.service(name.clone(), deployer.clone());
        }
        Ok(())
    }
}
