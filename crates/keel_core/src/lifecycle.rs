//! Lifecycle orchestration: check, deploy and delete whole environments.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use keel_manifest::{AccountConfig, Manifest, Tags};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::context::EnvironmentContext;
use crate::deploy_order::DeployOrder;
use crate::error::{CoreError, CoreResult};
use crate::extension::ExtensionCatalog;
use crate::outputs::{
    BindContexts, ConsumeEventsContexts, DeployContexts, PreDeployContexts,
    ProduceEventsContexts, UnBindContexts, UnDeployContexts, UnPreDeployContexts,
};
use crate::phases;
use crate::registry::ServiceRegistry;
use crate::validation::validate_manifest;

/// Outcome of one environment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentStatus {
    Success,
    Failure,
}

/// Result of deploying or deleting one environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentResult {
    pub environment_name: String,
    pub status: EnvironmentStatus,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl EnvironmentResult {
    fn finish(
        environment_name: &str,
        status: EnvironmentStatus,
        message: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let completed_at = Utc::now();
        Self {
            environment_name: environment_name.to_string(),
            status,
            message: message.into(),
            started_at,
            completed_at,
            duration_ms: (completed_at - started_at).num_milliseconds().max(0) as u64,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == EnvironmentStatus::Success
    }
}

/// Every context produced while deploying an environment.
#[derive(Debug, Clone, Default)]
pub struct DeployRecord {
    pub deploy_order: DeployOrder,
    pub pre_deploy_contexts: PreDeployContexts,
    pub bind_contexts: BindContexts,
    pub deploy_contexts: DeployContexts,
    pub consume_events_contexts: ConsumeEventsContexts,
    pub produce_events_contexts: ProduceEventsContexts,
}

/// Every context produced while deleting an environment.
#[derive(Debug, Clone, Default)]
pub struct DeleteRecord {
    pub deploy_order: DeployOrder,
    pub pre_deploy_contexts: PreDeployContexts,
    pub un_deploy_contexts: UnDeployContexts,
    pub un_bind_contexts: UnBindContexts,
    pub un_pre_deploy_contexts: UnPreDeployContexts,
}

/// Options applied to every environment of a deploy.
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Fixed deploy version; a fresh one is generated when absent
    pub deploy_version: Option<String>,
    /// Application tags overriding those of the manifest
    pub tags: Tags,
}

impl DeployOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deploy_version(mut self, deploy_version: impl Into<String>) -> Self {
        self.deploy_version = Some(deploy_version.into());
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }
}

/// Drives environments through the deploy and delete lifecycles.
pub struct Orchestrator {
    registry: Arc<ServiceRegistry>,
}

impl Orchestrator {
    /// Create a new orchestrator with the given registry.
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }

    /// Load the registry for the extensions a manifest declares.
    pub async fn for_manifest(manifest: &Manifest, catalog: &ExtensionCatalog) -> CoreResult<Self> {
        let definitions = manifest.extension_definitions()?;
        let registry = ServiceRegistry::init(&definitions, catalog).await?;
        Ok(Self::new(Arc::new(registry)))
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Fail with every registry-level problem of the manifest.
    pub fn validate(&self, manifest: &Manifest) -> CoreResult<()> {
        let errors = validate_manifest(manifest, &self.registry);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidManifest(errors))
        }
    }

    /// Check every environment of the manifest without deploying anything.
    ///
    /// Returns all problems found. Registry-level problems are returned alone since
    /// the per-service checks cannot run without resolved deployers.
    pub fn check(
        &self,
        manifest: &Manifest,
        account_config: Arc<AccountConfig>,
    ) -> CoreResult<Vec<String>> {
        let errors = validate_manifest(manifest, &self.registry);
        if !errors.is_empty() {
            return Ok(errors);
        }

        let mut errors = Vec::new();
        for env_name in manifest.environment_names() {
            let environment =
                EnvironmentContext::from_manifest(manifest, env_name, account_config.clone())?;
            errors.extend(phases::check_services(&self.registry, &environment)?);
            if let Err(e) = DeployOrder::for_environment(&environment) {
                errors.push(e.to_string());
            }
        }
        Ok(errors)
    }

    /// Deploy the named environments of a manifest concurrently.
    ///
    /// Fails up front if the manifest is invalid or names an unknown environment.
    /// Failures of individual environments are reported in their results.
    pub async fn deploy(
        &self,
        manifest: &Manifest,
        account_config: Arc<AccountConfig>,
        environment_names: &[String],
        options: &DeployOptions,
    ) -> CoreResult<Vec<EnvironmentResult>> {
        self.validate(manifest)?;
        let manifest = manifest.clone().with_tags(options.tags.clone());

        let mut environments = Vec::new();
        for env_name in environment_names {
            let mut environment =
                EnvironmentContext::from_manifest(&manifest, env_name, account_config.clone())?;
            if let Some(version) = &options.deploy_version {
                environment = environment.with_deploy_version(version);
            }
            environments.push(environment);
        }

        let runs = environments.iter().map(|env| self.deploy_environment(env));
        Ok(join_all(runs).await)
    }

    /// Deploy one environment, capturing the outcome.
    pub async fn deploy_environment(&self, environment: &EnvironmentContext) -> EnvironmentResult {
        let started_at = Utc::now();
        info!(
            "Starting deploy of environment '{}' with version {}",
            environment.environment_name, environment.deploy_version
        );

        match self.run_deploy(environment).await {
            Ok(record) => {
                let result = EnvironmentResult::finish(
                    &environment.environment_name,
                    EnvironmentStatus::Success,
                    format!(
                        "Deployed {} services in {} levels",
                        record.deploy_contexts.len(),
                        record.deploy_order.len()
                    ),
                    started_at,
                );
                info!(
                    "Finished deploying environment '{}' in {} ms",
                    environment.environment_name, result.duration_ms
                );
                result
            }
            Err(e) => {
                error!(
                    "Error while deploying environment '{}': {}",
                    environment.environment_name, e
                );
                EnvironmentResult::finish(
                    &environment.environment_name,
                    EnvironmentStatus::Failure,
                    e.to_string(),
                    started_at,
                )
            }
        }
    }

    /// Run the deploy lifecycle, stopping at the first failing phase.
    ///
    /// Nothing already provisioned is rolled back on failure; deploying again is the
    /// way to recover.
    pub async fn run_deploy(&self, environment: &EnvironmentContext) -> CoreResult<DeployRecord> {
        let errors = phases::check_services(&self.registry, environment)?;
        if !errors.is_empty() {
            return Err(CoreError::CheckFailed(errors));
        }

        let mut record = DeployRecord {
            deploy_order: DeployOrder::for_environment(environment)?,
            ..DeployRecord::default()
        };
        record.pre_deploy_contexts = phases::pre_deploy_services(&self.registry, environment).await?;

        for level in 0..record.deploy_order.len() {
            let bind_contexts = phases::bind_services_in_level(
                &self.registry,
                environment,
                &record.pre_deploy_contexts,
                &record.deploy_order,
                level,
            )
            .await
            .map_err(|e| e.in_level(level))?;
            record.bind_contexts.extend(bind_contexts);

            let deploy_contexts = phases::deploy_services_in_level(
                &self.registry,
                environment,
                &record.pre_deploy_contexts,
                &record.deploy_contexts,
                &record.deploy_order,
                level,
            )
            .await
            .map_err(|e| e.in_level(level))?;
            record.deploy_contexts.extend(deploy_contexts);
        }

        record.consume_events_contexts =
            phases::consume_events(&self.registry, environment, &record.deploy_contexts).await?;
        record.produce_events_contexts =
            phases::produce_events(&self.registry, environment, &record.deploy_contexts).await?;

        Ok(record)
    }

    /// Delete one environment of a manifest.
    pub async fn delete(
        &self,
        manifest: &Manifest,
        account_config: Arc<AccountConfig>,
        environment_name: &str,
    ) -> CoreResult<EnvironmentResult> {
        self.validate(manifest)?;
        let environment =
            EnvironmentContext::from_manifest(manifest, environment_name, account_config)?;
        Ok(self.delete_environment(&environment).await)
    }

    /// Delete one environment, capturing the outcome.
    pub async fn delete_environment(&self, environment: &EnvironmentContext) -> EnvironmentResult {
        let started_at = Utc::now();
        info!("Starting delete of environment '{}'", environment.environment_name);

        match self.run_delete(environment).await {
            Ok(record) => {
                let result = EnvironmentResult::finish(
                    &environment.environment_name,
                    EnvironmentStatus::Success,
                    format!("Deleted {} services", record.un_deploy_contexts.len()),
                    started_at,
                );
                info!(
                    "Finished deleting environment '{}' in {} ms",
                    environment.environment_name, result.duration_ms
                );
                result
            }
            Err(e) => {
                error!(
                    "Error while deleting environment '{}': {}",
                    environment.environment_name, e
                );
                EnvironmentResult::finish(
                    &environment.environment_name,
                    EnvironmentStatus::Failure,
                    e.to_string(),
                    started_at,
                )
            }
        }
    }

    /// Run the delete lifecycle: levels from the highest down, then pre-deploy resources.
    pub async fn run_delete(&self, environment: &EnvironmentContext) -> CoreResult<DeleteRecord> {
        let mut record = DeleteRecord {
            deploy_order: DeployOrder::for_environment(environment)?,
            ..DeleteRecord::default()
        };
        record.pre_deploy_contexts =
            phases::get_pre_deploy_contexts(&self.registry, environment).await?;

        for level in (0..record.deploy_order.len()).rev() {
            let un_deploy_contexts = phases::un_deploy_services_in_level(
                &self.registry,
                environment,
                &record.deploy_order,
                level,
            )
            .await
            .map_err(|e| e.in_level(level))?;
            record.un_deploy_contexts.extend(un_deploy_contexts);

            let un_bind_contexts = phases::un_bind_services_in_level(
                &self.registry,
                environment,
                &record.pre_deploy_contexts,
                &record.deploy_order,
                level,
            )
            .await
            .map_err(|e| e.in_level(level))?;
            record.un_bind_contexts.extend(un_bind_contexts);
        }

        record.un_pre_deploy_contexts =
            phases::un_pre_deploy_services(&self.registry, environment).await?;

        Ok(record)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::deployer::Phase;
    use crate::phases::test_support::{environment, registry};
    use crate::testing::{CallLog, FakeDeployer};

    async fn orchestrator(log: &CallLog) -> Orchestrator {
        let registry = registry(vec![("svc", FakeDeployer::new(log).into_arc())]).await;
        Orchestrator::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_run_deploy_phase_order() {
        let log = CallLog::new();
        let orchestrator = orchestrator(&log).await;
        let env = environment(&[("api", "svc", &["table"]), ("table", "svc", &[])]);

        let record = orchestrator.run_deploy(&env).await.unwrap();
        assert_eq!(record.deploy_order.len(), 2);
        assert_eq!(record.deploy_contexts.len(), 2);
        assert_eq!(record.bind_contexts.keys().collect::<Vec<_>>(), vec!["api->table"]);

        let last_pre_deploy = log
            .calls()
            .iter()
            .rposition(|c| c.phase == Phase::PreDeploy)
            .unwrap();
        assert!(log.position(Phase::Bind, "table").unwrap() > last_pre_deploy);
        assert!(log.position(Phase::Deploy, "table") < log.position(Phase::Bind, "table"));
        assert!(log.position(Phase::Bind, "table") < log.position(Phase::Deploy, "api"));
    }

    #[tokio::test]
    async fn test_check_failure_stops_deploy() {
        let log = CallLog::new();
        let deployer = FakeDeployer::new(&log).check_error("missing param");
        let registry = registry(vec![("svc", deployer.into_arc())]).await;
        let orchestrator = Orchestrator::new(Arc::new(registry));
        let env = environment(&[("api", "svc", &[])]);

        let result = orchestrator.deploy_environment(&env).await;
        assert_eq!(result.status, EnvironmentStatus::Failure);
        assert_eq!(
            result.message,
            "Errors while checking deploy spec:\nService 'api' - missing param"
        );
        assert!(!log.was_called(Phase::PreDeploy, "api"));
    }

    #[tokio::test]
    async fn test_cycle_aborts_before_pre_deploy() {
        let log = CallLog::new();
        let orchestrator = orchestrator(&log).await;
        let env = environment(&[("a", "svc", &["b"]), ("b", "svc", &["a"])]);

        let err = orchestrator.run_deploy(&env).await.unwrap_err();
        assert!(err.to_string().contains("circular dependencies"));
        assert!(log.phase_calls(Phase::PreDeploy).is_empty());
    }

    #[tokio::test]
    async fn test_failed_level_stops_later_levels() {
        let log = CallLog::new();
        let deployer = FakeDeployer::new(&log).fail_on(Phase::Deploy, "table");
        let registry = registry(vec![("svc", deployer.into_arc())]).await;
        let orchestrator = Orchestrator::new(Arc::new(registry));
        let env = environment(&[("api", "svc", &["table"]), ("table", "svc", &[])]);

        let result = orchestrator.deploy_environment(&env).await;
        assert!(!result.is_success());
        assert!(result
            .message
            .starts_with("Level 0 failed: deploy failed for service 'table'"));
        assert!(!log.was_called(Phase::Bind, "table"));
        assert!(!log.was_called(Phase::Deploy, "api"));
    }

    #[tokio::test]
    async fn test_level_failures_name_the_level() {
        let log = CallLog::new();
        let deployer = FakeDeployer::new(&log).fail_on(Phase::Bind, "table");
        let deploying = Orchestrator::new(Arc::new(
            registry(vec![("svc", deployer.into_arc())]).await,
        ));
        let env = environment(&[("api", "svc", &["table"]), ("table", "svc", &[])]);

        let err = deploying.run_deploy(&env).await.unwrap_err();
        assert_eq!(err.level(), Some(1));
        assert!(matches!(
            err,
            CoreError::LevelFailed { ref source, .. }
                if matches!(**source, CoreError::PhaseFailed { phase: Phase::Bind, .. })
        ));

        let log = CallLog::new();
        let deployer = FakeDeployer::new(&log).fail_on(Phase::UnDeploy, "api");
        let deleting = Orchestrator::new(Arc::new(
            registry(vec![("svc", deployer.into_arc())]).await,
        ));

        let result = deleting.delete_environment(&env).await;
        assert!(result
            .message
            .starts_with("Level 1 failed: un-deploy failed for service 'api'"));
        assert!(!log.was_called(Phase::UnDeploy, "table"));
    }

    #[tokio::test]
    async fn test_failures_outside_levels_have_no_level() {
        let log = CallLog::new();
        let deployer = FakeDeployer::new(&log).fail_on(Phase::PreDeploy, "api");
        let registry = registry(vec![("svc", deployer.into_arc())]).await;
        let orchestrator = Orchestrator::new(Arc::new(registry));
        let env = environment(&[("api", "svc", &[])]);

        let err = orchestrator.run_deploy(&env).await.unwrap_err();
        assert_eq!(err.level(), None);
        assert!(!log.was_called(Phase::Deploy, "api"));
    }

    #[tokio::test]
    async fn test_run_delete_reverse_order() {
        let log = CallLog::new();
        let orchestrator = orchestrator(&log).await;
        let env = environment(&[
            ("api", "svc", &["table"]),
            ("table", "svc", &["key"]),
            ("key", "svc", &[]),
        ]);

        let record = orchestrator.run_delete(&env).await.unwrap();
        assert_eq!(record.un_deploy_contexts.len(), 3);
        assert_eq!(
            record.un_bind_contexts.keys().collect::<Vec<_>>(),
            vec!["api->table", "table->key"]
        );
        assert_eq!(log.services_in(Phase::UnDeploy), vec!["api", "table", "key"]);

        let first_un_pre_deploy = log
            .calls()
            .iter()
            .position(|c| c.phase == Phase::UnPreDeploy)
            .unwrap();
        assert!(log.position(Phase::UnDeploy, "key").unwrap() < first_un_pre_deploy);
        assert!(log.position(Phase::UnDeploy, "api") < log.position(Phase::UnBind, "table"));
        assert!(log.position(Phase::UnBind, "table") < log.position(Phase::UnDeploy, "table"));
    }

    #[test]
    fn test_deploy_options() {
        let options = DeployOptions::new()
            .with_deploy_version("v42")
            .with_tags(Tags::from([("team".to_string(), "ops".to_string())]));
        assert_eq!(options.deploy_version.as_deref(), Some("v42"));
        assert_eq!(options.tags.get("team").map(String::as_str), Some("ops"));
    }
}
