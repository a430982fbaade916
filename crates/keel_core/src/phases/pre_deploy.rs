//! Pre-deploy phase.
//!
//! Pre-deploy provisions resources that don't depend on deploy order, so it runs for
//! every service of the environment at once.

use tracing::info;

use crate::context::EnvironmentContext;
use crate::deployer::Phase;
use crate::error::{CoreError, CoreResult, DeployerError};
use crate::outputs::{PreDeployContext, PreDeployContexts};
use crate::phases::join_keyed;
use crate::registry::ServiceRegistry;

/// Run pre-deploy for every service of the environment concurrently.
pub async fn pre_deploy_services(
    registry: &ServiceRegistry,
    environment: &EnvironmentContext,
) -> CoreResult<PreDeployContexts> {
    info!(
        "Executing PreDeploy phase in environment '{}'",
        environment.environment_name
    );

    let mut calls = Vec::new();
    for service in environment.service_contexts.values() {
        let deployer = registry.get_service(&service.service_type)?;
        calls.push(async move {
            let context = if deployer.info().supports(Phase::PreDeploy) {
                info!("Executing pre-deploy on service {}", service.service_name);
                deployer
                    .pre_deploy(service)
                    .await
                    .map_err(|e| CoreError::phase(Phase::PreDeploy, &service.service_name, e))?
            } else {
                PreDeployContext::new(service)
            };
            Ok::<_, CoreError>((service.service_name.clone(), context))
        });
    }

    join_keyed(calls).await
}

/// Look up the pre-deploy contexts of already deployed services.
///
/// Used by teardown. A deployer that implements pre-deploy must also implement the
/// lookup; one without pre-deploy gets an empty context.
pub async fn get_pre_deploy_contexts(
    registry: &ServiceRegistry,
    environment: &EnvironmentContext,
) -> CoreResult<PreDeployContexts> {
    let mut calls = Vec::new();
    for service in environment.service_contexts.values() {
        let deployer = registry.get_service(&service.service_type)?;
        calls.push(async move {
            let info = deployer.info();
            let context = if info.supports(Phase::PreDeploy) {
                if !info.supports(Phase::GetPreDeployContext) {
                    return Err(CoreError::phase(
                        Phase::GetPreDeployContext,
                        &service.service_name,
                        DeployerError::Unsupported {
                            service_type: service.service_type.to_string(),
                            phase: Phase::GetPreDeployContext,
                        },
                    ));
                }
                info!(
                    "Executing getPreDeployContext on service {}",
                    service.service_name
                );
                deployer.get_pre_deploy_context(service).await.map_err(|e| {
                    CoreError::phase(Phase::GetPreDeployContext, &service.service_name, e)
                })?
            } else {
                PreDeployContext::new(service)
            };
            Ok::<_, CoreError>((service.service_name.clone(), context))
        });
    }

    join_keyed(calls).await
}
