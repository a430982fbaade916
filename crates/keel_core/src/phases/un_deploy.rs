//! Un-deploy phase.

use tracing::info;

use crate::context::EnvironmentContext;
use crate::deploy_order::DeployOrder;
use crate::deployer::Phase;
use crate::error::{CoreError, CoreResult};
use crate::outputs::{UnDeployContext, UnDeployContexts};
use crate::phases::{join_keyed, level_services};
use crate::registry::ServiceRegistry;

/// Tear down every service of a level concurrently.
///
/// Callers walk the levels from the highest down, so dependents are removed before
/// the services they depend on.
pub async fn un_deploy_services_in_level(
    registry: &ServiceRegistry,
    environment: &EnvironmentContext,
    deploy_order: &DeployOrder,
    level: usize,
) -> CoreResult<UnDeployContexts> {
    let services = level_services(environment, deploy_order, level, Phase::UnDeploy)?;
    info!(
        "Executing UnDeploy phase in level {} in environment '{}' for services {}",
        level,
        environment.environment_name,
        services
            .iter()
            .map(|s| s.service_name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let mut calls = Vec::new();
    for service in services {
        let deployer = registry.get_service(&service.service_type)?;
        calls.push(async move {
            let context = if deployer.info().supports(Phase::UnDeploy) {
                info!("UnDeploying service {}", service.service_name);
                deployer
                    .un_deploy(service)
                    .await
                    .map_err(|e| CoreError::phase(Phase::UnDeploy, &service.service_name, e))?
            } else {
                UnDeployContext::new(service)
            };
            Ok::<_, CoreError>((service.service_name.clone(), context))
        });
    }

    join_keyed(calls).await
}
