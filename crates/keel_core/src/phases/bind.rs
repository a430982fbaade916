//! Bind phase.

use tracing::{debug, info};

use crate::context::EnvironmentContext;
use crate::deploy_order::DeployOrder;
use crate::deployer::Phase;
use crate::error::{CoreError, CoreResult};
use crate::outputs::{bind_context_name, BindContext, BindContexts, PreDeployContexts};
use crate::phases::{join_keyed, level_services, require, service};
use crate::registry::ServiceRegistry;

/// Bind every service of a level to each of its dependencies.
///
/// The dependency's deployer performs the bind, since it owns the resource being
/// opened up. Dependencies whose deployer has no bind phase get an empty context.
pub async fn bind_services_in_level(
    registry: &ServiceRegistry,
    environment: &EnvironmentContext,
    pre_deploy_contexts: &PreDeployContexts,
    deploy_order: &DeployOrder,
    level: usize,
) -> CoreResult<BindContexts> {
    let services = level_services(environment, deploy_order, level, Phase::Bind)?;
    info!(
        "Executing Bind phase in level {} in environment '{}' for services {}",
        level,
        environment.environment_name,
        services
            .iter()
            .map(|s| s.service_name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let mut calls = Vec::new();
    for dependent in services {
        let dependent_pre_deploy = require(
            pre_deploy_contexts,
            &dependent.service_name,
            Phase::Bind,
            "pre-deploy context",
        )?;

        for dependency_name in dependent.dependencies() {
            let dependency = service(environment, dependency_name, Phase::Bind)?;
            let dependency_pre_deploy = require(
                pre_deploy_contexts,
                dependency_name,
                Phase::Bind,
                "pre-deploy context",
            )?;
            let deployer = registry.get_service(&dependency.service_type)?;

            calls.push(async move {
                let name = bind_context_name(&dependent.service_name, &dependency.service_name);
                let context = if deployer.info().supports(Phase::Bind) {
                    debug!(
                        "Binding service {} to dependent {}",
                        dependency.service_name, dependent.service_name
                    );
                    deployer
                        .bind(dependency, dependency_pre_deploy, dependent, dependent_pre_deploy)
                        .await
                        .map_err(|e| CoreError::phase(Phase::Bind, &dependency.service_name, e))?
                } else {
                    BindContext::new(dependency, dependent)
                };
                Ok::<_, CoreError>((name, context))
            });
        }
    }

    join_keyed(calls).await
}
