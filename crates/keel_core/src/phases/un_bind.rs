//! Un-bind phase.

use tracing::{debug, info};

use crate::context::EnvironmentContext;
use crate::deploy_order::DeployOrder;
use crate::deployer::Phase;
use crate::error::{CoreError, CoreResult};
use crate::outputs::{bind_context_name, PreDeployContexts, UnBindContext, UnBindContexts};
use crate::phases::{join_keyed, level_services, require, service};
use crate::registry::ServiceRegistry;

/// Remove the bindings between every service of a level and its dependencies.
///
/// Mirrors the bind phase: the dependency's deployer revokes access it granted to
/// the dependent.
pub async fn un_bind_services_in_level(
    registry: &ServiceRegistry,
    environment: &EnvironmentContext,
    pre_deploy_contexts: &PreDeployContexts,
    deploy_order: &DeployOrder,
    level: usize,
) -> CoreResult<UnBindContexts> {
    let services = level_services(environment, deploy_order, level, Phase::UnBind)?;
    info!(
        "Executing UnBind phase in level {} in environment '{}' for services {}",
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
            Phase::UnBind,
            "pre-deploy context",
        )?;

        for dependency_name in dependent.dependencies() {
            let dependency = service(environment, dependency_name, Phase::UnBind)?;
            let dependency_pre_deploy = require(
                pre_deploy_contexts,
                dependency_name,
                Phase::UnBind,
                "pre-deploy context",
            )?;
            let deployer = registry.get_service(&dependency.service_type)?;

            calls.push(async move {
                let name = bind_context_name(&dependent.service_name, &dependency.service_name);
                let context = if deployer.info().supports(Phase::UnBind) {
                    debug!(
                        "UnBinding service {} from dependent {}",
                        dependency.service_name, dependent.service_name
                    );
                    deployer
                        .un_bind(dependency, dependency_pre_deploy, dependent, dependent_pre_deploy)
                        .await
                        .map_err(|e| CoreError::phase(Phase::UnBind, &dependency.service_name, e))?
                } else {
                    UnBindContext::new(dependency)
                };
                Ok::<_, CoreError>((name, context))
            });
        }
    }

    join_keyed(calls).await
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::phases::pre_deploy::get_pre_deploy_contexts;
    use crate::phases::test_support::{environment, registry};
    use crate::testing::{CallLog, FakeDeployer};

    #[tokio::test]
    async fn test_un_bind_pairs_in_level() {
        let log = CallLog::new();
        let registry = registry(vec![("svc", FakeDeployer::new(&log).into_arc())]).await;
        let env = environment(&[
            ("api", "svc", &["table", "queue"]),
            ("queue", "svc", &[]),
            ("table", "svc", &[]),
        ]);
        let order = DeployOrder::for_environment(&env).unwrap();
        let pre_deploy = get_pre_deploy_contexts(&registry, &env).await.unwrap();

        let contexts = un_bind_services_in_level(&registry, &env, &pre_deploy, &order, 1)
            .await
            .unwrap();
        assert_eq!(
            contexts.keys().collect::<Vec<_>>(),
            vec!["api->queue", "api->table"]
        );
        assert_eq!(contexts["api->queue"].service_name, "queue");

        let mut unbound = log.services_in(Phase::UnBind);
        unbound.sort();
        assert_eq!(unbound, vec!["queue", "table"]);
        assert!(log
            .phase_calls(Phase::UnBind)
            .iter()
            .all(|c| c.other.as_deref() == Some("api")));

        let level_zero = un_bind_services_in_level(&registry, &env, &pre_deploy, &order, 0)
            .await
            .unwrap();
        assert!(level_zero.is_empty());
    }

    #[tokio::test]
    async fn test_un_bind_not_implemented_yields_empty_context() {
        let log = CallLog::new();
        let registry = registry(vec![
            ("svc", FakeDeployer::new(&log).into_arc()),
            ("plain", FakeDeployer::with_phases(&log, &[Phase::Deploy]).into_arc()),
        ])
        .await;
        let env = environment(&[("api", "svc", &["access"]), ("access", "plain", &[])]);
        let order = DeployOrder::for_environment(&env).unwrap();
        let pre_deploy = get_pre_deploy_contexts(&registry, &env).await.unwrap();

        let contexts = un_bind_services_in_level(&registry, &env, &pre_deploy, &order, 1)
            .await
            .unwrap();
        assert_eq!(contexts["api->access"].service_name, "access");
        assert!(log.phase_calls(Phase::UnBind).is_empty());
    }
}
