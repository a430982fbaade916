//! Deploy phase.

use tracing::info;

use crate::context::EnvironmentContext;
use crate::deploy_order::DeployOrder;
use crate::deployer::Phase;
use crate::error::{CoreError, CoreResult};
use crate::outputs::{DeployContext, DeployContexts, PreDeployContexts};
use crate::phases::{join_keyed, level_services, require};
use crate::registry::ServiceRegistry;

/// Deploy every service of a level concurrently.
///
/// `deploy_contexts` holds the results of all lower levels; each service receives the
/// contexts of its own dependencies.
pub async fn deploy_services_in_level(
    registry: &ServiceRegistry,
    environment: &EnvironmentContext,
    pre_deploy_contexts: &PreDeployContexts,
    deploy_contexts: &DeployContexts,
    deploy_order: &DeployOrder,
    level: usize,
) -> CoreResult<DeployContexts> {
    let services = level_services(environment, deploy_order, level, Phase::Deploy)?;
    info!(
        "Executing Deploy phase in level {} in environment '{}' for services {}",
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
        let pre_deploy = require(
            pre_deploy_contexts,
            &service.service_name,
            Phase::Deploy,
            "pre-deploy context",
        )?;
        let dependencies = service
            .dependencies()
            .iter()
            .map(|name| {
                require(deploy_contexts, name, Phase::Deploy, "dependency deploy context")
                    .cloned()
            })
            .collect::<CoreResult<Vec<DeployContext>>>()?;

        calls.push(async move {
            let context = if deployer.info().supports(Phase::Deploy) {
                info!("Deploying service {}", service.service_name);
                deployer
                    .deploy(service, pre_deploy, &dependencies)
                    .await
                    .map_err(|e| CoreError::phase(Phase::Deploy, &service.service_name, e))?
            } else {
                DeployContext::new(service)
            };
            Ok::<_, CoreError>((service.service_name.clone(), context))
        });
    }

    join_keyed(calls).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::phases::pre_deploy::pre_deploy_services;
    use crate::phases::test_support::{environment, registry};
    use crate::testing::{CallLog, FakeDeployer};

    #[tokio::test]
    async fn test_deploy_levels_in_order() {
        let log = CallLog::new();
        let registry = registry(vec![("svc", FakeDeployer::new(&log).into_arc())]).await;
        let env = environment(&[
            ("api", "svc", &["table", "queue"]),
            ("queue", "svc", &[]),
            ("table", "svc", &[]),
        ]);
        let order = DeployOrder::for_environment(&env).unwrap();
        let pre_deploy = pre_deploy_services(&registry, &env).await.unwrap();

        let mut deployed = DeployContexts::new();
        for level in 0..order.len() {
            let results =
                deploy_services_in_level(&registry, &env, &pre_deploy, &deployed, &order, level)
                    .await
                    .unwrap();
            deployed.extend(results);
        }

        assert_eq!(deployed.len(), 3);
        assert_eq!(
            deployed["table"].environment_variables.get("TABLE_URL").map(String::as_str),
            Some("fake://table")
        );

        let api_call = log
            .phase_calls(Phase::Deploy)
            .into_iter()
            .find(|c| c.service == "api")
            .unwrap();
        assert_eq!(api_call.other.as_deref(), Some("table,queue"));
        assert!(log.position(Phase::Deploy, "api") > log.position(Phase::Deploy, "table"));
        assert!(log.position(Phase::Deploy, "api") > log.position(Phase::Deploy, "queue"));
    }

    #[tokio::test]
    async fn test_deploy_requires_lower_levels() {
        let log = CallLog::new();
        let registry = registry(vec![("svc", FakeDeployer::new(&log).into_arc())]).await;
        let env = environment(&[("api", "svc", &["table"]), ("table", "svc", &[])]);
        let order = DeployOrder::for_environment(&env).unwrap();
        let pre_deploy = pre_deploy_services(&registry, &env).await.unwrap();

        let err = deploy_services_in_level(
            &registry,
            &env,
            &pre_deploy,
            &DeployContexts::new(),
            &order,
            1,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CoreError::PhaseFailed { phase: Phase::Deploy, .. }));
        assert!(!log.was_called(Phase::Deploy, "api"));
    }

    #[tokio::test]
    async fn test_deploy_failure_reports_service() {
        let log = CallLog::new();
        let deployer = FakeDeployer::new(&log).fail_on(Phase::Deploy, "queue");
        let registry = registry(vec![("svc", deployer.into_arc())]).await;
        let env = environment(&[("queue", "svc", &[]), ("table", "svc", &[])]);
        let order = DeployOrder::for_environment(&env).unwrap();
        let pre_deploy = pre_deploy_services(&registry, &env).await.unwrap();

        let err = deploy_services_in_level(
            &registry,
            &env,
            &pre_deploy,
            &DeployContexts::new(),
            &order,
            0,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("queue"));
        assert!(log.was_called(Phase::Deploy, "table"));
    }

    #[tokio::test]
    async fn test_deploy_level_runs_concurrently() {
        let log = CallLog::new();
        let deployer = FakeDeployer::new(&log).rendezvous(Phase::Deploy, 2);
        let registry = registry(vec![("svc", deployer.into_arc())]).await;
        let env = environment(&[
            ("api", "svc", &["table", "queue"]),
            ("queue", "svc", &[]),
            ("table", "svc", &[]),
        ]);
        let order = DeployOrder::for_environment(&env).unwrap();
        let pre_deploy = pre_deploy_services(&registry, &env).await.unwrap();

        let deployed = tokio::time::timeout(
            Duration::from_secs(5),
            deploy_services_in_level(
                &registry,
                &env,
                &pre_deploy,
                &DeployContexts::new(),
                &order,
                0,
            ),
        )
        .await
        .expect("deploy calls in one level did not overlap")
        .unwrap();
        assert_eq!(deployed.keys().collect::<Vec<_>>(), vec!["queue", "table"]);
    }
}
