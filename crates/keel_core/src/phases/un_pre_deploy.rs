//! Un-pre-deploy phase.

use tracing::info;

use crate::context::EnvironmentContext;
use crate::deployer::Phase;
use crate::error::{CoreError, CoreResult};
use crate::outputs::{UnPreDeployContext, UnPreDeployContexts};
use crate::phases::join_keyed;
use crate::registry::ServiceRegistry;

/// Remove the pre-deploy resources of every service concurrently.
///
/// Runs last during teardown, once nothing references those resources anymore.
pub async fn un_pre_deploy_services(
    registry: &ServiceRegistry,
    environment: &EnvironmentContext,
) -> CoreResult<UnPreDeployContexts> {
    info!(
        "Executing UnPreDeploy phase in environment '{}'",
        environment.environment_name
    );

    let mut calls = Vec::new();
    for service in environment.service_contexts.values() {
        let deployer = registry.get_service(&service.service_type)?;
        calls.push(async move {
            let context = if deployer.info().supports(Phase::UnPreDeploy) {
                info!("Executing UnPreDeploy on service {}", service.service_name);
                deployer.un_pre_deploy(service).await.map_err(|e| {
                    CoreError::phase(Phase::UnPreDeploy, &service.service_name, e)
                })?
            } else {
                UnPreDeployContext::new(service)
            };
            Ok::<_, CoreError>((service.service_name.clone(), context))
        });
    }

    join_keyed(calls).await
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::phases::test_support::{environment, registry};
    use crate::testing::{CallLog, FakeDeployer};

    #[tokio::test]
    async fn test_un_pre_deploy_all_services() {
        let log = CallLog::new();
        let registry = registry(vec![
            ("svc", FakeDeployer::new(&log).into_arc()),
            ("plain", FakeDeployer::with_phases(&log, &[Phase::Deploy]).into_arc()),
        ])
        .await;
        let env = environment(&[
            ("api", "svc", &["table"]),
            ("table", "svc", &[]),
            ("access", "plain", &[]),
        ]);

        let contexts = un_pre_deploy_services(&registry, &env).await.unwrap();
        assert_eq!(contexts.len(), 3);

        let mut called = log.services_in(Phase::UnPreDeploy);
        called.sort();
        assert_eq!(called, vec!["api", "table"]);
    }

    #[tokio::test]
    async fn test_un_pre_deploy_failure() {
        let log = CallLog::new();
        let deployer = FakeDeployer::new(&log).fail_on(Phase::UnPreDeploy, "api");
        let registry = registry(vec![("svc", deployer.into_arc())]).await;
        let env = environment(&[("api", "svc", &[]), ("table", "svc", &[])]);

        let err = un_pre_deploy_services(&registry, &env).await.unwrap_err();
        assert!(err.to_string().contains("un-pre-deploy failed for service 'api'"));
        assert!(log.was_called(Phase::UnPreDeploy, "table"));
    }
}
