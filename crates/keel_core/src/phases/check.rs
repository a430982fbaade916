//! Check phase.

use tracing::{debug, info};

use crate::context::{EnvironmentContext, ServiceContext};
use crate::deployer::{Phase, ServiceInfo};
use crate::error::CoreResult;
use crate::registry::ServiceRegistry;

/// Validate every service of the environment.
///
/// Returns all problems found, each prefixed with the service name. An empty list
/// means the environment may be deployed.
pub fn check_services(
    registry: &ServiceRegistry,
    environment: &EnvironmentContext,
) -> CoreResult<Vec<String>> {
    info!(
        "Executing Check phase in environment '{}'",
        environment.environment_name
    );

    let required_tags = &environment.account_config.required_tags;
    let mut errors = Vec::new();

    for service in environment.service_contexts.values() {
        let deployer = registry.get_service(&service.service_type)?;
        let info = deployer.info();

        let mut service_errors = Vec::new();
        if info.supports(Phase::Check) {
            let dependencies: Vec<&ServiceContext> = service
                .dependencies()
                .iter()
                .filter_map(|name| environment.service(name))
                .collect();
            debug!("Checking service {}", service.service_name);
            service_errors.extend(deployer.check(service, &dependencies));
        }
        service_errors.extend(check_required_tags(&info, service, required_tags));

        errors.extend(
            service_errors
                .into_iter()
                .map(|e| format!("Service '{}' - {}", service.service_name, e)),
        );
    }

    Ok(errors)
}

fn check_required_tags(
    info: &ServiceInfo,
    service: &ServiceContext,
    required_tags: &[String],
) -> Vec<String> {
    if !info.supports_tagging {
        return Vec::new();
    }

    let tags = service.effective_tags();
    required_tags
        .iter()
        .filter(|tag| !tags.contains_key(tag.as_str()))
        .map(|tag| {
            format!(
                "Tagging - {} - Missing required tag '{}'. You can apply this tag at either the application or service level.",
                service.service_name, tag
            )
        })
        .collect()
}
