//! Manifest validation that needs the service registry.
//!
//! Structural rules live in `keel_manifest`; the checks here need to know which
//! service types are loaded and what each deployer declares.

use std::collections::BTreeSet;

use keel_manifest::{Manifest, ServiceType};
use tracing::debug;

use crate::deployer::{Phase, ServiceInfo};
use crate::registry::ServiceRegistry;

/// Validate the services of every environment against the registry.
///
/// Unsupported service types are reported first. If there are any, the other checks
/// are skipped since they would only repeat the same problem.
pub fn validate_manifest(manifest: &Manifest, registry: &ServiceRegistry) -> Vec<String> {
    let unsupported = unsupported_service_types(manifest, registry);
    if !unsupported.is_empty() {
        return unsupported;
    }

    let mut errors = Vec::new();
    for (env_name, services) in &manifest.environments {
        debug!("Validating environment '{}' against the registry", env_name);

        for (service_name, config) in services {
            let service_type = match config.parsed_type() {
                Ok(t) => t,
                Err(_) => continue,
            };
            let info = match registry.get_service(&service_type) {
                Ok(deployer) => deployer.info(),
                Err(_) => continue,
            };

            let mut seen = BTreeSet::new();
            for dependency_name in &config.dependencies {
                if !seen.insert(dependency_name) {
                    errors.push(format!(
                        "Service '{}': dependency '{}' is declared more than once",
                        service_name, dependency_name
                    ));
                    continue;
                }
                let Some(dependency) = services.get(dependency_name) else {
                    errors.push(format!(
                        "You declared a dependency '{}' in the service '{}' that doesn't exist",
                        dependency_name, service_name
                    ));
                    continue;
                };
                let Some((dependency_type, dependency_info)) =
                    resolve(registry, &dependency.service_type)
                else {
                    continue;
                };

                if !dependency_info.is_consumable_by(&info) {
                    errors.push(format!(
                        "The '{}' service type is not consumable by the '{}' service type",
                        dependency_type, service_type
                    ));
                }
                if dependency_info.requires_binding && !dependency_info.supports(Phase::Bind) {
                    errors.push(format!(
                        "The '{}' service type requires binding but does not implement bind",
                        dependency_type
                    ));
                }
            }

            let mut seen = BTreeSet::new();
            for consumer in &config.event_consumers {
                if !seen.insert(&consumer.service_name) {
                    errors.push(format!(
                        "Service '{}': event consumer '{}' is declared more than once",
                        service_name, consumer.service_name
                    ));
                    continue;
                }
                let Some(consumer_config) = services.get(&consumer.service_name) else {
                    errors.push(format!(
                        "You declared an event consumer '{}' in the service '{}' that doesn't exist",
                        consumer.service_name, service_name
                    ));
                    continue;
                };
                let Some((consumer_type, _)) = resolve(registry, &consumer_config.service_type)
                else {
                    continue;
                };

                if !info.produced_events_supported_services.contains(&consumer_type) {
                    errors.push(format!(
                        "The '{}' service type can't consume events from the '{}' service type",
                        consumer_type, service_type
                    ));
                }
            }
        }
    }

    errors
}

fn unsupported_service_types(manifest: &Manifest, registry: &ServiceRegistry) -> Vec<String> {
    let mut errors = Vec::new();
    for services in manifest.environments.values() {
        for config in services.values() {
            let supported = config
                .parsed_type()
                .map(|t| registry.has_service(&t))
                .unwrap_or(false);
            if !supported {
                errors.push(format!(
                    "Unsupported service type specified '{}'",
                    config.service_type
                ));
            }
        }
    }
    errors
}

fn resolve(
    registry: &ServiceRegistry,
    service_type: &str,
) -> Option<(ServiceType, ServiceInfo)> {
    let parsed: ServiceType = service_type.parse().ok()?;
    let deployer = registry.get_service(&parsed).ok()?;
    Some((parsed, deployer.info()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_manifest::ManifestReader;

    use crate::deployer::DeployOutputType;
    use crate::phases::test_support::registry;
    use crate::testing::{CallLog, FakeDeployer, ALL_PHASES};

    async fn test_registry() -> ServiceRegistry {
        let log = CallLog::new();
        let producer = ServiceInfo::new(ALL_PHASES.into_iter().collect())
            .produces(DeployOutputType::EnvironmentVariables)
            .consumes(DeployOutputType::EnvironmentVariables)
            .produces_events_for(ServiceType::new("fake", "function"));
        let bindless = ServiceInfo::new([Phase::Deploy].into_iter().collect())
            .produces(DeployOutputType::EnvironmentVariables)
            .requires_binding();
        let silent = ServiceInfo::new([Phase::Deploy].into_iter().collect())
            .consumes(DeployOutputType::EnvironmentVariables);

        registry(vec![
            ("function", FakeDeployer::new(&log).into_arc()),
            ("bucket", FakeDeployer::with_info(&log, producer).into_arc()),
            ("bindless", FakeDeployer::with_info(&log, bindless).into_arc()),
            ("silent", FakeDeployer::with_info(&log, silent).into_arc()),
        ])
        .await
    }

    fn manifest(services: &str) -> Manifest {
        let content = format!(
            "version: 1\nname: app\nenvironments:\n  dev:\n{}",
            services
        );
        ManifestReader::parse_str(&content).unwrap()
    }

    #[tokio::test]
    async fn test_valid_manifest() {
        let registry = test_registry().await;
        let manifest = manifest(
            r#"
    fn:
      type: fake::function
      dependencies:
        - files
    files:
      type: fake::bucket
      event_consumers:
        - service_name: fn
"#,
        );

        assert!(validate_manifest(&manifest, &registry).is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_types_reported_first() {
        let registry = test_registry().await;
        let manifest = manifest(
            r#"
    fn:
      type: fake::lambda
      dependencies:
        - missing
    db:
      type: gcp::sql
"#,
        );

        let errors = validate_manifest(&manifest, &registry);
        assert_eq!(
            errors,
            vec![
                "Unsupported service type specified 'gcp::sql'".to_string(),
                "Unsupported service type specified 'fake::lambda'".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_dependency() {
        let registry = test_registry().await;
        let manifest = manifest(
            r#"
    fn:
      type: fake::function
      dependencies:
        - table
"#,
        );

        let errors = validate_manifest(&manifest, &registry);
        assert_eq!(
            errors,
            vec!["You declared a dependency 'table' in the service 'fn' that doesn't exist".to_string()]
        );
    }

    #[tokio::test]
    async fn test_dependency_not_consumable() {
        let registry = test_registry().await;
        let manifest = manifest(
            r#"
    quiet:
      type: fake::silent
      dependencies:
        - fn
    fn:
      type: fake::function
"#,
        );

        let errors = validate_manifest(&manifest, &registry);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0],
            "The 'fake::function' service type is not consumable by the 'fake::silent' service type"
        );
    }

    #[tokio::test]
    async fn test_requires_binding_without_bind() {
        let registry = test_registry().await;
        let manifest = manifest(
            r#"
    fn:
      type: fake::function
      dependencies:
        - cache
    cache:
      type: fake::bindless
"#,
        );

        let errors = validate_manifest(&manifest, &registry);
        assert!(errors.contains(
            &"The 'fake::bindless' service type requires binding but does not implement bind"
                .to_string()
        ));
    }

    #[tokio::test]
    async fn test_repeated_names_in_built_manifest() {
        let registry = test_registry().await;
        let mut manifest = manifest(
            r#"
    fn:
      type: fake::function
    files:
      type: fake::bucket
"#,
        );
        let dev = manifest.environments.get_mut("dev").unwrap();
        let files = dev["files"].clone();
        dev.insert(
            "files".to_string(),
            files.event_consumer("fn").event_consumer("fn"),
        );
        let function = dev["fn"].clone();
        dev.insert(
            "fn".to_string(),
            function.depends_on("files").depends_on("files"),
        );

        let errors = validate_manifest(&manifest, &registry);
        assert_eq!(
            errors,
            vec![
                "Service 'files': event consumer 'fn' is declared more than once".to_string(),
                "Service 'fn': dependency 'files' is declared more than once".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_event_consumers() {
        let registry = test_registry().await;
        let manifest = manifest(
            r#"
    files:
      type: fake::bucket
      event_consumers:
        - service_name: other
        - service_name: archive
    archive:
      type: fake::bucket
"#,
        );

        let errors = validate_manifest(&manifest, &registry);
        assert_eq!(
            errors,
            vec![
                "You declared an event consumer 'other' in the service 'files' that doesn't exist"
                    .to_string(),
                "The 'fake::bucket' service type can't consume events from the 'fake::bucket' service type"
                    .to_string(),
            ]
        );
    }
}
