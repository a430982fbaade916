//! Integration tests for the deploy and delete lifecycles.

use std::fs;
use std::sync::Arc;

use tempfile::tempdir;

use keel_core::testing::{CallLog, FakeDeployer, FakeExtension, ALL_PHASES};
use keel_core::{
    CoreError, DeployOptions, DeployOutputType, EnvironmentStatus, ExtensionCatalog,
    Orchestrator, Phase, RegistryError, ServiceInfo,
};
use keel_manifest::{AccountConfig, AccountConfigLoader, Manifest, ManifestReader, ServiceType};

const MANIFEST: &str = r#"
version: 1
name: shop
tags:
  team: retail
extensions:
  fake: fake-extension
environments:
  dev:
    web:
      type: fake::function
      dependencies:
        - table
        - access
    table:
      type: fake::function
    access:
      type: apiaccess
      aws_services:
        - s3
    files:
      type: fake::bucket
      event_consumers:
        - service_name: web
  prod:
    web:
      type: fake::function
"#;

const ACCOUNT: &str = r#"
account_id: 123456789012
region: us-west-2
vpc: vpc-aaaa
public_subnets:
  - subnet-a
private_subnets:
  - subnet-b
data_subnets:
  - subnet-c
"#;

fn catalog(log: &CallLog) -> ExtensionCatalog {
    let bucket = ServiceInfo::new(ALL_PHASES.into_iter().collect())
        .produces(DeployOutputType::EnvironmentVariables)
        .consumes(DeployOutputType::EnvironmentVariables)
        .produces_events_for(ServiceType::new("fake", "function"));

    let extension = FakeExtension::new()
        .service("function", FakeDeployer::new(log).into_arc())
        .service("bucket", FakeDeployer::with_info(log, bucket).into_arc());
    ExtensionCatalog::new().with("fake-extension", extension.into_arc())
}

fn account() -> Arc<AccountConfig> {
    Arc::new(AccountConfigLoader::from_yaml_str(ACCOUNT).unwrap())
}

fn manifest() -> Manifest {
    ManifestReader::parse_str(MANIFEST).unwrap()
}

/// Deploy an environment read from disk, end to end.
#[tokio::test]
async fn test_deploy_from_files() {
    let temp = tempdir().unwrap();
    let manifest_path = temp.path().join("keel.yml");
    let account_path = temp.path().join("account.yml");
    fs::write(&manifest_path, MANIFEST).unwrap();
    fs::write(&account_path, ACCOUNT).unwrap();

    let manifest = ManifestReader::read_file(&manifest_path).unwrap();
    let account = Arc::new(AccountConfigLoader::load(account_path.to_str().unwrap()).unwrap());

    let log = CallLog::new();
    let orchestrator = Orchestrator::for_manifest(&manifest, &catalog(&log))
        .await
        .unwrap();

    let results = orchestrator
        .deploy(
            &manifest,
            account,
            &["dev".to_string()],
            &DeployOptions::new().with_deploy_version("v1"),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].environment_name, "dev");
    assert_eq!(results[0].status, EnvironmentStatus::Success, "{}", results[0].message);

    // Dependencies deploy before their dependents and receive their contexts
    let web = log
        .phase_calls(Phase::Deploy)
        .into_iter()
        .find(|c| c.service == "web")
        .unwrap();
    assert_eq!(web.other.as_deref(), Some("table,access"));
    assert!(log.position(Phase::Deploy, "table") < log.position(Phase::Deploy, "web"));
    assert!(log.position(Phase::Bind, "table") < log.position(Phase::Deploy, "web"));

    // Events are wired after every deploy, consumers first
    let last_deploy = log
        .calls()
        .iter()
        .rposition(|c| c.phase == Phase::Deploy)
        .unwrap();
    assert!(log.position(Phase::ConsumeEvents, "web").unwrap() > last_deploy);
    assert!(log.position(Phase::ConsumeEvents, "web") < log.position(Phase::ProduceEvents, "files"));
}

/// Several environments deploy independently.
#[tokio::test]
async fn test_deploy_multiple_environments() {
    let log = CallLog::new();
    let manifest = manifest();
    let orchestrator = Orchestrator::for_manifest(&manifest, &catalog(&log))
        .await
        .unwrap();

    let results = orchestrator
        .deploy(
            &manifest,
            account(),
            &["dev".to_string(), "prod".to_string()],
            &DeployOptions::new(),
        )
        .await
        .unwrap();

    let names: Vec<_> = results.iter().map(|r| r.environment_name.as_str()).collect();
    assert_eq!(names, vec!["dev", "prod"]);
    assert!(results.iter().all(|r| r.is_success()));
}

/// Unknown environments are rejected before anything runs.
#[tokio::test]
async fn test_deploy_unknown_environment() {
    let log = CallLog::new();
    let manifest = manifest();
    let orchestrator = Orchestrator::for_manifest(&manifest, &catalog(&log))
        .await
        .unwrap();

    let result = orchestrator
        .deploy(&manifest, account(), &["qa".to_string()], &DeployOptions::new())
        .await;
    assert!(matches!(result, Err(CoreError::Manifest(_))));
    assert!(log.is_empty());
}

/// Required tags missing everywhere fail the check phase.
#[tokio::test]
async fn test_check_failure_reported() {
    let log = CallLog::new();
    let manifest = manifest();
    let orchestrator = Orchestrator::for_manifest(&manifest, &catalog(&log))
        .await
        .unwrap();
    let account = Arc::new(AccountConfig {
        required_tags: vec!["cost-center".to_string()],
        ..(*account()).clone()
    });

    let errors = orchestrator.check(&manifest, account.clone()).unwrap();
    assert!(errors
        .iter()
        .any(|e| e.starts_with("Service 'web' - Tagging - web - Missing required tag 'cost-center'")));
    assert!(!errors.iter().any(|e| e.starts_with("Service 'access'")));

    let results = orchestrator
        .deploy(&manifest, account, &["dev".to_string()], &DeployOptions::new())
        .await
        .unwrap();
    assert_eq!(results[0].status, EnvironmentStatus::Failure);
    assert!(results[0]
        .message
        .starts_with("Errors while checking deploy spec:\n"));
    assert!(log.phase_calls(Phase::PreDeploy).is_empty());
}

/// Command line tags override the manifest and satisfy required tags.
#[tokio::test]
async fn test_deploy_tags_override() {
    let log = CallLog::new();
    let manifest = manifest();
    let orchestrator = Orchestrator::for_manifest(&manifest, &catalog(&log))
        .await
        .unwrap();
    let account = Arc::new(AccountConfig {
        required_tags: vec!["cost-center".to_string()],
        ..(*account()).clone()
    });
    let options = DeployOptions::new()
        .with_tags(keel_manifest::parse_tag_args("cost-center=42").unwrap());

    let results = orchestrator
        .deploy(&manifest, account, &["dev".to_string()], &options)
        .await
        .unwrap();
    assert!(results[0].is_success(), "{}", results[0].message);
}

/// A dependency cycle fails the environment with a recognizable message.
#[tokio::test]
async fn test_circular_dependencies() {
    let log = CallLog::new();
    let manifest = ManifestReader::parse_str(
        r#"
version: 1
name: loop
extensions:
  fake: fake-extension
environments:
  dev:
    a:
      type: fake::function
      dependencies:
        - b
    b:
      type: fake::function
      dependencies:
        - a
"#,
    )
    .unwrap();
    let orchestrator = Orchestrator::for_manifest(&manifest, &catalog(&log))
        .await
        .unwrap();

    let results = orchestrator
        .deploy(&manifest, account(), &["dev".to_string()], &DeployOptions::new())
        .await
        .unwrap();
    assert_eq!(results[0].status, EnvironmentStatus::Failure);
    assert!(results[0].message.contains("circular dependencies"));
    assert!(log.phase_calls(Phase::PreDeploy).is_empty());
}

/// Registry-level problems abort before any environment runs.
#[tokio::test]
async fn test_invalid_manifest_rejected() {
    let log = CallLog::new();
    let manifest = ManifestReader::parse_str(
        r#"
version: 1
name: shop
extensions:
  fake: fake-extension
environments:
  dev:
    web:
      type: fake::container
"#,
    )
    .unwrap();
    let orchestrator = Orchestrator::for_manifest(&manifest, &catalog(&log))
        .await
        .unwrap();

    let result = orchestrator
        .deploy(&manifest, account(), &["dev".to_string()], &DeployOptions::new())
        .await;
    match result {
        Err(CoreError::InvalidManifest(errors)) => {
            assert_eq!(
                errors,
                vec!["Unsupported service type specified 'fake::container'".to_string()]
            );
        }
        other => panic!("expected invalid manifest, got {:?}", other),
    }
}

/// An extension missing from the catalog fails registry initialization.
#[tokio::test]
async fn test_unknown_extension() {
    let manifest = ManifestReader::parse_str(
        r#"
version: 1
name: shop
extensions:
  gcp: gcp-extension@1.0.0
environments:
  dev:
    web:
      type: gcp::run
"#,
    )
    .unwrap();

    let result = Orchestrator::for_manifest(&manifest, &catalog(&CallLog::new())).await;
    assert!(matches!(
        result,
        Err(CoreError::Registry(RegistryError::ExtensionLoading { ref prefix, .. })) if prefix == "gcp"
    ));
}

/// Delete tears down dependents first and pre-deploy resources last.
#[tokio::test]
async fn test_delete_environment() {
    let log = CallLog::new();
    let manifest = manifest();
    let orchestrator = Orchestrator::for_manifest(&manifest, &catalog(&log))
        .await
        .unwrap();

    let result = orchestrator.delete(&manifest, account(), "dev").await.unwrap();
    assert!(result.is_success(), "{}", result.message);

    assert!(log.position(Phase::UnDeploy, "web") < log.position(Phase::UnDeploy, "table"));
    assert!(log.position(Phase::UnBind, "table") < log.position(Phase::UnDeploy, "table"));
    assert!(log.position(Phase::GetPreDeployContext, "web") < log.position(Phase::UnDeploy, "web"));

    let last_un_deploy = log
        .calls()
        .iter()
        .rposition(|c| c.phase == Phase::UnDeploy)
        .unwrap();
    assert!(log.position(Phase::UnPreDeploy, "web").unwrap() > last_un_deploy);
    assert!(!log.was_called(Phase::Deploy, "web"));
}
