//! `apiaccess` service type.
//!
//! Grants dependent services access to cloud APIs without provisioning anything.
//! The service only produces policy statements for its consumers.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::context::ServiceContext;
use crate::deployer::{Capabilities, DeployOutputType, Phase, ServiceDeployer, ServiceInfo};
use crate::error::DeployerResult;
use crate::outputs::{DeployContext, PreDeployContext};

pub const SERVICE_TYPE: &str = "apiaccess";
const SERVICE_NAME: &str = "API Access";

/// API families that can be granted, with the actions each grants.
const SUPPORTED_SERVICES: &[(&str, &[&str])] = &[
    ("beanstalk", &["elasticbeanstalk:*"]),
    ("cloudformation", &["cloudformation:*"]),
    ("cloudwatch", &["cloudwatch:*", "logs:*"]),
    ("cloudwatchevents", &["events:*"]),
    ("codebuild", &["codebuild:*"]),
    ("codepipeline", &["codepipeline:*"]),
    ("dynamodb", &["dynamodb:*"]),
    ("ec2", &["ec2:*"]),
    ("ecs", &["ecs:*"]),
    ("efs", &["elasticfilesystem:*"]),
    ("elasticache", &["elasticache:*"]),
    ("iam", &["iam:Get*", "iam:List*"]),
    ("kms", &["kms:*"]),
    ("lambda", &["lambda:*"]),
    ("rds", &["rds:*"]),
    ("route53", &["route53:*"]),
    ("s3", &["s3:*"]),
    ("ses", &["ses:*"]),
    ("sns", &["sns:*"]),
    ("sqs", &["sqs:*"]),
    ("ssm", &["ssm:*"]),
];

fn actions_for(service: &str) -> Option<&'static [&'static str]> {
    SUPPORTED_SERVICES
        .iter()
        .find(|(name, _)| *name == service)
        .map(|(_, actions)| *actions)
}

/// Deployer for the `apiaccess` service type.
pub struct ApiAccessDeployer;

impl ApiAccessDeployer {
    fn requested_services(service: &ServiceContext) -> Option<Vec<String>> {
        service.params.get_param::<Vec<String>>("aws_services")
    }
}

#[async_trait]
impl ServiceDeployer for ApiAccessDeployer {
    fn info(&self) -> ServiceInfo {
        ServiceInfo::new(Capabilities::new().with(Phase::Check).with(Phase::Deploy))
            .produces(DeployOutputType::Policies)
            .without_tagging()
    }

    fn check(&self, service: &ServiceContext, _dependencies: &[&ServiceContext]) -> Vec<String> {
        let requested = match Self::requested_services(service) {
            Some(requested) if !requested.is_empty() => requested,
            _ => {
                return vec![format!(
                    "{} - The 'aws_services' parameter is required.",
                    SERVICE_NAME
                )]
            }
        };

        requested
            .iter()
            .filter(|name| actions_for(name).is_none())
            .map(|name| {
                format!(
                    "{} - The 'aws_services' value '{}' is not supported",
                    SERVICE_NAME, name
                )
            })
            .collect()
    }

    async fn deploy(
        &self,
        service: &ServiceContext,
        _pre_deploy: &PreDeployContext,
        _dependencies: &[DeployContext],
    ) -> DeployerResult<DeployContext> {
        info!(
            "{} - Deploying {} '{}'",
            SERVICE_NAME,
            SERVICE_NAME,
            service.resource_name()
        );

        let mut context = DeployContext::new(service);
        for name in Self::requested_services(service).unwrap_or_default() {
            if let Some(actions) = actions_for(&name) {
                context.policies.push(json!({
                    "Effect": "Allow",
                    "Action": actions,
                    "Resource": ["*"],
                }));
            }
        }

        Ok(context)
    }
}
