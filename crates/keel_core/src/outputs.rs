//! Results produced by the lifecycle phases.
//!
//! Each phase call for one service (or one pair of services) yields one of these
//! records. They are written once by the phase that produces them and read by later
//! phases and by dependent services.

use std::collections::BTreeMap;

use keel_manifest::ServiceType;
use serde::{Deserialize, Serialize};

use crate::context::ServiceContext;

pub type PreDeployContexts = BTreeMap<String, PreDeployContext>;
pub type BindContexts = BTreeMap<String, BindContext>;
pub type DeployContexts = BTreeMap<String, DeployContext>;
pub type ConsumeEventsContexts = BTreeMap<String, ConsumeEventsContext>;
pub type ProduceEventsContexts = BTreeMap<String, ProduceEventsContext>;
pub type UnDeployContexts = BTreeMap<String, UnDeployContext>;
pub type UnBindContexts = BTreeMap<String, UnBindContext>;
pub type UnPreDeployContexts = BTreeMap<String, UnPreDeployContext>;

/// Key of the bind context between a dependent service and its dependency.
pub fn bind_context_name(dependent: &str, dependency: &str) -> String {
    format!("{}->{}", dependent, dependency)
}

/// Key of the produce-events context for a producer and one of its consumers.
pub fn produce_events_context_name(producer: &str, consumer: &str) -> String {
    format!("{}->{}", producer, consumer)
}

/// Key of the consume-events context for a consumer and one of its producers.
pub fn consume_events_context_name(consumer: &str, producer: &str) -> String {
    format!("{}->{}", consumer, producer)
}

/// A security group created for a service before deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRef {
    pub group_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

impl SecurityGroupRef {
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            group_name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.group_name = Some(name.into());
        self
    }
}

/// Output of the pre-deploy phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreDeployContext {
    pub app_name: String,
    pub environment_name: String,
    pub service_name: String,
    pub service_type: ServiceType,
    pub security_groups: Vec<SecurityGroupRef>,
}

impl PreDeployContext {
    /// An empty context, used for services without pre-deploy resources.
    pub fn new(service: &ServiceContext) -> Self {
        Self {
            app_name: service.app_name.clone(),
            environment_name: service.environment_name.clone(),
            service_name: service.service_name.clone(),
            service_type: service.service_type.clone(),
            security_groups: Vec::new(),
        }
    }

    pub fn with_security_group(mut self, group: SecurityGroupRef) -> Self {
        self.security_groups.push(group);
        self
    }
}

/// Output of binding a dependency to one of its dependents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindContext {
    pub dependency_service_name: String,
    pub dependent_service_name: String,
}

impl BindContext {
    pub fn new(dependency: &ServiceContext, dependent: &ServiceContext) -> Self {
        Self {
            dependency_service_name: dependency.service_name.clone(),
            dependent_service_name: dependent.service_name.clone(),
        }
    }
}

/// Output of the deploy phase.
///
/// Everything a dependent service needs to talk to this one: environment variables to
/// inject, policy statements to attach to its role, and so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployContext {
    pub app_name: String,
    pub environment_name: String,
    pub service_name: String,
    pub service_type: ServiceType,
    /// Outputs used when wiring event producers to consumers
    pub event_outputs: serde_json::Map<String, serde_json::Value>,
    /// Policy statements a consuming service may attach to its own role
    pub policies: Vec<serde_json::Value>,
    pub environment_variables: BTreeMap<String, String>,
    pub security_groups: Vec<SecurityGroupRef>,
    pub credentials: serde_json::Map<String, serde_json::Value>,
    /// Scripts a consuming resource runs on startup
    pub scripts: Vec<String>,
}

impl DeployContext {
    pub fn new(service: &ServiceContext) -> Self {
        Self {
            app_name: service.app_name.clone(),
            environment_name: service.environment_name.clone(),
            service_name: service.service_name.clone(),
            service_type: service.service_type.clone(),
            event_outputs: serde_json::Map::new(),
            policies: Vec::new(),
            environment_variables: BTreeMap::new(),
            security_groups: Vec::new(),
            credentials: serde_json::Map::new(),
            scripts: Vec::new(),
        }
    }

    /// `<SERVICE_NAME>_<SUFFIX>`, upper-cased with dashes replaced by underscores.
    pub fn injected_env_var_name(&self, suffix: &str) -> String {
        format!("{}_{}", self.service_name, suffix)
            .to_uppercase()
            .replace('-', "_")
    }

    /// Add an environment variable named after this service.
    pub fn add_environment_variable(&mut self, suffix: &str, value: impl Into<String>) {
        let name = self.injected_env_var_name(suffix);
        self.environment_variables.insert(name, value.into());
    }

    pub fn with_policy(mut self, statement: serde_json::Value) -> Self {
        self.policies.push(statement);
        self
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.scripts.push(script.into());
        self
    }

    pub fn with_event_output(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.event_outputs.insert(key.into(), value);
        self
    }
}

/// Output of wiring a consumer to one of its event producers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeEventsContext {
    pub consuming_service_name: String,
    pub producing_service_name: String,
}

impl ConsumeEventsContext {
    pub fn new(consumer: &ServiceContext, producer: &ServiceContext) -> Self {
        Self {
            consuming_service_name: consumer.service_name.clone(),
            producing_service_name: producer.service_name.clone(),
        }
    }
}

/// Output of wiring a producer to one of its event consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceEventsContext {
    pub producing_service_name: String,
    pub consuming_service_name: String,
}

impl ProduceEventsContext {
    pub fn new(producer: &ServiceContext, consumer: &ServiceContext) -> Self {
        Self {
            producing_service_name: producer.service_name.clone(),
            consuming_service_name: consumer.service_name.clone(),
        }
    }
}

/// Output of the un-deploy phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnDeployContext {
    pub app_name: String,
    pub environment_name: String,
    pub service_name: String,
    pub service_type: ServiceType,
}

impl UnDeployContext {
    pub fn new(service: &ServiceContext) -> Self {
        Self {
            app_name: service.app_name.clone(),
            environment_name: service.environment_name.clone(),
            service_name: service.service_name.clone(),
            service_type: service.service_type.clone(),
        }
    }
}

/// Output of the un-bind phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnBindContext {
    pub app_name: String,
    pub environment_name: String,
    pub service_name: String,
    pub service_type: ServiceType,
}

impl UnBindContext {
    pub fn new(service: &ServiceContext) -> Self {
        Self {
            app_name: service.app_name.clone(),
            environment_name: service.environment_name.clone(),
            service_name: service.service_name.clone(),
            service_type: service.service_type.clone(),
        }
    }
}

/// Output of the un-pre-deploy phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnPreDeployContext {
    pub app_name: String,
    pub environment_name: String,
    pub service_name: String,
    pub service_type: ServiceType,
}

impl UnPreDeployContext {
    pub fn new(service: &ServiceContext) -> Self {
        Self {
            app_name: service.app_name.clone(),
            environment_name: service.environment_name.clone(),
            service_name: service.service_name.clone(),
            service_type: service.service_type.clone(),
        }
    }
}
