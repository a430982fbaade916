//! Lifecycle phase runners.
//!
//! Each runner resolves the deployer of every service it touches, calls the phase if
//! the deployer declares it, and collects the resulting contexts by name. Calls within
//! one runner invocation run concurrently. All of them are awaited before the first
//! failure (in service name order) is returned, so siblings are never cancelled.

pub mod bind;
pub mod check;
pub mod deploy;
pub mod events;
pub mod pre_deploy;
pub mod un_bind;
pub mod un_deploy;
pub mod un_pre_deploy;

use std::collections::BTreeMap;
use std::future::Future;

use futures_util::future::join_all;

use crate::context::{EnvironmentContext, ServiceContext};
use crate::deploy_order::DeployOrder;
use crate::deployer::Phase;
use crate::error::{CoreError, CoreResult};

pub use bind::bind_services_in_level;
pub use check::check_services;
pub use deploy::deploy_services_in_level;
pub use events::{consume_events, produce_events};
pub use pre_deploy::{get_pre_deploy_contexts, pre_deploy_services};
pub use un_bind::un_bind_services_in_level;
pub use un_deploy::un_deploy_services_in_level;
pub use un_pre_deploy::un_pre_deploy_services;

/// Await all keyed calls, then collect them or return the first error.
pub(crate) async fn join_keyed<T, F>(calls: Vec<F>) -> CoreResult<BTreeMap<String, T>>
where
    F: Future<Output = CoreResult<(String, T)>>,
{
    join_all(calls).await.into_iter().collect()
}

/// Look up a context another phase must already have produced.
pub(crate) fn require<'a, T>(
    contexts: &'a BTreeMap<String, T>,
    service: &str,
    phase: Phase,
    what: &str,
) -> CoreResult<&'a T> {
    contexts.get(service).ok_or_else(|| CoreError::PhaseFailed {
        phase,
        service: service.to_string(),
        message: format!("no {} is available", what),
    })
}

/// Look up a service of the environment by name.
pub(crate) fn service<'a>(
    environment: &'a EnvironmentContext,
    name: &str,
    phase: Phase,
) -> CoreResult<&'a ServiceContext> {
    environment
        .service(name)
        .ok_or_else(|| CoreError::PhaseFailed {
            phase,
            service: name.to_string(),
            message: format!(
                "service is not defined in environment '{}'",
                environment.environment_name
            ),
        })
}

/// Services of one level of the deploy order.
pub(crate) fn level_services<'a>(
    environment: &'a EnvironmentContext,
    order: &DeployOrder,
    level: usize,
    phase: Phase,
) -> CoreResult<Vec<&'a ServiceContext>> {
    order
        .level(level)
        .unwrap_or_default()
        .iter()
        .map(|name| service(environment, name, phase))
        .collect()
}
