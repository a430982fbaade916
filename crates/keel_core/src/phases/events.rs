//! Event wiring phases.
//!
//! After every level is deployed, each declared (producer, consumer) pair is wired
//! up: first the consumer is prepared to receive events, then the producer starts
//! sending them.

use keel_manifest::ServiceEventConsumer;
use tracing::{debug, info};

use crate::context::{EnvironmentContext, ServiceContext};
use crate::deployer::Phase;
use crate::error::{CoreError, CoreResult, DeployerError};
use crate::outputs::{
    consume_events_context_name, produce_events_context_name, ConsumeEventsContexts,
    DeployContexts, ProduceEventsContexts,
};
use crate::phases::{join_keyed, require, service};
use crate::registry::ServiceRegistry;

/// Every declared (producer, consumer config, consumer) triple of the environment.
fn event_pairs(
    environment: &EnvironmentContext,
    phase: Phase,
) -> CoreResult<Vec<(&ServiceContext, &ServiceEventConsumer, &ServiceContext)>> {
    let mut pairs = Vec::new();
    for producer in environment.service_contexts.values() {
        for consumer_config in &producer.params.event_consumers {
            let consumer = service(environment, &consumer_config.service_name, phase)?;
            pairs.push((producer, consumer_config, consumer));
        }
    }
    Ok(pairs)
}

fn not_implemented(service: &ServiceContext, phase: Phase) -> CoreError {
    CoreError::phase(
        phase,
        &service.service_name,
        DeployerError::Unsupported {
            service_type: service.service_type.to_string(),
            phase,
        },
    )
}

/// Prepare every event consumer to receive events from its producers.
pub async fn consume_events(
    registry: &ServiceRegistry,
    environment: &EnvironmentContext,
    deploy_contexts: &DeployContexts,
) -> CoreResult<ConsumeEventsContexts> {
    info!(
        "Executing consume events phase on services in environment '{}'",
        environment.environment_name
    );

    let mut calls = Vec::new();
    for (producer, _, consumer) in event_pairs(environment, Phase::ConsumeEvents)? {
        let deployer = registry.get_service(&consumer.service_type)?;
        if !deployer.info().supports(Phase::ConsumeEvents) {
            return Err(not_implemented(consumer, Phase::ConsumeEvents));
        }

        let consumer_deploy = require(
            deploy_contexts,
            &consumer.service_name,
            Phase::ConsumeEvents,
            "deploy context",
        )?;
        let producer_deploy = require(
            deploy_contexts,
            &producer.service_name,
            Phase::ConsumeEvents,
            "deploy context",
        )?;

        calls.push(async move {
            debug!(
                "Consuming events from service {} for service {}",
                producer.service_name, consumer.service_name
            );
            let context = deployer
                .consume_events(consumer, consumer_deploy, producer, producer_deploy)
                .await
                .map_err(|e| CoreError::phase(Phase::ConsumeEvents, &consumer.service_name, e))?;
            let name = consume_events_context_name(&consumer.service_name, &producer.service_name);
            Ok::<_, CoreError>((name, context))
        });
    }

    join_keyed(calls).await
}

/// Make every event producer send events to its consumers.
pub async fn produce_events(
    registry: &ServiceRegistry,
    environment: &EnvironmentContext,
    deploy_contexts: &DeployContexts,
) -> CoreResult<ProduceEventsContexts> {
    info!(
        "Executing produce events phase on services in environment '{}'",
        environment.environment_name
    );

    let mut calls = Vec::new();
    for (producer, consumer_config, consumer) in event_pairs(environment, Phase::ProduceEvents)? {
        let deployer = registry.get_service(&producer.service_type)?;
        let info = deployer.info();
        if !info.supports(Phase::ProduceEvents) {
            return Err(not_implemented(producer, Phase::ProduceEvents));
        }
        if !info
            .produced_events_supported_services
            .contains(&consumer.service_type)
        {
            return Err(CoreError::PhaseFailed {
                phase: Phase::ProduceEvents,
                service: producer.service_name.clone(),
                message: format!(
                    "The '{}' service type can't consume events from the '{}' service type",
                    consumer.service_type, producer.service_type
                ),
            });
        }

        let producer_deploy = require(
            deploy_contexts,
            &producer.service_name,
            Phase::ProduceEvents,
            "deploy context",
        )?;
        let consumer_deploy = require(
            deploy_contexts,
            &consumer.service_name,
            Phase::ProduceEvents,
            "deploy context",
        )?;

        calls.push(async move {
            debug!(
                "Producing events from {} for service {}",
                producer.service_name, consumer.service_name
            );
            let context = deployer
                .produce_events(
                    producer,
                    producer_deploy,
                    consumer_config,
                    consumer,
                    consumer_deploy,
                )
                .await
                .map_err(|e| CoreError::phase(Phase::ProduceEvents, &producer.service_name, e))?;
            let name = produce_events_context_name(&producer.service_name, &consumer.service_name);
            Ok::<_, CoreError>((name, context))
        });
    }

    join_keyed(calls).await
}

#[cfg(test)]
mod tests {
    use super::*;

    use keel_manifest::ServiceType;

    use crate::deployer::ServiceInfo;
    use crate::outputs::DeployContext;
    use crate::phases::test_support::{environment, registry};
    use crate::testing::{CallLog, FakeDeployer, ALL_PHASES};

    fn wired_environment() -> EnvironmentContext {
        let mut env = environment(&[("bucket", "producer", &[]), ("handler", "consumer", &[])]);
        if let Some(bucket) = env.service_contexts.get_mut("bucket") {
            bucket.params = bucket.params.clone().event_consumer("handler");
        }
        env
    }

    fn deployed(env: &EnvironmentContext) -> DeployContexts {
        env.service_contexts
            .iter()
            .map(|(name, service)| (name.clone(), DeployContext::new(service)))
            .collect()
    }

    fn producer_info() -> ServiceInfo {
        ServiceInfo::new(ALL_PHASES.into_iter().collect())
            .produces_events_for(ServiceType::new("fake", "consumer"))
    }

    #[tokio::test]
    async fn test_events_wiring() {
        let log = CallLog::new();
        let registry = registry(vec![
            ("producer", FakeDeployer::with_info(&log, producer_info()).into_arc()),
            ("consumer", FakeDeployer::new(&log).into_arc()),
        ])
        .await;
        let env = wired_environment();
        let deploy_contexts = deployed(&env);

        let consumed = consume_events(&registry, &env, &deploy_contexts).await.unwrap();
        assert_eq!(consumed.keys().collect::<Vec<_>>(), vec!["handler->bucket"]);

        let produced = produce_events(&registry, &env, &deploy_contexts).await.unwrap();
        assert_eq!(produced.keys().collect::<Vec<_>>(), vec!["bucket->handler"]);
        assert_eq!(produced["bucket->handler"].consuming_service_name, "handler");

        assert!(
            log.position(Phase::ConsumeEvents, "handler")
                < log.position(Phase::ProduceEvents, "bucket")
        );
    }

    #[tokio::test]
    async fn test_consumer_must_implement_consume_events() {
        let log = CallLog::new();
        let registry = registry(vec![
            ("producer", FakeDeployer::with_info(&log, producer_info()).into_arc()),
            (
                "consumer",
                FakeDeployer::with_phases(&log, &[Phase::Deploy]).into_arc(),
            ),
        ])
        .await;
        let env = wired_environment();

        let err = consume_events(&registry, &env, &deployed(&env))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::PhaseFailed { phase: Phase::ConsumeEvents, ref service, .. } if service == "handler"
        ));
    }

    #[tokio::test]
    async fn test_producer_must_support_consumer_type() {
        let log = CallLog::new();
        let registry = registry(vec![
            ("producer", FakeDeployer::new(&log).into_arc()),
            ("consumer", FakeDeployer::new(&log).into_arc()),
        ])
        .await;
        let env = wired_environment();

        let err = produce_events(&registry, &env, &deployed(&env))
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("The 'fake::consumer' service type can't consume events from the 'fake::producer' service type"));
        assert!(log.phase_calls(Phase::ProduceEvents).is_empty());
    }

    #[tokio::test]
    async fn test_no_event_consumers() {
        let log = CallLog::new();
        let registry = registry(vec![("svc", FakeDeployer::new(&log).into_arc())]).await;
        let env = environment(&[("api", "svc", &[])]);

        assert!(consume_events(&registry, &env, &deployed(&env)).await.unwrap().is_empty());
        assert!(produce_events(&registry, &env, &deployed(&env)).await.unwrap().is_empty());
    }
}
