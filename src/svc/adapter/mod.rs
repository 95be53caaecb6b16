//! # Receive adapter module
//!
//! This module turn a rabbitmq source and the operator's runtime context into
//! the kubernetes deployment running the receive adapter. The receive adapter
//! consumes messages from the broker and forwards them as cloudevents to the
//! sink, it is configured through environment variables only.

use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{
            Container, EnvVar, EnvVarSource, PodSpec, PodTemplateSpec, ResourceRequirements,
            SecretKeySelector,
        },
    },
    apimachinery::pkg::{
        api::resource::Quantity,
        apis::meta::v1::{LabelSelector, ObjectMeta},
    },
};
use kube::ResourceExt;

use crate::svc::{
    crd::rabbitmq_source::RabbitmqSource,
    k8s::{name, resource},
};

pub mod delivery;
pub mod sink;

// -----------------------------------------------------------------------------
// Constants

pub const CONTAINER_NAME: &str = "receive-adapter";
pub const NAME_PREFIX: &str = "rabbitmqsource";
pub const IMAGE_PULL_POLICY: &str = "IfNotPresent";
pub const REPLICAS: i32 = 1;

pub const CONTROLLER_AGENT_NAME: &str = "rabbitmq-source-controller";
pub const SOURCE_LABEL: &str = "eventing.knative.dev/source";
pub const SOURCE_NAME_LABEL: &str = "eventing.knative.dev/sourceName";
pub const SIDECAR_INJECT_ANNOTATION: &str = "sidecar.istio.io/inject";

pub const RABBIT_URL: &str = "RABBIT_URL";
pub const RABBITMQ_CHANNEL_PARALLELISM: &str = "RABBITMQ_CHANNEL_PARALLELISM";
pub const RABBITMQ_EXCHANGE_NAME: &str = "RABBITMQ_EXCHANGE_NAME";
pub const RABBITMQ_QUEUE_NAME: &str = "RABBITMQ_QUEUE_NAME";
pub const RABBITMQ_PREDECLARED: &str = "RABBITMQ_PREDECLARED";
pub const SINK_URI: &str = "SINK_URI";
pub const K_SINK: &str = "K_SINK";
pub const NAME: &str = "NAME";
pub const NAMESPACE: &str = "NAMESPACE";
pub const K_LOGGING_CONFIG: &str = "K_LOGGING_CONFIG";
pub const K_METRICS_CONFIG: &str = "K_METRICS_CONFIG";
pub const RABBITMQ_VHOST: &str = "RABBITMQ_VHOST";

// -----------------------------------------------------------------------------
// Resource envelope
//
// These values come from performance testing the receive adapter at 1500
// messages per second with a parallelism of 1000. They are not tunable.

pub const CPU_REQUEST: &str = "50m";
pub const MEMORY_REQUEST: &str = "64Mi";
pub const CPU_LIMIT: &str = "4000m";
pub const MEMORY_LIMIT: &str = "600Mi";

/// returns the fixed resource requests and limits of the receive adapter
pub fn resources() -> ResourceRequirements {
    let list = |cpu: &str, memory: &str| {
        BTreeMap::from([
            ("cpu".to_string(), Quantity(cpu.to_string())),
            ("memory".to_string(), Quantity(memory.to_string())),
        ])
    };

    ResourceRequirements {
        requests: Some(list(CPU_REQUEST, MEMORY_REQUEST)),
        limits: Some(list(CPU_LIMIT, MEMORY_LIMIT)),
        ..Default::default()
    }
}

// -----------------------------------------------------------------------------
// ReceiveAdapterArgs structure

/// everything needed to render the receive adapter of a source, the source
/// is expected to be defaulted and validated
#[derive(Clone, Debug)]
pub struct ReceiveAdapterArgs<'a> {
    pub image: String,
    pub source: &'a RabbitmqSource,
    pub labels: BTreeMap<String, String>,
    pub sink_uri: String,
    pub metrics_config: String,
    pub logging_config: String,
    pub rabbitmq_secret_name: String,
    pub broker_url_secret_key: String,
}

// -----------------------------------------------------------------------------
// Helpers functions

pub(crate) fn literal(name: &str, value: String) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value),
        value_from: None,
    }
}

/// returns the labels identifying the receive adapter of the named source
pub fn labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (SOURCE_LABEL.to_string(), CONTROLLER_AGENT_NAME.to_string()),
        (SOURCE_NAME_LABEL.to_string(), name.to_string()),
    ])
}

/// returns the name of the receive adapter deployment of the source, it
/// embeds the source's unique identifier and fits in a DNS label
pub fn deployment_name(source: &RabbitmqSource) -> String {
    name::child_name(
        &format!("{}-{}-", NAME_PREFIX, source.name_any()),
        &source.uid().unwrap_or_default(),
    )
}

/// returns the environment variables of the receive adapter, the broker url
/// is always read from the secret, delivery variables come last
pub fn environment(args: &ReceiveAdapterArgs) -> Vec<EnvVar> {
    let spec = &args.source.spec;
    let config = &spec.rabbitmq_resources_config;
    let (namespace, name) = resource::namespaced_name(args.source);

    let mut env = vec![
        EnvVar {
            name: RABBIT_URL.to_string(),
            value: None,
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: Some(args.rabbitmq_secret_name.to_owned()),
                    key: args.broker_url_secret_key.to_owned(),
                    optional: None,
                }),
                ..Default::default()
            }),
        },
        literal(RABBITMQ_CHANNEL_PARALLELISM, config.parallelism().to_string()),
        literal(RABBITMQ_EXCHANGE_NAME, config.exchange_name.to_owned()),
        literal(RABBITMQ_QUEUE_NAME, config.queue_name.to_owned()),
        literal(RABBITMQ_PREDECLARED, config.predeclared.to_string()),
        literal(SINK_URI, args.sink_uri.to_owned()),
        literal(K_SINK, args.sink_uri.to_owned()),
        literal(NAME, name),
        literal(NAMESPACE, namespace),
        literal(K_LOGGING_CONFIG, args.logging_config.to_owned()),
        literal(K_METRICS_CONFIG, args.metrics_config.to_owned()),
        literal(RABBITMQ_VHOST, config.vhost.to_owned()),
    ];

    env.extend(delivery::environment(spec.delivery.as_ref()));
    env
}

/// returns the deployment running the receive adapter of the source
#[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
pub fn make_receive_adapter(args: &ReceiveAdapterArgs) -> Deployment {
    let source = args.source;
    let service_account_name = Some(source.spec.service_account_name.to_owned())
        .filter(|name| !name.is_empty());

    Deployment {
        metadata: ObjectMeta {
            name: Some(deployment_name(source)),
            namespace: source.namespace(),
            generate_name: Some(format!("{}-", source.name_any())),
            labels: Some(args.labels.to_owned()),
            owner_references: Some(vec![resource::owner_reference(source)]),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(REPLICAS),
            selector: LabelSelector {
                match_labels: Some(args.labels.to_owned()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    annotations: Some(BTreeMap::from([(
                        SIDECAR_INJECT_ANNOTATION.to_string(),
                        "true".to_string(),
                    )])),
                    labels: Some(args.labels.to_owned()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name,
                    containers: vec![Container {
                        name: CONTAINER_NAME.to_string(),
                        image: Some(args.image.to_owned()),
                        image_pull_policy: Some(IMAGE_PULL_POLICY.to_string()),
                        env: Some(environment(args)),
                        resources: Some(resources()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}
