//! # RabbitMQ source
//!
//! This module provide the rabbitmq source custom resource, its definition,
//! defaults and validation.

use std::fmt::{self, Display, Formatter};

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::svc::period::{self, Period};

// -----------------------------------------------------------------------------
// Constants

pub const DEFAULT_PARALLELISM: i32 = 1;
pub const MAX_PARALLELISM: i32 = 1000;

// -----------------------------------------------------------------------------
// BackoffPolicy enumeration

#[derive(JsonSchema, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug, Default)]
pub enum BackoffPolicy {
    #[serde(rename = "linear")]
    Linear,
    #[serde(rename = "exponential")]
    #[default]
    Exponential,
}

impl Display for BackoffPolicy {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Exponential => write!(f, "exponential"),
        }
    }
}

// -----------------------------------------------------------------------------
// DeliverySpec structure

/// delivery options of events toward the sink, each field independently
/// toggles the matching setting of the receive adapter
#[derive(JsonSchema, Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct DeliverySpec {
    #[serde(rename = "retry", default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<i32>,
    #[serde(rename = "backoffPolicy", default, skip_serializing_if = "Option::is_none")]
    pub backoff_policy: Option<BackoffPolicy>,
    #[serde(rename = "backoffDelay", default, skip_serializing_if = "Option::is_none")]
    pub backoff_delay: Option<String>,
}

// -----------------------------------------------------------------------------
// Destination structure

#[derive(JsonSchema, Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct Reference {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    #[serde(rename = "kind")]
    pub kind: String,
    #[serde(rename = "name")]
    pub name: String,
    #[serde(rename = "namespace", default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(JsonSchema, Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct Destination {
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
    #[serde(rename = "uri", default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

// -----------------------------------------------------------------------------
// ResourcesConfig structure

#[derive(JsonSchema, Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct ResourcesConfig {
    #[serde(rename = "exchangeName", default)]
    pub exchange_name: String,
    #[serde(rename = "queueName", default)]
    pub queue_name: String,
    #[serde(rename = "vhost", default)]
    pub vhost: String,
    #[serde(rename = "parallelism", default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<i32>,
    #[serde(rename = "predeclared", default)]
    pub predeclared: bool,
}

impl ResourcesConfig {
    pub fn parallelism(&self) -> i32 {
        self.parallelism.unwrap_or(DEFAULT_PARALLELISM)
    }
}

// -----------------------------------------------------------------------------
// Spec structure

#[derive(CustomResource, JsonSchema, Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
#[kube(group = "sources.knative.dev")]
#[kube(version = "v1alpha1")]
#[kube(kind = "RabbitmqSource")]
#[kube(singular = "rabbitmqsource")]
#[kube(plural = "rabbitmqsources")]
#[kube(namespaced)]
#[kube(derive = "PartialEq")]
#[kube(
    printcolumn = r#"{"name":"exchange", "type":"string", "description":"Exchange", "jsonPath":".spec.rabbitmqResourcesConfig.exchangeName"}"#
)]
#[kube(
    printcolumn = r#"{"name":"queue", "type":"string", "description":"Queue", "jsonPath":".spec.rabbitmqResourcesConfig.queueName"}"#
)]
pub struct Spec {
    #[serde(rename = "rabbitmqResourcesConfig")]
    pub rabbitmq_resources_config: ResourcesConfig,
    #[serde(rename = "delivery", default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliverySpec>,
    #[serde(rename = "serviceAccountName", default)]
    pub service_account_name: String,
    #[serde(rename = "sink")]
    pub sink: Destination,
}

// -----------------------------------------------------------------------------
// ValidationError enumeration

#[derive(thiserror::Error, PartialEq, Eq, Clone, Debug)]
pub enum ValidationError {
    #[error("failed to validate rabbitmq source, metadata field '{0}' is missing")]
    Metadata(&'static str),
    #[error("failed to validate rabbitmq source, parallelism '{0}' is not between 1 and 1000")]
    Parallelism(i32),
    #[error("failed to validate rabbitmq source, retry '{0}' is negative")]
    Retry(i32),
    #[error("failed to validate rabbitmq source, {0}")]
    BackoffDelay(period::Error),
    #[error("failed to validate rabbitmq source, a predeclared source needs a queue name")]
    QueueName,
    #[error("failed to validate rabbitmq source, sink needs an uri or a reference")]
    Sink,
}

// -----------------------------------------------------------------------------
// RabbitmqSource implementation

impl RabbitmqSource {
    /// fill the optional fields which have a default value
    pub fn set_defaults(&mut self) {
        let config = &mut self.spec.rabbitmq_resources_config;

        config.parallelism.get_or_insert(DEFAULT_PARALLELISM);
    }

    /// check that the source can be turned into a receive adapter
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.metadata.name.as_deref().unwrap_or_default().is_empty() {
            return Err(ValidationError::Metadata("name"));
        }

        if self.namespace().unwrap_or_default().is_empty() {
            return Err(ValidationError::Metadata("namespace"));
        }

        if self.uid().unwrap_or_default().is_empty() {
            return Err(ValidationError::Metadata("uid"));
        }

        let config = &self.spec.rabbitmq_resources_config;
        let parallelism = config.parallelism();
        if !(1..=MAX_PARALLELISM).contains(&parallelism) {
            return Err(ValidationError::Parallelism(parallelism));
        }

        if config.predeclared && config.queue_name.is_empty() {
            return Err(ValidationError::QueueName);
        }

        if let Some(delivery) = &self.spec.delivery {
            if let Some(retry) = delivery.retry.filter(|retry| *retry < 0) {
                return Err(ValidationError::Retry(retry));
            }

            if let Some(delay) = &delivery.backoff_delay {
                delay
                    .parse::<Period>()
                    .map_err(ValidationError::BackoffDelay)?;
            }
        }

        let sink = &self.spec.sink;
        if sink.reference.is_none() && sink.uri.as_deref().unwrap_or_default().is_empty() {
            return Err(ValidationError::Sink);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use kube::CustomResourceExt;

    use super::*;

    const SOURCE: &str = r#"
apiVersion: sources.knative.dev/v1alpha1
kind: RabbitmqSource
metadata:
  name: s1
  namespace: ns
  uid: u1
spec:
  rabbitmqResourcesConfig:
    exchangeName: e
    queueName: q
  delivery:
    retry: 3
    backoffPolicy: linear
    backoffDelay: PT2S
  sink:
    uri: http://sink/
"#;

    fn source() -> RabbitmqSource {
        serde_yaml::from_str(SOURCE).unwrap()
    }

    #[test]
    fn deserialize_manifest() {
        let source = source();
        let delivery = source.spec.delivery.as_ref().unwrap();

        assert_eq!(source.name_any(), "s1");
        assert_eq!(source.spec.rabbitmq_resources_config.parallelism, None);
        assert_eq!(source.spec.rabbitmq_resources_config.vhost, "");
        assert_eq!(delivery.retry, Some(3));
        assert_eq!(delivery.backoff_policy, Some(BackoffPolicy::Linear));
        assert_eq!(delivery.backoff_delay.as_deref(), Some("PT2S"));
    }

    #[test]
    fn default_parallelism() {
        let mut source = source();
        source.set_defaults();

        assert_eq!(source.spec.rabbitmq_resources_config.parallelism, Some(1));
        assert!(source.validate().is_ok());

        source.spec.rabbitmq_resources_config.parallelism = Some(42);
        source.set_defaults();
        assert_eq!(source.spec.rabbitmq_resources_config.parallelism, Some(42));
    }

    #[test]
    fn reject_invalid_sources() {
        let mut source = source();
        source.spec.rabbitmq_resources_config.parallelism = Some(0);
        assert_eq!(source.validate(), Err(ValidationError::Parallelism(0)));

        let mut source = self::source();
        source.spec.rabbitmq_resources_config.parallelism = Some(1001);
        assert_eq!(source.validate(), Err(ValidationError::Parallelism(1001)));

        let mut source = self::source();
        source.metadata.uid = None;
        assert_eq!(source.validate(), Err(ValidationError::Metadata("uid")));

        let mut source = self::source();
        source.spec.delivery = Some(DeliverySpec {
            retry: Some(-1),
            ..Default::default()
        });
        assert_eq!(source.validate(), Err(ValidationError::Retry(-1)));

        let mut source = self::source();
        source.spec.delivery = Some(DeliverySpec {
            backoff_delay: Some("garbage".to_string()),
            ..Default::default()
        });
        assert!(matches!(
            source.validate(),
            Err(ValidationError::BackoffDelay(_))
        ));

        let mut source = self::source();
        source.spec.rabbitmq_resources_config.predeclared = true;
        source.spec.rabbitmq_resources_config.queue_name = String::new();
        assert_eq!(source.validate(), Err(ValidationError::QueueName));

        let mut source = self::source();
        source.spec.sink = Destination::default();
        assert_eq!(source.validate(), Err(ValidationError::Sink));
    }

    #[test]
    fn accept_explicit_zero_retry() {
        let mut source = source();
        source.spec.delivery = Some(DeliverySpec {
            retry: Some(0),
            ..Default::default()
        });

        assert!(source.validate().is_ok());
    }

    #[test]
    fn custom_resource_definition() {
        let crd = RabbitmqSource::crd();

        assert_eq!(crd.spec.group, "sources.knative.dev");
        assert_eq!(crd.spec.names.kind, "RabbitmqSource");
        assert_eq!(crd.spec.versions[0].name, "v1alpha1");
    }
}
