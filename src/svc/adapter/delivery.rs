//! # Delivery module
//!
//! This module turn the delivery options of a rabbitmq source into the
//! environment variables of the receive adapter's http sender.

use k8s_openapi::api::core::v1::EnvVar;
use tracing::warn;

use crate::svc::{
    adapter::literal,
    crd::rabbitmq_source::DeliverySpec,
    period::{self, Period},
};

// -----------------------------------------------------------------------------
// Constants

pub const HTTP_SENDER_RETRY: &str = "HTTP_SENDER_RETRY";
pub const HTTP_SENDER_BACKOFF_POLICY: &str = "HTTP_SENDER_BACKOFF_POLICY";
pub const HTTP_SENDER_BACKOFF_DELAY: &str = "HTTP_SENDER_BACKOFF_DELAY";

// -----------------------------------------------------------------------------
// Helpers functions

/// returns the environment variables of the delivery options, nothing is
/// emitted without delivery options and the backoff policy is always set
/// when they are.
///
/// A backoff delay which is not an ISO-8601 period is rendered as a zero
/// duration.
pub fn environment(delivery: Option<&DeliverySpec>) -> Vec<EnvVar> {
    let Some(delivery) = delivery else {
        return vec![];
    };

    let mut env = vec![];
    if let Some(retry) = delivery.retry {
        env.push(literal(HTTP_SENDER_RETRY, retry.to_string()));
    }

    let policy = delivery.backoff_policy.unwrap_or_default();
    env.push(literal(HTTP_SENDER_BACKOFF_POLICY, policy.to_string()));

    if let Some(delay) = &delivery.backoff_delay {
        let period = delay.parse::<Period>().unwrap_or_else(|err| {
            warn!(
                delay = delay.as_str(),
                error = err.to_string(),
                "Could not parse backoff delay, use a zero duration",
            );

            Period::default()
        });

        env.push(literal(
            HTTP_SENDER_BACKOFF_DELAY,
            period::format_duration(period.duration_approx()),
        ));
    }

    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svc::crd::rabbitmq_source::BackoffPolicy;

    fn pairs(env: &[EnvVar]) -> Vec<(&str, &str)> {
        env.iter()
            .map(|var| (var.name.as_str(), var.value.as_deref().unwrap_or_default()))
            .collect()
    }

    #[test]
    fn absent_delivery() {
        assert!(environment(None).is_empty());
    }

    #[test]
    fn empty_delivery_defaults_to_exponential() {
        let env = environment(Some(&DeliverySpec::default()));

        assert_eq!(pairs(&env), vec![(HTTP_SENDER_BACKOFF_POLICY, "exponential")]);
    }

    #[test]
    fn full_delivery() {
        let delivery = DeliverySpec {
            retry: Some(3),
            backoff_policy: Some(BackoffPolicy::Linear),
            backoff_delay: Some("PT2S".to_string()),
        };

        assert_eq!(
            pairs(&environment(Some(&delivery))),
            vec![
                (HTTP_SENDER_RETRY, "3"),
                (HTTP_SENDER_BACKOFF_POLICY, "linear"),
                (HTTP_SENDER_BACKOFF_DELAY, "2s"),
            ]
        );
    }

    #[test]
    fn explicit_zero_retry_is_kept() {
        let delivery = DeliverySpec {
            retry: Some(0),
            ..Default::default()
        };

        assert_eq!(
            pairs(&environment(Some(&delivery))),
            vec![
                (HTTP_SENDER_RETRY, "0"),
                (HTTP_SENDER_BACKOFF_POLICY, "exponential"),
            ]
        );
    }

    #[test]
    fn fractional_delay() {
        let delivery = DeliverySpec {
            backoff_delay: Some("PT0.2S".to_string()),
            ..Default::default()
        };

        let env = environment(Some(&delivery));
        assert_eq!(env[1].name, HTTP_SENDER_BACKOFF_DELAY);
        assert_eq!(env[1].value.as_deref(), Some("200ms"));
    }

    #[test]
    fn unparseable_delay_is_swallowed() {
        let delivery = DeliverySpec {
            backoff_delay: Some("garbage".to_string()),
            ..Default::default()
        };

        assert_eq!(
            pairs(&environment(Some(&delivery))),
            vec![
                (HTTP_SENDER_BACKOFF_POLICY, "exponential"),
                (HTTP_SENDER_BACKOFF_DELAY, "0s"),
            ]
        );
    }
}
