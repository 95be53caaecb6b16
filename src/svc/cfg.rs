//! # Configuration module
//!
//! This module provide utilities and helpers to interact with the configuration

use std::{collections::BTreeMap, env, path::PathBuf};

use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------------
// Constants

pub const DEFAULT_BROKER_URL_KEY: &str = "brokerURL";

// -----------------------------------------------------------------------------
// Adapter structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct Adapter {
    #[serde(rename = "image")]
    pub image: Option<String>,
    #[serde(rename = "logging_config")]
    pub logging_config: String,
    #[serde(rename = "metrics_config")]
    pub metrics_config: String,
    #[serde(rename = "labels", default)]
    pub labels: BTreeMap<String, String>,
}

// -----------------------------------------------------------------------------
// Broker structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Broker {
    #[serde(rename = "secret_name")]
    pub secret_name: Option<String>,
    #[serde(rename = "broker_url_key")]
    pub broker_url_key: String,
}

impl Default for Broker {
    fn default() -> Self {
        Self {
            secret_name: None,
            broker_url_key: DEFAULT_BROKER_URL_KEY.to_string(),
        }
    }
}

// -----------------------------------------------------------------------------
// Error enum

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to load file '{0:?}', {1}")]
    File(PathBuf, ConfigError),
    #[error("failed to load configuration, {0}")]
    Cast(ConfigError),
    #[error("failed to set default for key '{0}', {1}")]
    Default(String, ConfigError),
}

// -----------------------------------------------------------------------------
// Configuration structures

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct Configuration {
    #[serde(rename = "adapter")]
    pub adapter: Adapter,
    #[serde(rename = "broker")]
    pub broker: Broker,
}

impl TryFrom<PathBuf> for Configuration {
    type Error = Error;

    #[cfg_attr(feature = "trace", tracing::instrument)]
    fn try_from(path: PathBuf) -> Result<Self, Self::Error> {
        let builder = defaults()?
            .add_source(environment())
            .add_source(File::from(path.to_owned()).required(true));

        let config = builder.build().map_err(|err| Error::File(path, err))?;

        config.try_deserialize().map_err(Error::Cast)
    }
}

impl Configuration {
    #[cfg_attr(feature = "trace", tracing::instrument)]
    pub fn try_default() -> Result<Self, Error> {
        let mut paths = vec![
            PathBuf::from(format!("/usr/share/{}/config", env!("CARGO_PKG_NAME"))),
            PathBuf::from(format!("/etc/{}/config", env!("CARGO_PKG_NAME"))),
        ];

        if let Ok(home) = env::var("HOME") {
            paths.push(PathBuf::from(format!(
                "{}/.config/{}/config",
                home,
                env!("CARGO_PKG_NAME")
            )));
        }

        paths.push(PathBuf::from("config"));

        layered(paths)
    }
}

// -----------------------------------------------------------------------------
// Helpers

/// returns the configuration from the defaults, then the environment and
/// then the optional files in order, the last source wins
fn layered(paths: Vec<PathBuf>) -> Result<Configuration, Error> {
    let builder = paths
        .into_iter()
        .fold(defaults()?.add_source(environment()), |builder, path| {
            builder.add_source(File::from(path).required(false))
        });

    let config = builder.build().map_err(Error::Cast)?;

    config.try_deserialize().map_err(Error::Cast)
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, Error> {
    [
        ("adapter.logging_config", ""),
        ("adapter.metrics_config", ""),
        ("broker.broker_url_key", DEFAULT_BROKER_URL_KEY),
    ]
    .into_iter()
    .try_fold(Config::builder(), |builder, (key, value)| {
        builder
            .set_default(key, value)
            .map_err(|err| Error::Default(key.to_string(), err))
    })
}

/// returns the environment source, `RABBITMQ_SOURCE_ADAPTER_BROKER__SECRET_NAME`
/// sets `broker.secret_name`
fn environment() -> Environment {
    Environment::with_prefix(&env!("CARGO_PKG_NAME").replace('-', "_"))
        .prefix_separator("_")
        .separator("__")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_file_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[adapter]
image = "receive-adapter:latest"

[adapter.labels]
team = "eventing"

[broker]
secret_name = "rabbitmq-secret"
"#
        )
        .unwrap();

        let config = Configuration::try_from(file.path().to_path_buf()).unwrap();

        assert_eq!(config.adapter.image.as_deref(), Some("receive-adapter:latest"));
        assert_eq!(config.adapter.logging_config, "");
        assert_eq!(config.adapter.labels.get("team").map(String::as_str), Some("eventing"));
        assert_eq!(config.broker.secret_name.as_deref(), Some("rabbitmq-secret"));
        assert_eq!(config.broker.broker_url_key, DEFAULT_BROKER_URL_KEY);
    }

    #[test]
    fn files_win_over_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[broker]\nsecret_name = \"from-file\"\n").unwrap();

        env::set_var("RABBITMQ_SOURCE_ADAPTER_BROKER__SECRET_NAME", "from-env");
        let explicit = Configuration::try_from(path.to_owned());
        let default = layered(vec![dir.path().join("absent"), dir.path().join("config")]);
        let environment_only = layered(vec![PathBuf::from("/nonexistent/config")]);
        env::remove_var("RABBITMQ_SOURCE_ADAPTER_BROKER__SECRET_NAME");

        assert_eq!(explicit.unwrap().broker.secret_name.as_deref(), Some("from-file"));
        assert_eq!(default.unwrap().broker.secret_name.as_deref(), Some("from-file"));
        assert_eq!(
            environment_only.unwrap().broker.secret_name.as_deref(),
            Some("from-env")
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = Configuration::try_from(PathBuf::from("/nonexistent/config.toml"));

        assert!(matches!(result, Err(Error::File(..))));
    }
}
