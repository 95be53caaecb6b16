//! # Receive adapter module
//!
//! This module provides receive adapter command line interface function
//! implementation

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use clap::{Args, Subcommand, ValueEnum};
use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::{
    cmd::Executor,
    svc::{
        adapter::{self, sink, ReceiveAdapterArgs},
        cfg::Configuration,
        crd::rabbitmq_source::{RabbitmqSource, ValidationError},
        k8s::resource,
    },
};

// -----------------------------------------------------------------------------
// Error enum

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read file '{0:?}', {1}")]
    Read(PathBuf, io::Error),
    #[error("failed to deserialize manifest '{0:?}', {1}")]
    Deserialize(PathBuf, serde_yaml::Error),
    #[error("{0}")]
    Validate(ValidationError),
    #[error("{0}, use '--sink-uri' to give it explicitly")]
    Sink(sink::Error),
    #[error("invalid '--sink-uri', {0}")]
    SinkUri(sink::Error),
    #[error("failed to render receive adapter, no image given by configuration or '--image'")]
    Image,
    #[error("failed to render receive adapter, no broker secret given by configuration or '--secret-name'")]
    SecretName,
    #[error("failed to serialize deployment as yaml, {0}")]
    SerializeYaml(serde_yaml::Error),
    #[error("failed to serialize deployment as json, {0}")]
    SerializeJson(serde_json::Error),
    #[error("failed to compute diff between the live and desired deployment, {0}")]
    Diff(serde_json::Error),
}

// -----------------------------------------------------------------------------
// Output enum

#[derive(ValueEnum, PartialEq, Eq, Clone, Copy, Debug, Default)]
pub enum Output {
    #[default]
    Yaml,
    Json,
}

// -----------------------------------------------------------------------------
// Overrides structure

/// runtime context given on the command line, it takes precedence over the
/// configuration
#[derive(Args, PartialEq, Eq, Clone, Debug, Default)]
pub struct Overrides {
    /// Url of the sink, skip the resolution of the source's sink
    #[clap(long = "sink-uri")]
    pub sink_uri: Option<String>,
    /// Image of the receive adapter
    #[clap(long = "image")]
    pub image: Option<String>,
    /// Name of the secret holding the broker url
    #[clap(long = "secret-name")]
    pub secret_name: Option<String>,
    /// Key of the broker url in the secret
    #[clap(long = "broker-url-key")]
    pub broker_url_key: Option<String>,
}

// -----------------------------------------------------------------------------
// ReceiveAdapter enum

#[derive(Subcommand, Clone, Debug)]
pub enum ReceiveAdapter {
    /// Render the receive adapter deployment of a rabbitmq source manifest
    #[clap(name = "render", alias = "r")]
    Render {
        source: PathBuf,
        #[clap(flatten)]
        overrides: Overrides,
        /// Format of the rendered deployment
        #[clap(short = 'o', long = "output", value_enum, default_value_t = Output::Yaml)]
        output: Output,
    },
    /// Print the json patch turning a live deployment into the rendered one
    #[clap(name = "diff", alias = "d")]
    Diff {
        source: PathBuf,
        live: PathBuf,
        #[clap(flatten)]
        overrides: Overrides,
    },
}

#[async_trait]
impl Executor for ReceiveAdapter {
    type Error = Error;

    #[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
    async fn execute(&self, config: Arc<Configuration>) -> Result<(), Self::Error> {
        match self {
            Self::Render {
                source,
                overrides,
                output,
            } => render(config, source, overrides, output).await,
            Self::Diff {
                source,
                live,
                overrides,
            } => diff(config, source, live, overrides).await,
        }
    }
}

// -----------------------------------------------------------------------------
// helpers

async fn load<T>(path: &Path) -> Result<T, Error>
where
    T: DeserializeOwned,
{
    debug!(path = path.display().to_string(), "Read manifest");
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| Error::Read(path.to_owned(), err))?;

    serde_yaml::from_str(&content).map_err(|err| Error::Deserialize(path.to_owned(), err))
}

/// returns the arguments of the receive adapter of a defaulted and validated
/// source, command line overrides win over the configuration
pub fn arguments<'a>(
    config: &Configuration,
    source: &'a RabbitmqSource,
    overrides: &Overrides,
) -> Result<ReceiveAdapterArgs<'a>, Error> {
    let non_empty = |value: &Option<String>| value.to_owned().filter(|v| !v.is_empty());

    let image = non_empty(&overrides.image)
        .or_else(|| non_empty(&config.adapter.image))
        .ok_or(Error::Image)?;

    let rabbitmq_secret_name = non_empty(&overrides.secret_name)
        .or_else(|| non_empty(&config.broker.secret_name))
        .ok_or(Error::SecretName)?;

    let broker_url_secret_key = non_empty(&overrides.broker_url_key)
        .unwrap_or_else(|| config.broker.broker_url_key.to_owned());

    let sink_uri = match non_empty(&overrides.sink_uri) {
        Some(uri) => sink::parse(&uri).map(String::from).map_err(Error::SinkUri)?,
        None => sink::resolve(source).map_err(Error::Sink)?,
    };

    let mut labels = config.adapter.labels.to_owned();
    labels.extend(adapter::labels(&source.name_any()));

    Ok(ReceiveAdapterArgs {
        image,
        source,
        labels,
        sink_uri,
        metrics_config: config.adapter.metrics_config.to_owned(),
        logging_config: config.adapter.logging_config.to_owned(),
        rabbitmq_secret_name,
        broker_url_secret_key,
    })
}

/// read, default and validate the source at the given path then returns its
/// receive adapter deployment
pub async fn translate(
    config: &Configuration,
    path: &Path,
    overrides: &Overrides,
) -> Result<Deployment, Error> {
    let mut source: RabbitmqSource = load(path).await?;
    let (namespace, name) = resource::namespaced_name(&source);

    source.set_defaults();
    source.validate().map_err(Error::Validate)?;

    let args = arguments(config, &source, overrides)?;
    let deployment = adapter::make_receive_adapter(&args);

    info!(
        kind = "RabbitmqSource",
        namespace = &namespace,
        name = &name,
        deployment = deployment.name_any(),
        sink = &args.sink_uri,
        "Render receive adapter of custom resource",
    );

    Ok(deployment)
}

// -----------------------------------------------------------------------------
// render function

#[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
pub async fn render(
    config: Arc<Configuration>,
    source: &Path,
    overrides: &Overrides,
    output: &Output,
) -> Result<(), Error> {
    let deployment = translate(&config, source, overrides).await?;
    let manifest = match output {
        Output::Yaml => serde_yaml::to_string(&deployment).map_err(Error::SerializeYaml)?,
        Output::Json => {
            serde_json::to_string_pretty(&deployment).map_err(Error::SerializeJson)? + "\n"
        }
    };

    print!("{manifest}");
    Ok(())
}

// -----------------------------------------------------------------------------
// diff function

#[cfg_attr(feature = "trace", tracing::instrument(skip(config)))]
pub async fn diff(
    config: Arc<Configuration>,
    source: &Path,
    live: &Path,
    overrides: &Overrides,
) -> Result<(), Error> {
    let desired = translate(&config, source, overrides).await?;
    let live: Deployment = load(live).await?;
    let patch = resource::managed_diff(&live, &desired).map_err(Error::Diff)?;

    if patch.0.is_empty() {
        info!(
            deployment = desired.name_any(),
            "Live receive adapter is up to date"
        );
    } else {
        info!(
            deployment = desired.name_any(),
            operations = patch.0.len(),
            "Live receive adapter differs from the desired one",
        );
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&patch).map_err(Error::Diff)?
    );
    Ok(())
}
