//! # Sink module
//!
//! This module resolve the destination of a rabbitmq source into the url
//! the receive adapter sends events to.

use kube::ResourceExt;
use url::Url;

use crate::svc::crd::rabbitmq_source::{Destination, RabbitmqSource};

// -----------------------------------------------------------------------------
// Constants

pub const CLUSTER_DOMAIN: &str = "cluster.local";

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, PartialEq, Eq, Clone, Debug)]
pub enum Error {
    #[error("failed to resolve sink, it has neither an uri nor a reference")]
    Missing,
    #[error("failed to resolve sink, reference to '{0}/{1}' needs an explicit sink uri")]
    Unresolvable(String, String),
    #[error("failed to parse sink uri '{0}', {1}")]
    Parse(String, url::ParseError),
    #[error("failed to resolve sink, uri '{0}' is not an http(s) url")]
    Scheme(String),
}

// -----------------------------------------------------------------------------
// Helpers functions

/// returns the given uri if it is an absolute http(s) url
pub fn parse(uri: &str) -> Result<Url, Error> {
    let url = Url::parse(uri).map_err(|err| Error::Parse(uri.to_string(), err))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(Error::Scheme(uri.to_string())),
    }
}

/// returns the url of the sink, an absolute uri is used as is, a reference
/// to a service is resolved to its in-cluster hostname and the relative uri,
/// if any, is resolved against it.
pub fn resolve(source: &RabbitmqSource) -> Result<String, Error> {
    let Destination { reference, uri } = &source.spec.sink;
    let uri = uri.as_deref().unwrap_or_default();

    let reference = match reference {
        Some(reference) => reference,
        None if uri.is_empty() => return Err(Error::Missing),
        None => return parse(uri).map(String::from),
    };

    match Url::parse(uri) {
        Ok(_) => return parse(uri).map(String::from),
        Err(url::ParseError::RelativeUrlWithoutBase) => {}
        Err(err) => return Err(Error::Parse(uri.to_string(), err)),
    }

    if reference.api_version != "v1" || reference.kind != "Service" {
        return Err(Error::Unresolvable(
            reference.api_version.to_owned(),
            reference.kind.to_owned(),
        ));
    }

    let namespace = reference
        .namespace
        .to_owned()
        .or_else(|| source.namespace())
        .unwrap_or_default();

    let base = format!(
        "http://{}.{}.svc.{}/",
        reference.name, namespace, CLUSTER_DOMAIN
    );

    Url::parse(&base)
        .and_then(|base| base.join(uri))
        .map(String::from)
        .map_err(|err| Error::Parse(uri.to_string(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svc::crd::rabbitmq_source::{Reference, Spec};

    fn source(sink: Destination) -> RabbitmqSource {
        let mut source = RabbitmqSource::new(
            "s1",
            Spec {
                rabbitmq_resources_config: Default::default(),
                delivery: None,
                service_account_name: String::new(),
                sink,
            },
        );

        source.metadata.namespace = Some("ns".to_string());
        source
    }

    fn service(namespace: Option<&str>) -> Option<Reference> {
        Some(Reference {
            api_version: "v1".to_string(),
            kind: "Service".to_string(),
            name: "display".to_string(),
            namespace: namespace.map(str::to_string),
        })
    }

    #[test]
    fn absolute_uri() {
        let source = source(Destination {
            reference: service(None),
            uri: Some("http://sink/".to_string()),
        });

        assert_eq!(resolve(&source), Ok("http://sink/".to_string()));
    }

    #[test]
    fn service_reference() {
        let source = source(Destination {
            reference: service(None),
            uri: None,
        });

        assert_eq!(
            resolve(&source),
            Ok("http://display.ns.svc.cluster.local/".to_string())
        );
    }

    #[test]
    fn service_reference_with_path() {
        let source = source(Destination {
            reference: service(Some("other")),
            uri: Some("events".to_string()),
        });

        assert_eq!(
            resolve(&source),
            Ok("http://display.other.svc.cluster.local/events".to_string())
        );
    }

    #[test]
    fn relative_uri_is_normalized() {
        let source = source(Destination {
            reference: service(None),
            uri: Some("a/../b?q=1".to_string()),
        });

        assert_eq!(
            resolve(&source),
            Ok("http://display.ns.svc.cluster.local/b?q=1".to_string())
        );
    }

    #[test]
    fn reject_invalid_uri() {
        let junk = source(Destination {
            reference: None,
            uri: Some("not a url ://x".to_string()),
        });
        assert!(matches!(resolve(&junk), Err(Error::Parse(..))));

        let ftp = source(Destination {
            reference: service(None),
            uri: Some("ftp://sink/events".to_string()),
        });
        assert_eq!(
            resolve(&ftp),
            Err(Error::Scheme("ftp://sink/events".to_string()))
        );

        assert_eq!(
            parse("mailto:ops@example.com"),
            Err(Error::Scheme("mailto:ops@example.com".to_string()))
        );
        assert!(parse("https://sink.example.com/events").is_ok());
    }

    #[test]
    fn unresolvable_reference() {
        let source = source(Destination {
            reference: Some(Reference {
                api_version: "serving.knative.dev/v1".to_string(),
                kind: "Service".to_string(),
                name: "display".to_string(),
                namespace: None,
            }),
            uri: None,
        });

        assert_eq!(
            resolve(&source),
            Err(Error::Unresolvable(
                "serving.knative.dev/v1".to_string(),
                "Service".to_string()
            ))
        );
        assert_eq!(resolve(&self::source(Destination::default())), Err(Error::Missing));
    }
}
