//! Service discovery, in-process or over HTTP.
//!
//! # Responsibilities
//! - Resolve (name, version range) to one live instance
//! - Talk to a remote registry service (register, unregister, find, list)
//!
//! # Design Decisions
//! - Remote lookup failures are logged and reported as "no instance";
//!   callers treat both as the service being unavailable
//! - Path segments are percent-encoded so ranges like `^1.0.0` or
//!   `>=1.0.0 <2.0.0` survive the trip

use axum::http::StatusCode;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::http::server::RegistrationResult;
use crate::registry::{ServiceInstance, ServiceRegistry};

/// Resolves a service name and version range to one instance.
pub trait Discovery: Send + Sync {
    fn find(
        &self,
        name: &str,
        constraint: &str,
    ) -> impl Future<Output = Option<ServiceInstance>> + Send;
}

impl Discovery for ServiceRegistry {
    async fn find(&self, name: &str, constraint: &str) -> Option<ServiceInstance> {
        self.get(name, constraint)
    }
}

impl<D: Discovery> Discovery for Arc<D> {
    fn find(
        &self,
        name: &str,
        constraint: &str,
    ) -> impl Future<Output = Option<ServiceInstance>> + Send {
        (**self).find(name, constraint)
    }
}

/// Errors talking to a remote registry.
#[derive(Debug, Error)]
pub enum RegistryClientError {
    #[error("invalid registry URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registry returned status {0}")]
    Status(reqwest::StatusCode),
}

/// HTTP client for the registry service.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base: String,
    http: reqwest::Client,
}

impl RegistryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RegistryClientError> {
        // Fail early on a malformed base URL.
        Url::parse(base_url)?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, RegistryClientError> {
        let mut raw = self.base.clone();
        for segment in segments {
            raw.push('/');
            raw.push_str(&encode_segment(segment));
        }
        Ok(Url::parse(&raw)?)
    }

    /// Register (or heartbeat) an instance listening on `port` of the calling host.
    pub async fn register(&self, name: &str, version: &str, port: u16) -> Result<String, RegistryClientError> {
        let url = self.url(&["register", name, version, &port.to_string()])?;
        let res = self.http.put(url).send().await?;
        Ok(expect_success(res)?.json::<RegistrationResult>().await?.result)
    }

    pub async fn unregister(&self, name: &str, version: &str, port: u16) -> Result<String, RegistryClientError> {
        let url = self.url(&["register", name, version, &port.to_string()])?;
        let res = self.http.delete(url).send().await?;
        Ok(expect_success(res)?.json::<RegistrationResult>().await?.result)
    }

    /// Look up one instance; `Ok(None)` when the registry has no match.
    pub async fn lookup(&self, name: &str, constraint: &str) -> Result<Option<ServiceInstance>, RegistryClientError> {
        let url = self.url(&["find", name, constraint])?;
        let res = self.http.get(url).send().await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(expect_success(res)?.json().await?))
    }

    /// Every live instance known to the registry.
    pub async fn services(&self) -> Result<Vec<ServiceInstance>, RegistryClientError> {
        let url = self.url(&["services"])?;
        let res = self.http.get(url).send().await?;
        Ok(expect_success(res)?.json().await?)
    }
}

impl Discovery for RegistryClient {
    async fn find(&self, name: &str, constraint: &str) -> Option<ServiceInstance> {
        match self.lookup(name, constraint).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(service = %name, constraint = %constraint, error = %e, "Registry lookup failed");
                None
            }
        }
    }
}

fn expect_success(res: reqwest::Response) -> Result<reqwest::Response, RegistryClientError> {
    if res.status().is_success() {
        Ok(res)
    } else {
        Err(RegistryClientError::Status(res.status()))
    }
}

/// Percent-encode one path segment (spaces as `%20`, not `+`).
pub(crate) fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
