//! Circuit breaker for outbound calls to discovered services.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: endpoint assumed down, requests fail fast
//! - Half-Open: cool-down elapsed, requests pass through again
//!
//! # State Transitions
//! ```text
//! Closed → Open:      failure_count > threshold
//! Open → Half-Open:   first can_request() at or after next_retry_at
//! Half-Open → Open:   next failure (count is still above threshold)
//! any → Closed:       a single success, failure_count = 0
//! ```
//!
//! # Design Decisions
//! - Keyed by endpoint (method + path), not by instance: replicas of one
//!   service share breaker history
//! - One `DashMap` entry per endpoint; each transition runs under that
//!   entry's lock, endpoints do not block each other
//! - No half-open trial limiting
//! - Every call carries a fixed deadline; timeouts count as failures

use axum::body::{Body, Bytes};
use axum::http::{Method, Request, StatusCode};
use dashmap::DashMap;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use thiserror::Error;
use tokio::time;
use url::Url;

use crate::config::BreakerConfig;
use crate::observability::metrics;
use crate::resilience::clock::{system_clock, Clock};

/// Largest response body buffered from an upstream.
const MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

const USER_AGENT: &str = concat!("service-discovery/", env!("CARGO_PKG_VERSION"));

/// Breaker status of one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircuitStatus {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

impl CircuitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitStatus::Closed => "closed",
            CircuitStatus::Open => "open",
            CircuitStatus::HalfOpen => "half_open",
        }
    }
}

/// Failure accounting for one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CircuitState {
    pub failure_count: u32,
    pub status: CircuitStatus,
    /// Set when the circuit opens.
    pub next_retry_at: Option<SystemTime>,
}

/// Identifies a logical endpoint: HTTP method plus path and query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey(String);

impl EndpointKey {
    pub fn new(method: &Method, path: &str) -> Self {
        Self(format!("{} {}", method, path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How an upstream response body is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Decoded JSON document.
    Json,
    /// Raw bytes, e.g. an image.
    Stream,
}

/// A successful upstream response.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    Stream(Bytes),
}

/// An outbound call to a resolved instance.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: Url,
    pub kind: ResponseKind,
}

impl RequestSpec {
    pub fn get(url: Url, kind: ResponseKind) -> Self {
        Self {
            method: Method::GET,
            url,
            kind,
        }
    }

    /// Path and query of the target, without scheme, host or port.
    pub fn path(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }

    pub fn endpoint(&self) -> EndpointKey {
        EndpointKey::new(&self.method, &self.path())
    }
}

/// Why an attempted call counted as a failure.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream returned status {0}")]
    Status(StatusCode),

    #[error("undecodable response body: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result of [`CircuitBreaker::call_service`].
///
/// Callers that only care about "got data or not" treat `Denied` and
/// `Failed` the same way.
#[derive(Debug)]
pub enum CallOutcome {
    /// The circuit was open; no network call was made.
    Denied,
    /// The call was attempted and failed.
    Failed(CallError),
    Success(Payload),
}

impl CallOutcome {
    pub fn into_payload(self) -> Option<Payload> {
        match self {
            CallOutcome::Success(payload) => Some(payload),
            CallOutcome::Denied | CallOutcome::Failed(_) => None,
        }
    }
}

/// Per-endpoint circuit breaker with an HTTP client.
pub struct CircuitBreaker {
    states: DashMap<EndpointKey, CircuitState>,
    failure_threshold: u32,
    cool_down: Duration,
    request_timeout: Duration,
    clock: Arc<dyn Clock>,
    client: Client<HttpConnector, Body>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("endpoints", &self.states.len())
            .field("failure_threshold", &self.failure_threshold)
            .field("cool_down", &self.cool_down)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(config: &BreakerConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: &BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            states: DashMap::new(),
            failure_threshold: config.failure_threshold,
            cool_down: Duration::from_secs(config.cool_down_secs),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            clock,
            client,
        }
    }

    /// Snapshot of an endpoint's state, if it has been seen.
    pub fn state(&self, endpoint: &EndpointKey) -> Option<CircuitState> {
        self.states.get(endpoint).map(|s| s.value().clone())
    }

    /// Whether a call to `endpoint` may be attempted now.
    ///
    /// Past the cool-down this flips an open circuit to half-open.
    pub fn can_request(&self, endpoint: &EndpointKey) -> bool {
        let now = self.clock.now();
        let mut state = self.states.entry(endpoint.clone()).or_default();

        match state.status {
            CircuitStatus::Closed | CircuitStatus::HalfOpen => true,
            CircuitStatus::Open => {
                let ready = state.next_retry_at.map_or(true, |at| at <= now);
                if ready {
                    state.status = CircuitStatus::HalfOpen;
                    tracing::info!(%endpoint, failures = state.failure_count, "Circuit is HALF_OPEN");
                    metrics::record_circuit_transition(endpoint.as_str(), CircuitStatus::HalfOpen.as_str());
                }
                ready
            }
        }
    }

    /// Record a success: reset to closed.
    pub fn on_success(&self, endpoint: &EndpointKey) {
        let previous = self.states.insert(endpoint.clone(), CircuitState::default());

        if let Some(previous) = previous {
            if previous.status != CircuitStatus::Closed {
                tracing::info!(%endpoint, "Circuit is CLOSED");
                metrics::record_circuit_transition(endpoint.as_str(), CircuitStatus::Closed.as_str());
            }
        }
    }

    /// Record a failure; opens the circuit once the threshold is exceeded.
    pub fn on_failure(&self, endpoint: &EndpointKey) {
        let now = self.clock.now();
        let mut state = self.states.entry(endpoint.clone()).or_default();

        state.failure_count = state.failure_count.saturating_add(1);
        if state.failure_count > self.failure_threshold {
            state.status = CircuitStatus::Open;
            state.next_retry_at = Some(now + self.cool_down);
            tracing::warn!(
                %endpoint,
                failures = state.failure_count,
                cool_down_secs = self.cool_down.as_secs(),
                "ALERT! Circuit is OPEN"
            );
            metrics::record_circuit_transition(endpoint.as_str(), CircuitStatus::Open.as_str());
        }
    }

    /// Gate, perform and classify one call.
    pub async fn call_service(&self, request: &RequestSpec) -> CallOutcome {
        let endpoint = request.endpoint();
        if !self.can_request(&endpoint) {
            tracing::debug!(%endpoint, "Circuit open, call not attempted");
            metrics::record_upstream_call(endpoint.as_str(), "denied", None);
            return CallOutcome::Denied;
        }

        let start = Instant::now();
        match self.send(request).await {
            Ok(payload) => {
                self.on_success(&endpoint);
                metrics::record_upstream_call(endpoint.as_str(), "success", Some(start));
                CallOutcome::Success(payload)
            }
            Err(e) => {
                tracing::warn!(%endpoint, url = %request.url, error = %e, "Upstream call failed");
                self.on_failure(&endpoint);
                metrics::record_upstream_call(endpoint.as_str(), "failure", Some(start));
                CallOutcome::Failed(e)
            }
        }
    }

    async fn send(&self, request: &RequestSpec) -> Result<Payload, CallError> {
        let req = Request::builder()
            .method(request.method.clone())
            .uri(request.url.as_str())
            .header("user-agent", USER_AGENT)
            .body(Body::empty())
            .map_err(|e| CallError::InvalidRequest(e.to_string()))?;

        let exchange = async {
            let response: hyper::Response<hyper::body::Incoming> = self
                .client
                .request(req)
                .await
                .map_err(|e| CallError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(CallError::Status(status));
            }

            let body = axum::body::to_bytes(Body::new(response.into_body()), MAX_RESPONSE_BYTES)
                .await
                .map_err(|e| CallError::Transport(e.to_string()))?;
            Ok::<Bytes, CallError>(body)
        };

        let body = time::timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| CallError::Timeout(self.request_timeout))??;

        match request.kind {
            ResponseKind::Json => serde_json::from_slice(&body)
                .map(Payload::Json)
                .map_err(|e| CallError::Decode(e.to_string())),
            ResponseKind::Stream => Ok(Payload::Stream(body)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::clock::ManualClock;

    fn breaker() -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let breaker = CircuitBreaker::with_clock(&BreakerConfig::default(), clock.clone());
        (breaker, clock)
    }

    fn endpoint() -> EndpointKey {
        EndpointKey::new(&Method::GET, "/names")
    }

    #[test]
    fn test_lazy_init_closed() {
        let (breaker, _) = breaker();
        assert!(breaker.state(&endpoint()).is_none());
        assert!(breaker.can_request(&endpoint()));
        assert_eq!(breaker.state(&endpoint()), Some(CircuitState::default()));
    }

    #[test]
    fn test_opens_after_threshold_exceeded() {
        let (breaker, _) = breaker();
        let ep = endpoint();

        for _ in 0..5 {
            breaker.on_failure(&ep);
        }
        let state = breaker.state(&ep).unwrap();
        assert_eq!(state.status, CircuitStatus::Closed);
        assert_eq!(state.failure_count, 5);
        assert!(breaker.can_request(&ep));

        breaker.on_failure(&ep);
        let state = breaker.state(&ep).unwrap();
        assert_eq!(state.status, CircuitStatus::Open);
        assert!(!breaker.can_request(&ep));
    }

    #[test]
    fn test_half_open_after_cool_down() {
        let (breaker, clock) = breaker();
        let ep = endpoint();
        for _ in 0..6 {
            breaker.on_failure(&ep);
        }
        let retry_at = breaker.state(&ep).unwrap().next_retry_at.unwrap();
        assert_eq!(retry_at, clock.now() + Duration::from_secs(10));

        clock.advance(Duration::from_secs(9));
        assert!(!breaker.can_request(&ep));
        assert!(!breaker.can_request(&ep));
        assert_eq!(breaker.state(&ep).unwrap().status, CircuitStatus::Open);

        clock.advance(Duration::from_secs(1));
        assert!(breaker.can_request(&ep));
        assert_eq!(breaker.state(&ep).unwrap().status, CircuitStatus::HalfOpen);
        assert!(breaker.can_request(&ep));
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let (breaker, clock) = breaker();
        let ep = endpoint();
        for _ in 0..6 {
            breaker.on_failure(&ep);
        }
        clock.advance(Duration::from_secs(10));
        assert!(breaker.can_request(&ep));

        breaker.on_failure(&ep);
        let state = breaker.state(&ep).unwrap();
        assert_eq!(state.status, CircuitStatus::Open);
        assert_eq!(state.failure_count, 7);
        assert_eq!(state.next_retry_at, Some(clock.now() + Duration::from_secs(10)));
        assert!(!breaker.can_request(&ep));
    }

    #[test]
    fn test_success_resets() {
        let (breaker, clock) = breaker();
        let ep = endpoint();
        for _ in 0..8 {
            breaker.on_failure(&ep);
        }
        clock.advance(Duration::from_secs(10));
        assert!(breaker.can_request(&ep));

        breaker.on_success(&ep);
        assert_eq!(breaker.state(&ep), Some(CircuitState::default()));

        // A fresh run of five failures keeps it closed again
        for _ in 0..5 {
            breaker.on_failure(&ep);
        }
        assert!(breaker.can_request(&ep));
    }

    #[test]
    fn test_endpoints_are_independent() {
        let (breaker, _) = breaker();
        let names = endpoint();
        let list = EndpointKey::new(&Method::GET, "/list");
        for _ in 0..6 {
            breaker.on_failure(&names);
        }
        assert!(!breaker.can_request(&names));
        assert!(breaker.can_request(&list));
    }

    #[test]
    fn test_endpoint_key_ignores_instance() {
        let a = RequestSpec::get(Url::parse("http://10.0.0.1:3000/speaker/ada?x=1").unwrap(), ResponseKind::Json);
        let b = RequestSpec::get(Url::parse("http://10.0.0.2:4000/speaker/ada?x=1").unwrap(), ResponseKind::Json);
        assert_eq!(a.endpoint(), b.endpoint());
        assert_eq!(a.endpoint().as_str(), "GET /speaker/ada?x=1");
    }

    #[tokio::test]
    async fn test_denied_without_network_call() {
        let (breaker, _) = breaker();
        // Nothing listens here; a real attempt would come back as Failed.
        let request = RequestSpec::get(Url::parse("http://127.0.0.1:1/names").unwrap(), ResponseKind::Json);
        for _ in 0..6 {
            breaker.on_failure(&request.endpoint());
        }
        assert!(matches!(breaker.call_service(&request).await, CallOutcome::Denied));
        assert_eq!(breaker.state(&request.endpoint()).unwrap().failure_count, 6);
    }

    #[tokio::test]
    async fn test_connection_refused_is_failure() {
        let (breaker, _) = breaker();
        let request = RequestSpec::get(Url::parse("http://127.0.0.1:1/names").unwrap(), ResponseKind::Json);

        let outcome = breaker.call_service(&request).await;
        assert!(matches!(outcome, CallOutcome::Failed(_)));
        assert_eq!(breaker.state(&request.endpoint()).unwrap().failure_count, 1);
    }

    #[tokio::test]
    async fn test_silent_upstream_times_out_as_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and hold them open without ever answering.
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = BreakerConfig {
            request_timeout_ms: 100,
            ..BreakerConfig::default()
        };
        let breaker = CircuitBreaker::new(&config);
        let request = RequestSpec::get(
            Url::parse(&format!("http://{}/names", addr)).unwrap(),
            ResponseKind::Json,
        );

        let start = Instant::now();
        let outcome = breaker.call_service(&request).await;
        assert!(matches!(
            outcome,
            CallOutcome::Failed(CallError::Timeout(d)) if d == Duration::from_millis(100)
        ));
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(breaker.state(&request.endpoint()).unwrap().failure_count, 1);
    }
}
