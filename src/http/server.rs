//! Registry HTTP server.
//!
//! # Responsibilities
//! - Create Axum Router with the registry endpoints
//! - Derive the registering host from the peer address
//! - Wire up common layers (request ID, tracing, timeout)
//! - Spawn the optional background sweeper
//! - Serve until the shutdown signal fires

use axum::{
    extract::{ConnectInfo, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::DiscoveryConfig;
use crate::http::request::with_common_layers;
use crate::registry::sweeper::Sweeper;
use crate::registry::{ServiceInstance, ServiceRegistry};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ServiceRegistry>,
}

/// Body of register and unregister responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationResult {
    pub result: String,
}

/// HTTP server for the service registry.
pub struct HttpServer {
    router: Router,
    config: DiscoveryConfig,
    registry: Arc<ServiceRegistry>,
}

impl HttpServer {
    /// Create a server with a fresh registry.
    pub fn new(config: DiscoveryConfig) -> Self {
        let registry = Arc::new(ServiceRegistry::from_config(&config.registry));
        Self::with_registry(config, registry)
    }

    /// Create a server around an existing registry.
    pub fn with_registry(config: DiscoveryConfig, registry: Arc<ServiceRegistry>) -> Self {
        let state = AppState {
            registry: registry.clone(),
        };
        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            registry,
        }
    }

    fn build_router(config: &DiscoveryConfig, state: AppState) -> Router {
        let router = Router::new()
            .route(
                "/register/{name}/{version}/{port}",
                put(register_handler).delete(unregister_handler),
            )
            .route("/find/{name}/{constraint}", get(find_handler))
            .route("/services", get(services_handler))
            .route("/health", get(health_handler))
            .with_state(state);

        with_common_layers(router, Duration::from_secs(config.timeouts.request_secs))
    }

    pub fn registry(&self) -> Arc<ServiceRegistry> {
        self.registry.clone()
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            entry_timeout_secs = self.config.registry.entry_timeout_secs,
            "Registry server starting"
        );

        if self.config.registry.sweep_interval_secs > 0 {
            let sweeper = Sweeper::new(
                self.registry.clone(),
                Duration::from_secs(self.config.registry.sweep_interval_secs),
            );
            let sweeper_shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                sweeper.run(sweeper_shutdown).await;
            });
        }

        serve(listener, self.router, shutdown).await?;

        tracing::info!("Registry server stopped");
        Ok(())
    }
}

/// Serve `router` with peer addresses until `shutdown` fires.
pub(crate) async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let app = router.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}

async fn register_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path((name, version, port)): Path<(String, String, u16)>,
) -> Json<RegistrationResult> {
    let host = peer.ip().to_canonical().to_string();
    let key = state.registry.register(&name, &version, &host, port);
    Json(RegistrationResult {
        result: key.to_string(),
    })
}

async fn unregister_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path((name, version, port)): Path<(String, String, u16)>,
) -> Json<RegistrationResult> {
    let host = peer.ip().to_canonical().to_string();
    let key = state.registry.unregister(&name, &version, &host, port);
    Json(RegistrationResult {
        result: key.to_string(),
    })
}

async fn find_handler(
    State(state): State<AppState>,
    Path((name, constraint)): Path<(String, String)>,
) -> Response {
    match state.registry.get(&name, &constraint) {
        Some(instance) => Json(instance).into_response(),
        None => {
            tracing::debug!(service = %name, constraint = %constraint, "No matching instance");
            (StatusCode::NOT_FOUND, "Service not found").into_response()
        }
    }
}

async fn services_handler(State(state): State<AppState>) -> Json<Vec<ServiceInstance>> {
    Json(state.registry.instances())
}

async fn health_handler() -> &'static str {
    "ok"
}
