//! Conference gateway.
//!
//! Public JSON and image endpoints backed by the speakers service. Any
//! `ClientError` becomes a 503; cached responses are served as normal 200s.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::client::{ClientError, Discovery, SpeakersService};
use crate::config::DiscoveryConfig;
use crate::http::request::with_common_layers;
use crate::http::server::serve;

/// HTTP server for the conference gateway.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new<D: Discovery + 'static>(
        speakers: Arc<SpeakersService<D>>,
        config: &DiscoveryConfig,
    ) -> Self {
        Self {
            router: gateway_router(speakers, config),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %listener.local_addr()?, "Gateway starting");
        serve(listener, self.router, shutdown).await?;
        tracing::info!("Gateway stopped");
        Ok(())
    }
}

pub fn gateway_router<D: Discovery + 'static>(
    speakers: Arc<SpeakersService<D>>,
    config: &DiscoveryConfig,
) -> Router {
    let router = Router::new()
        .route("/speakers/names", get(names::<D>))
        .route("/speakers/list-short", get(list_short::<D>))
        .route("/speakers/list", get(list::<D>))
        .route("/speakers/artwork", get(all_artwork::<D>))
        .route("/speakers/{id}", get(speaker::<D>))
        .route("/speakers/{id}/artwork", get(speaker_artwork::<D>))
        .route("/images/{*path}", get(image::<D>))
        .with_state(speakers);

    with_common_layers(router, Duration::from_secs(config.timeouts.request_secs))
}

type Speakers<D> = State<Arc<SpeakersService<D>>>;

async fn names<D: Discovery>(State(s): Speakers<D>) -> Response {
    json_response(s.get_names().await)
}

async fn list_short<D: Discovery>(State(s): Speakers<D>) -> Response {
    json_response(s.get_list_short().await)
}

async fn list<D: Discovery>(State(s): Speakers<D>) -> Response {
    json_response(s.get_list().await)
}

async fn all_artwork<D: Discovery>(State(s): Speakers<D>) -> Response {
    json_response(s.get_all_artwork().await)
}

async fn speaker<D: Discovery>(State(s): Speakers<D>, Path(id): Path<String>) -> Response {
    json_response(s.get_speaker(&id).await)
}

async fn speaker_artwork<D: Discovery>(State(s): Speakers<D>, Path(id): Path<String>) -> Response {
    json_response(s.get_artwork_for_speaker(&id).await)
}

async fn image<D: Discovery>(State(s): Speakers<D>, Path(path): Path<String>) -> Response {
    match s.get_image(&path).await {
        Ok(bytes) => image_response(&path, bytes),
        Err(e) => unavailable(e),
    }
}

fn json_response(result: Result<Value, ClientError>) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(e) => unavailable(e),
    }
}

fn image_response(path: &str, bytes: Bytes) -> Response {
    ([(header::CONTENT_TYPE, content_type_for(path))], bytes).into_response()
}

fn unavailable(error: ClientError) -> Response {
    tracing::warn!(error = %error, "Upstream unavailable");
    (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable").into_response()
}

fn content_type_for(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
