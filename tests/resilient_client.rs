//! Resilient client and gateway tests against mock speakers backends.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use service_discovery::cache::DiskCache;
use service_discovery::client::{ClientError, ResilientClient, SpeakersService};
use service_discovery::config::{BreakerConfig, DiscoveryConfig};
use service_discovery::http::GatewayServer;
use service_discovery::registry::ServiceRegistry;
use service_discovery::resilience::circuit_breaker::{CircuitBreaker, CircuitStatus, EndpointKey};

mod common;

const SERVICE: &str = "speakers-service";

fn speakers(
    registry: Arc<ServiceRegistry>,
    cache_dir: &std::path::Path,
) -> SpeakersService<Arc<ServiceRegistry>> {
    SpeakersService::new(ResilientClient::new(
        registry,
        Arc::new(CircuitBreaker::new(&BreakerConfig::default())),
        DiskCache::new(cache_dir, Duration::from_secs(1)),
        SERVICE,
        "^1.0.0",
    ))
}

#[tokio::test]
async fn test_open_breaker_serves_cache_without_network() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    let backend = common::start_programmable_backend(move |_path| {
        let c = c.clone();
        async move {
            if c.fetch_add(1, Ordering::SeqCst) == 0 {
                (200, r#"["ada","grace"]"#.to_string())
            } else {
                (500, "boom".to_string())
            }
        }
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ServiceRegistry::default());
    registry.register(SERVICE, "1.0.0", "127.0.0.1", backend.addr.port());
    let service = speakers(registry, dir.path());
    let expected = json!(["ada", "grace"]);

    assert_eq!(service.get_names().await.unwrap(), expected);

    // Six consecutive failures, each answered from cache.
    for _ in 0..6 {
        assert_eq!(service.get_names().await.unwrap(), expected);
    }
    assert_eq!(backend.hits(), 7);

    let endpoint = EndpointKey::new(&Method::GET, "/names");
    let state = service.client().breaker().state(&endpoint).unwrap();
    assert_eq!(state.status, CircuitStatus::Open);
    assert_eq!(state.failure_count, 6);

    // Open circuit: cached response, no request reaches the backend.
    assert_eq!(service.get_names().await.unwrap(), expected);
    assert_eq!(backend.hits(), 7);
}

#[tokio::test]
async fn test_success_populates_cache_for_later_failure() {
    let healthy = Arc::new(AtomicBool::new(true));
    let h = healthy.clone();
    let backend = common::start_programmable_backend(move |path| {
        let h = h.clone();
        async move {
            if h.load(Ordering::SeqCst) && path == "/speaker/ada" {
                (200, r#"{"name":"Ada Lovelace","talks":2}"#.to_string())
            } else {
                (503, "down".to_string())
            }
        }
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ServiceRegistry::default());
    registry.register(SERVICE, "1.4.2", "127.0.0.1", backend.addr.port());
    let service = speakers(registry, dir.path());

    let fresh = service.get_speaker("ada").await.unwrap();
    assert_eq!(fresh, json!({"name": "Ada Lovelace", "talks": 2}));

    healthy.store(false, Ordering::SeqCst);
    let stale = service.get_speaker("ada").await.unwrap();
    assert_eq!(stale, fresh);
    assert_eq!(backend.hits(), 2);

    // Another endpoint has no cached value to fall back on.
    let err = service.get_speaker("grace").await.unwrap_err();
    assert!(matches!(err, ClientError::Unavailable { .. }));
}

#[tokio::test]
async fn test_uncached_image_with_open_breaker_is_unavailable() {
    let backend = common::start_programmable_backend(|_path| async { (500, "boom".to_string()) }).await;

    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ServiceRegistry::default());
    registry.register(SERVICE, "1.0.0", "127.0.0.1", backend.addr.port());
    let service = speakers(registry, dir.path());

    for _ in 0..6 {
        assert!(service.get_image("ada.png").await.is_err());
    }
    assert_eq!(backend.hits(), 6);

    let err = service.get_image("ada.png").await.unwrap_err();
    assert!(matches!(err, ClientError::Unavailable { .. }));
    assert_eq!(backend.hits(), 6);
    assert_eq!(std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0), 0);
}

#[tokio::test]
async fn test_image_served_from_disk_after_failure() {
    let healthy = Arc::new(AtomicBool::new(true));
    let h = healthy.clone();
    let backend = common::start_programmable_backend(move |_path| {
        let h = h.clone();
        async move {
            if h.load(Ordering::SeqCst) {
                (200, "PNGDATA".to_string())
            } else {
                (500, "boom".to_string())
            }
        }
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ServiceRegistry::default());
    registry.register(SERVICE, "1.0.0", "127.0.0.1", backend.addr.port());
    let service = speakers(registry, dir.path());

    let fresh = service.get_image("speakers/ada.png").await.unwrap();
    assert_eq!(&fresh[..], b"PNGDATA");

    healthy.store(false, Ordering::SeqCst);
    let stale = service.get_image("speakers/ada.png").await.unwrap();
    assert_eq!(stale, fresh);
}

#[tokio::test]
async fn test_cache_is_shared_across_instances() {
    let backend =
        common::start_programmable_backend(|_path| async { (200, r#"[{"id":1}]"#.to_string()) }).await;

    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ServiceRegistry::default());
    registry.register(SERVICE, "1.0.0", "127.0.0.1", backend.addr.port());
    let service = speakers(registry.clone(), dir.path());

    let fresh = service.get_list().await.unwrap();

    // Replace the live instance with one that refuses connections.
    registry.unregister(SERVICE, "1.0.0", "127.0.0.1", backend.addr.port());
    registry.register(SERVICE, "1.0.1", "127.0.0.1", 1);

    assert_eq!(service.get_list().await.unwrap(), fresh);
}

#[tokio::test]
async fn test_no_matching_version_is_service_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ServiceRegistry::default());
    registry.register(SERVICE, "2.0.0", "127.0.0.1", 4100);
    let service = speakers(registry, dir.path());

    let err = service.get_list_short().await.unwrap_err();
    assert!(matches!(err, ClientError::ServiceUnavailable { .. }));
}

async fn start_gateway(
    service: SpeakersService<Arc<ServiceRegistry>>,
) -> (std::net::SocketAddr, broadcast::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = broadcast::channel(1);
    let server = GatewayServer::new(Arc::new(service), &DiscoveryConfig::default());
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    (addr, tx)
}

#[tokio::test]
async fn test_gateway_routes() {
    let backend = common::start_programmable_backend(|path| async move {
        match path.as_str() {
            "/names" => (200, r#"["ada"]"#.to_string()),
            "/artwork/ada" => (200, r#"{"ada":"ada.png"}"#.to_string()),
            "/images/ada.png" => (200, "PNGDATA".to_string()),
            _ => (404, "missing".to_string()),
        }
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ServiceRegistry::default());
    registry.register(SERVICE, "1.0.0", "127.0.0.1", backend.addr.port());
    let (addr, shutdown) = start_gateway(speakers(registry, dir.path())).await;
    let client = common::test_client();

    let res = client.get(format!("http://{}/speakers/names", addr)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.json::<serde_json::Value>().await.unwrap(), json!(["ada"]));

    let res = client
        .get(format!("http://{}/speakers/ada/artwork", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.json::<serde_json::Value>().await.unwrap(), json!({"ada": "ada.png"}));

    let res = client.get(format!("http://{}/images/ada.png", addr)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "image/png");
    assert_eq!(&res.bytes().await.unwrap()[..], b"PNGDATA");

    // Upstream 404 with nothing cached.
    let res = client.get(format!("http://{}/speakers/list", addr)).send().await.unwrap();
    assert_eq!(res.status(), 503);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn test_gateway_without_instances_returns_503() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, shutdown) = start_gateway(speakers(Arc::new(ServiceRegistry::default()), dir.path())).await;
    let client = common::test_client();

    let res = client.get(format!("http://{}/speakers/names", addr)).send().await.unwrap();
    assert_eq!(res.status(), 503);

    let _ = shutdown.send(());
}
