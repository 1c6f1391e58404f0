//! Guardrail rejections: no origin contact and no exchange record.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use intercept_proxy::store::{MemoryStore, Route, RouteStore, StoreError, Stores, SYSTEM_OWNER};

mod common;
use common::{client, test_config, MockResponse, TestProxy};

async fn counting_backend() -> (std::net::SocketAddr, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let addr = common::start_programmable_backend(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { MockResponse::json("{\"ok\":true}") }
    })
    .await;
    (addr, calls)
}

/// Route store that counts lookups made by the proxy path.
struct CountingRoutes {
    inner: Arc<MemoryStore>,
    gets: AtomicU32,
}

#[async_trait]
impl RouteStore for CountingRoutes {
    async fn get(&self, code: &str) -> Result<Option<Route>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(code).await
    }

    async fn list(&self, owner: Option<&str>) -> Result<Vec<Route>, StoreError> {
        self.inner.list(owner).await
    }

    async fn insert(&self, route: Route) -> Result<Route, StoreError> {
        self.inner.insert(route).await
    }

    async fn set_active(&self, code: &str, active: bool) -> Result<Option<Route>, StoreError> {
        self.inner.set_active(code, active).await
    }

    async fn delete(&self, code: &str) -> Result<bool, StoreError> {
        self.inner.delete(code).await
    }
}

#[tokio::test]
async fn guardrail_rejections_skip_route_lookup() {
    let (origin, calls) = counting_backend().await;
    let mut config = test_config();
    config.guardrails.max_body_bytes = 1024;
    config.rate_limit.max_requests = 2;

    let store = Arc::new(MemoryStore::new(config.store.max_records_per_route, None));
    let routes = Arc::new(CountingRoutes {
        inner: store.clone(),
        gets: AtomicU32::new(0),
    });
    let mut stores = Stores::in_memory(store.clone());
    stores.routes = routes.clone();
    let proxy = TestProxy::start_with_stores(config, store, stores).await;
    proxy.add_route("look01", origin, SYSTEM_OWNER).await;

    let res = client()
        .post(proxy.url("/look01/upload"))
        .header("content-type", "application/json")
        .body(vec![b'a'; 2048])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 413);
    assert_eq!(routes.gets.load(Ordering::SeqCst), 0);

    let res = client().get(proxy.url("/look01/ping")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(routes.gets.load(Ordering::SeqCst), 1);

    let res = client().get(proxy.url("/look01/ping")).send().await.unwrap();
    assert_eq!(res.status(), 429);
    assert_eq!(routes.gets.load(Ordering::SeqCst), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn oversized_declared_length_is_413() {
    let (origin, calls) = counting_backend().await;
    let mut config = test_config();
    config.guardrails.max_body_bytes = 1024;
    let proxy = TestProxy::start(config).await;
    proxy.add_route("big001", origin, SYSTEM_OWNER).await;

    let res = client()
        .post(proxy.url("/big001/upload"))
        .header("content-type", "application/json")
        .body(vec![b'a'; 2048])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 413);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "ClientError");

    // Within the ceiling passes.
    let res = client()
        .post(proxy.url("/big001/upload"))
        .header("content-type", "application/json")
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let records = proxy.wait_for_records("big001", 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].request_body.as_deref(), Some("{}"));
}

#[tokio::test]
async fn rate_limit_rejects_then_recovers() {
    let (origin, calls) = counting_backend().await;
    let mut config = test_config();
    config.rate_limit.max_requests = 3;
    config.rate_limit.window_secs = 1;
    let proxy = TestProxy::start(config).await;
    proxy.add_route("rate01", origin, SYSTEM_OWNER).await;

    for _ in 0..3 {
        let res = client().get(proxy.url("/rate01/ping")).send().await.unwrap();
        assert_eq!(res.status(), 200);
    }
    let res = client().get(proxy.url("/rate01/ping")).send().await.unwrap();
    assert_eq!(res.status(), 429);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "RateLimited");
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let res = client().get(proxy.url("/rate01/ping")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    let records = proxy.wait_for_records("rate01", 4).await;
    assert_eq!(records.len(), 4);
}

#[tokio::test]
async fn strict_content_type_policy_is_415() {
    let (origin, calls) = counting_backend().await;
    let mut config = test_config();
    config.guardrails.reject_unloggable_content_types = true;
    let proxy = TestProxy::start(config).await;
    proxy.add_route("ct0001", origin, SYSTEM_OWNER).await;

    let res = client()
        .post(proxy.url("/ct0001/upload"))
        .header("content-type", "application/octet-stream")
        .body(vec![0u8; 16])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 415);

    let res = client().get(proxy.url("/ct0001/plain")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn lenient_content_type_policy_forwards_without_logging_body() {
    let (origin, _calls) = counting_backend().await;
    let proxy = TestProxy::start(test_config()).await;
    proxy.add_route("ct0002", origin, SYSTEM_OWNER).await;

    let res = client()
        .post(proxy.url("/ct0002/upload"))
        .header("content-type", "application/octet-stream")
        .body(vec![1u8; 16])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let records = proxy.wait_for_records("ct0002", 1).await;
    assert_eq!(records.len(), 1);
    assert!(records[0].request_body.is_none());
    assert_eq!(records[0].response_status, 200);
}
