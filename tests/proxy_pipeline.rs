//! End-to-end tests for the proxy hop and exchange capture.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use intercept_proxy::http::capture::NON_LOGGABLE_PLACEHOLDER;
use intercept_proxy::store::{ExchangeOutcome, ExchangeStore, RouteStore, SYSTEM_OWNER};

mod common;
use common::{client, test_config, MockResponse, TestProxy};

#[tokio::test]
async fn proxies_and_logs_a_json_exchange() {
    let seen_request = Arc::new(Mutex::new(String::new()));
    let seen = seen_request.clone();
    let origin = common::start_programmable_backend(move |request| {
        *seen.lock().unwrap() = request;
        async { MockResponse::json("{\"id\":7}") }
    })
    .await;

    let proxy = TestProxy::start(test_config()).await;
    proxy.add_route("ab12cd", origin, SYSTEM_OWNER).await;

    let res = client().get(proxy.url("/ab12cd/users/7")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    let request_id = res.headers()["x-request-id"].to_str().unwrap().to_string();
    assert_eq!(res.text().await.unwrap(), "{\"id\":7}");

    assert!(seen_request.lock().unwrap().starts_with("GET /users/7 HTTP/1.1"));

    let records = proxy.wait_for_records("ab12cd", 1).await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.request_id, request_id);
    assert_eq!(record.method, "GET");
    assert_eq!(record.original_request_path, "/ab12cd/users/7");
    assert_eq!(record.resolved_origin_url, format!("http://{}/users/7", origin));
    assert_eq!(record.response_status, 200);
    assert_eq!(record.response_body, "{\"id\":7}");
    assert_eq!(record.outcome, ExchangeOutcome::Completed);
    assert!(record.request_body.is_none());
}

#[tokio::test]
async fn query_string_and_json_request_body_are_kept() {
    let origin = common::start_echo_backend().await;
    let proxy = TestProxy::start(test_config()).await;
    proxy.add_route("qs0001", origin, SYSTEM_OWNER).await;

    let res = client()
        .post(proxy.url("/qs0001/search?q=rust&page=2"))
        .header("content-type", "application/json")
        .body("{\"term\":\"proxy\"}")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let echoed = res.text().await.unwrap();
    assert!(echoed.starts_with("POST /search?q=rust&page=2 HTTP/1.1"));
    assert!(echoed.ends_with("{\"term\":\"proxy\"}"));

    let records = proxy.wait_for_records("qs0001", 1).await;
    assert_eq!(records[0].original_request_path, "/qs0001/search?q=rust&page=2");
    assert_eq!(records[0].request_body.as_deref(), Some("{\"term\":\"proxy\"}"));
}

#[tokio::test]
async fn inactive_route_is_404_without_origin_contact() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let origin = common::start_programmable_backend(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { MockResponse::json("{}") }
    })
    .await;

    let proxy = TestProxy::start(test_config()).await;
    proxy.add_route("off001", origin, SYSTEM_OWNER).await;
    proxy.store.set_active("off001", false).await.unwrap();

    for method in [reqwest::Method::GET, reqwest::Method::POST, reqwest::Method::DELETE] {
        let res = client()
            .request(method, proxy.url("/off001/anything"))
            .body("payload")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 404);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "NotFound");
    }

    let never = client().get(proxy.url("/never1/anything")).send().await.unwrap();
    assert_eq!(never.status(), 404);
    let body: serde_json::Value = never.json().await.unwrap();
    assert_eq!(body["message"], "Interceptor not found");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(proxy.store.list_for_route("off001", 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_origin_is_upstream_failure() {
    let dead = common::unused_addr().await;
    let proxy = TestProxy::start(test_config()).await;
    proxy.add_route("dead01", dead, SYSTEM_OWNER).await;

    let res = client().get(proxy.url("/dead01/users/7")).send().await.unwrap();
    assert_eq!(res.status(), 500);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "UpstreamFailure");
    assert!(body["details"].is_string());
    assert!(body["requestId"].is_string());

    let records = proxy.wait_for_records("dead01", 1).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, ExchangeOutcome::UpstreamFailure);
    assert_eq!(records[0].response_status, 500);
    assert!(records[0].error.is_some());
}

#[tokio::test]
async fn forward_headers_follow_policy() {
    let origin = common::start_echo_backend().await;
    let proxy = TestProxy::start(test_config()).await;
    proxy.add_route("hdr001", origin, SYSTEM_OWNER).await;

    let res = client()
        .get(proxy.url("/hdr001/inspect"))
        .header("authorization", "Bearer origin-token")
        .header("cookie", "session=secret")
        .header("origin", "http://evil.example")
        .header("referer", "http://evil.example/page")
        .header("x-forwarded-for", "1.2.3.4")
        .header("x-custom", "dropped")
        .header("accept", "application/json")
        .send()
        .await
        .unwrap();
    let echoed = res.text().await.unwrap().to_ascii_lowercase();

    assert!(echoed.contains(&format!("host: {}", origin)));
    assert!(echoed.contains("x-forwarded-for: 127.0.0.1"));
    assert!(!echoed.contains("1.2.3.4"));
    assert!(echoed.contains("x-forwarded-proto: http"));
    assert!(echoed.contains(&format!("x-forwarded-host: {}", proxy.addr)));
    assert!(echoed.contains("authorization: bearer origin-token"));
    assert!(echoed.contains("accept: application/json"));
    assert!(!echoed.contains("cookie"));
    assert!(!echoed.contains("evil.example"));
    assert!(!echoed.contains("x-custom"));

    let records = proxy.wait_for_records("hdr001", 1).await;
    let logged = &records[0].sanitized_request_headers;
    assert!(!logged.contains_key("authorization"));
    assert!(!logged.contains_key("cookie"));
    assert!(!logged.contains_key("x-forwarded-for"));
    assert_eq!(logged.get("x-custom").map(String::as_str), Some("dropped"));
}

#[tokio::test]
async fn binary_response_is_relayed_but_not_logged() {
    let png = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0xff];
    let origin = common::start_mock_backend(MockResponse {
        status: 200,
        content_type: "image/png",
        body: png.clone(),
    })
    .await;

    let proxy = TestProxy::start(test_config()).await;
    proxy.add_route("img001", origin, SYSTEM_OWNER).await;

    let res = client().get(proxy.url("/img001/logo.png")).send().await.unwrap();
    assert_eq!(res.headers()["content-type"], "image/png");
    assert_eq!(res.bytes().await.unwrap().to_vec(), png);

    let records = proxy.wait_for_records("img001", 1).await;
    assert_eq!(records[0].response_body, NON_LOGGABLE_PLACEHOLDER);
}

#[tokio::test]
async fn origin_error_status_is_streamed_through() {
    let origin = common::start_mock_backend(MockResponse {
        status: 503,
        content_type: "application/json",
        body: b"{\"error\":\"maintenance\"}".to_vec(),
    })
    .await;

    let proxy = TestProxy::start(test_config()).await;
    proxy.add_route("err503", origin, SYSTEM_OWNER).await;

    let res = client().get(proxy.url("/err503/")).send().await.unwrap();
    assert_eq!(res.status(), 503);
    assert_eq!(res.text().await.unwrap(), "{\"error\":\"maintenance\"}");

    let records = proxy.wait_for_records("err503", 1).await;
    assert_eq!(records[0].response_status, 503);
    assert_eq!(records[0].outcome, ExchangeOutcome::Completed);
}

#[tokio::test]
async fn preflight_never_reaches_origin() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let origin = common::start_programmable_backend(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { MockResponse::json("{}") }
    })
    .await;

    let proxy = TestProxy::start(test_config()).await;
    proxy.add_route("cors01", origin, SYSTEM_OWNER).await;

    let res = client()
        .request(reqwest::Method::OPTIONS, proxy.url("/cors01/users"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["access-control-max-age"], "86400");
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    assert!(res.text().await.unwrap().is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
