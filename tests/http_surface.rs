//! Request classification and the non-relay treatments.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;

use edge_relay::api::{ApiDelegate, ApiError};
use edge_relay::config::RelayConfig;
use edge_relay::{HttpServer, Shutdown};

mod common;

/// Answers every request with the path it saw, or fails with a fixed error.
#[derive(Default)]
struct RecordingDelegate {
    seen: Mutex<Vec<String>>,
    fail_with: Option<StatusCode>,
}

#[async_trait]
impl ApiDelegate for RecordingDelegate {
    async fn handle(&self, request: Request<Body>) -> Result<Response, ApiError> {
        let path = request.uri().path().to_string();
        self.seen.lock().unwrap().push(path.clone());
        match self.fail_with {
            Some(status) => Err(ApiError::with_status(status, "slow down")),
            None => Ok(Response::new(Body::from(format!("delegated {path}")))),
        }
    }
}

fn config_for(root: &Path) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.assets.root = root.to_string_lossy().into_owned();
    config
}

fn router_with(root: &Path, delegate: Arc<RecordingDelegate>) -> Router {
    HttpServer::with_api_delegate(config_for(root), Shutdown::new(), delegate)
        .unwrap()
        .router()
}

async fn body_of(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn get(router: &Router, path: &str) -> Response {
    router
        .clone()
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn options_is_a_preflight_on_any_path() {
    let dir = tempfile::tempdir().unwrap();
    let delegate = Arc::new(RecordingDelegate::default());
    let router = router_with(dir.path(), delegate.clone());

    for path in ["/", "/v1/chat/completions", "/ws/stream", "/missing.css"] {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri(path)
            .header(header::UPGRADE, "websocket")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK, "{path}");
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, POST, OPTIONS");
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
            "Content-Type, Authorization"
        );
        assert!(body_of(response).await.is_empty());
    }
    assert!(delegate.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn root_and_index_are_the_same_document() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>relay</h1>").unwrap();
    let router = router_with(dir.path(), Arc::default());

    let root = get(&router, "/").await;
    let index = get(&router, "/index.html").await;

    for response in [&root, &index] {
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html;charset=UTF-8");
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=31536000"
        );
    }
    assert_eq!(body_of(root).await, body_of(index).await);
}

#[tokio::test]
async fn assets_get_their_content_type() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("css")).unwrap();
    std::fs::write(dir.path().join("css/site.css"), "body{}").unwrap();
    std::fs::write(dir.path().join("notes.bin"), [1u8, 2, 3]).unwrap();
    let router = router_with(dir.path(), Arc::default());

    let css = get(&router, "/css/site.css").await;
    assert_eq!(css.headers()[header::CONTENT_TYPE], "text/css;charset=UTF-8");
    assert_eq!(body_of(css).await, b"body{}");

    let other = get(&router, "/notes.bin").await;
    assert_eq!(other.headers()[header::CONTENT_TYPE], "text/plain;charset=UTF-8");
}

#[tokio::test]
async fn api_suffixes_go_to_the_delegate_even_over_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("v1/chat")).unwrap();
    std::fs::write(dir.path().join("v1/chat/completions"), "static copy").unwrap();
    let delegate = Arc::new(RecordingDelegate::default());
    let router = router_with(dir.path(), delegate.clone());

    let response = get(&router, "/v1/chat/completions").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_of(response).await, b"delegated /v1/chat/completions");

    let embeddings = router
        .clone()
        .oneshot(
            Request::post("/v1beta/embeddings")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(embeddings.status(), StatusCode::OK);
    get(&router, "/v1/models").await;

    assert_eq!(
        *delegate.seen.lock().unwrap(),
        vec!["/v1/chat/completions", "/v1beta/embeddings", "/v1/models"]
    );
}

#[tokio::test]
async fn delegate_failure_keeps_its_status() {
    let dir = tempfile::tempdir().unwrap();
    let delegate = Arc::new(RecordingDelegate {
        fail_with: Some(StatusCode::TOO_MANY_REQUESTS),
        ..Default::default()
    });
    let router = router_with(dir.path(), delegate);

    let response = get(&router, "/v1/chat/completions").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain;charset=UTF-8");
    assert_eq!(body_of(response).await, b"slow down");
}

#[tokio::test]
async fn api_without_backend_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let router = HttpServer::new(config_for(dir.path()), Shutdown::new())
        .unwrap()
        .router();

    let response = get(&router, "/v1/models").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn missing_asset_uses_custom_404_page() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("404.html"), "<p>gone</p>").unwrap();
    let router = router_with(dir.path(), Arc::default());

    let response = get(&router, "/nope.js").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html;charset=UTF-8");
    assert_eq!(body_of(response).await, b"<p>gone</p>");
}

#[tokio::test]
async fn missing_asset_without_404_page_is_plain_text() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(dir.path(), Arc::default());

    for path in ["/", "/nope.js", "/../etc/passwd"] {
        let response = get(&router, path).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
        assert_eq!(body_of(response).await, b"Not Found");
    }
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_with(dir.path(), Arc::default());

    let generated = get(&router, "/").await;
    let id = generated.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(id.len(), 36);

    let request = Request::get("/")
        .header("x-request-id", "caller-chosen")
        .body(Body::empty())
        .unwrap();
    let echoed = router.clone().oneshot(request).await.unwrap();
    assert_eq!(echoed.headers()["x-request-id"], "caller-chosen");
}

#[tokio::test]
async fn served_over_a_real_socket() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>relay</h1>").unwrap();
    let mut config = config_for(dir.path());
    config.upstream.endpoint = format!("ws://{}", common::closed_port());
    let relay = common::spawn_relay(config).await;

    let client = reqwest::Client::new();
    let response = client.get(relay.http_url("/")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.text().await.unwrap(), "<h1>relay</h1>");

    let preflight = client
        .request(reqwest::Method::OPTIONS, relay.http_url("/anything"))
        .send()
        .await
        .unwrap();
    assert_eq!(preflight.status(), reqwest::StatusCode::OK);
    assert_eq!(preflight.headers()["access-control-allow-origin"], "*");

    relay.shutdown.trigger();
    let stopped = tokio::time::timeout(common::WAIT, relay.handle).await;
    assert!(matches!(stopped, Ok(Ok(Ok(())))));
}
