use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use reqwest::Method;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::{LoggingObserver, Proxy, ProxyObserver};
use crate::chat::{ChatCompletionRequest, ChatCompletionResponse};
use crate::config::ProxyConfig;
use crate::error::PersonaError;
use crate::testing::ScriptedService;

#[derive(Default)]
struct RecordingObserver {
    chats: AtomicUsize,
    endpoints: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl ProxyObserver for RecordingObserver {
    async fn on_chat_completion(
        &self,
        _request: &ChatCompletionRequest,
        _response: &ChatCompletionResponse,
    ) -> Result<(), PersonaError> {
        self.chats.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PersonaError::Generic("observer exploded".into()));
        }
        Ok(())
    }

    async fn on_exchange(
        &self,
        endpoint: &str,
        _request: Option<&Value>,
        _response: &Value,
    ) -> Result<(), PersonaError> {
        self.endpoints.lock().unwrap().push(endpoint.to_string());
        if self.fail {
            return Err(PersonaError::Generic("observer exploded".into()));
        }
        Ok(())
    }
}

fn router(service: &Arc<ScriptedService>, auth_key: Option<&str>) -> Router {
    let config = ProxyConfig {
        auth_key: auth_key.map(str::to_string),
        ..ProxyConfig::default()
    };
    Proxy::new(config, service.clone()).router()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn chat_body() -> Value {
    json!({
        "model": "gpt-3.5-turbo",
        "messages": [{"role": "user", "content": "ping"}],
        "user": "tester"
    })
}

#[tokio::test]
async fn chat_completion_is_relayed_and_observed() {
    let service = Arc::new(ScriptedService::new());
    service.push_reply(&["pong"]);
    let observer = Arc::new(RecordingObserver::default());
    let app = Proxy::new(ProxyConfig::default(), service.clone())
        .with_observer(observer.clone())
        .router();

    let response = app
        .oneshot(json_request("POST", "/v1/chat/completions", chat_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["choices"][0]["message"]["content"], "pong");
    assert_eq!(observer.chats.load(Ordering::SeqCst), 1);

    // unmodelled fields reach the upstream
    let sent = &service.requests()[0];
    assert_eq!(sent.extra["user"], "tester");
}

#[tokio::test]
async fn observer_failure_does_not_fail_the_reply() {
    let service = Arc::new(ScriptedService::new());
    let observer = Arc::new(RecordingObserver {
        fail: true,
        ..Default::default()
    });
    let app = Proxy::new(ProxyConfig::default(), service.clone())
        .with_observer(observer.clone())
        .router();

    let response = app
        .clone()
        .oneshot(json_request("POST", "/v1/chat/completions", chat_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(json_request("POST", "/v1/embeddings", json!({"input": "x"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(*observer.endpoints.lock().unwrap(), vec!["embeddings"]);
}

#[tokio::test]
async fn passthrough_routes_forward_method_and_path() {
    let service = Arc::new(ScriptedService::new());
    let app = router(&service, None);

    let cases = [
        ("GET", "/v1/models", "models"),
        ("GET", "/v1/models/gpt-4", "models/gpt-4"),
        ("DELETE", "/v1/files/file-1", "files/file-1"),
        ("POST", "/v1/fine-tunes/ft-1/cancel", "fine-tunes/ft-1/cancel"),
        ("GET", "/v1/fine-tunes/ft-1/events", "fine-tunes/ft-1/events"),
    ];
    for (method, uri, _) in cases {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{method} {uri}");
        let body = read_json(response).await;
        assert_eq!(body["body"], Value::Null);
    }

    let forwarded = service.forwarded();
    assert_eq!(forwarded.len(), cases.len());
    for ((method, _, path), (sent_method, sent_path, _)) in cases.iter().zip(&forwarded) {
        assert_eq!(sent_method, &Method::from_bytes(method.as_bytes()).unwrap());
        assert_eq!(sent_path, path);
    }
}

#[tokio::test]
async fn json_bodies_are_passed_through() {
    let service = Arc::new(ScriptedService::new());
    let app = router(&service, None);
    let payload = json!({"model": "text-moderation-latest", "input": "hello"});

    let response = app
        .oneshot(json_request("POST", "/v1/moderations", payload.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["body"], payload);
}

#[tokio::test]
async fn auth_key_is_enforced() {
    let service = Arc::new(ScriptedService::new());
    let app = router(&service, Some("local-secret"));

    let response = app
        .clone()
        .oneshot(json_request("POST", "/v1/chat/completions", chat_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["message"], "Missing authorization");

    let request = Request::builder()
        .uri("/v1/models")
        .header("authorization", "Bearer local-secret")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn malformed_and_streaming_requests_are_rejected() {
    let service = Arc::new(ScriptedService::new());
    let app = router(&service, None);

    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut body = chat_body();
    body["stream"] = json!(true);
    let response = app
        .oneshot(json_request("POST", "/v1/chat/completions", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn upstream_failure_is_a_bad_gateway() {
    let service = Arc::new(ScriptedService::new());
    service.push_error(PersonaError::HttpError("connection refused".into()));
    let app = router(&service, None);

    let response = app
        .oneshot(json_request("POST", "/v1/chat/completions", chat_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = read_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn verify_upstream_counts_models() {
    let service = Arc::new(ScriptedService::new());
    let proxy = Proxy::new(ProxyConfig::default(), service.clone());
    // the scripted service echoes the request, which carries no model list
    assert_eq!(proxy.verify_upstream().await.unwrap(), 0);
    assert_eq!(service.forwarded()[0].1, "models");
}

#[tokio::test]
async fn logging_observer_can_be_silenced() {
    let request = ChatCompletionRequest::default();
    let response = ChatCompletionResponse::default();
    let quiet = LoggingObserver::all_disabled();
    assert!(!quiet.is_enabled());
    quiet.on_chat_completion(&request, &response).await.unwrap();
    LoggingObserver::new()
        .on_exchange("models", None, &json!({"data": []}))
        .await
        .unwrap();
}

#[tokio::test]
async fn serve_stops_on_shutdown() {
    let service = Arc::new(ScriptedService::new());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy = Proxy::new(ProxyConfig::default(), service);
    proxy.serve_on(listener, async {}).await.unwrap();
}
