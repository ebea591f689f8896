use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::Json;

use crate::chat::{ChatCompletionRequest, ChatCompletionResponse, CompletionService};

use super::helpers::{bad_request, parse_body, upstream_error, validate_auth, ApiResult};
use super::observer::ProxyObserver;

const API_PREFIX: &str = "/v1/";

#[derive(Clone)]
pub(crate) struct ProxyState {
    pub service: Arc<dyn CompletionService>,
    pub observer: Option<Arc<dyn ProxyObserver>>,
    pub auth_key: Option<String>,
}

pub(crate) async fn handle_chat_completion(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<ChatCompletionResponse>> {
    validate_auth(state.auth_key.as_deref(), &headers)?;
    let request: ChatCompletionRequest = serde_json::from_slice(&body)
        .map_err(|e| bad_request(format!("Invalid chat completion request: {e}")))?;
    if request.stream {
        return Err(bad_request("Streaming responses are not relayed by this proxy"));
    }
    log::debug!(
        "relaying chat completion for {} ({} messages)",
        request.model,
        request.messages.len()
    );

    let response = state
        .service
        .create_chat_completion(&request)
        .await
        .map_err(|e| {
            log::error!("chat completion failed: {e}");
            upstream_error(e)
        })?;

    if let Some(observer) = &state.observer {
        if let Err(e) = observer.on_chat_completion(&request, &response).await {
            log::warn!("observer failed on chat/completions: {e}");
        }
    }
    Ok(Json(response))
}

/// Relays any other JSON endpoint unchanged.
pub(crate) async fn handle_passthrough(
    State(state): State<ProxyState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<serde_json::Value>> {
    validate_auth(state.auth_key.as_deref(), &headers)?;
    let endpoint = uri
        .path()
        .strip_prefix(API_PREFIX)
        .ok_or_else(|| bad_request(format!("Unsupported path {}", uri.path())))?
        .to_string();
    let request = parse_body(&body)?;
    log::debug!("relaying {method} {endpoint}");

    let response = state
        .service
        .forward(method, &endpoint, request.clone())
        .await
        .map_err(|e| {
            log::error!("{endpoint} failed: {e}");
            upstream_error(e)
        })?;

    if let Some(observer) = &state.observer {
        if let Err(e) = observer
            .on_exchange(&endpoint, request.as_ref(), &response)
            .await
        {
            log::warn!("observer failed on {endpoint}: {e}");
        }
    }
    Ok(Json(response))
}
