use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use reqwest::Method;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::chat::CompletionService;
use crate::config::ProxyConfig;
use crate::error::PersonaError;

use super::handlers::{handle_chat_completion, handle_passthrough, ProxyState};
use super::observer::{LoggingObserver, ProxyObserver};

/// Reverse proxy in front of a completion service.
pub struct Proxy {
    config: ProxyConfig,
    service: Arc<dyn CompletionService>,
    observer: Option<Arc<dyn ProxyObserver>>,
}

impl Proxy {
    /// With `log_exchanges` set, a [`LoggingObserver`] is installed until
    /// [`Proxy::with_observer`] replaces it.
    pub fn new(config: ProxyConfig, service: Arc<dyn CompletionService>) -> Self {
        let observer: Option<Arc<dyn ProxyObserver>> = if config.log_exchanges {
            Some(Arc::new(LoggingObserver::new()))
        } else {
            None
        };
        Self {
            config,
            service,
            observer,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProxyObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn router(&self) -> Router {
        let state = ProxyState {
            service: self.service.clone(),
            observer: self.observer.clone(),
            auth_key: self.config.auth_key.clone(),
        };
        Router::new()
            .route("/v1/chat/completions", post(handle_chat_completion))
            .route("/v1/models", get(handle_passthrough))
            .route("/v1/models/:model", get(handle_passthrough))
            .route("/v1/completions", post(handle_passthrough))
            .route("/v1/edits", post(handle_passthrough))
            .route("/v1/images/generations", post(handle_passthrough))
            .route("/v1/embeddings", post(handle_passthrough))
            .route("/v1/moderations", post(handle_passthrough))
            .route("/v1/files", get(handle_passthrough))
            .route(
                "/v1/files/:id",
                get(handle_passthrough).delete(handle_passthrough),
            )
            .route(
                "/v1/fine-tunes",
                get(handle_passthrough).post(handle_passthrough),
            )
            .route(
                "/v1/fine-tunes/:id",
                get(handle_passthrough).delete(handle_passthrough),
            )
            .route("/v1/fine-tunes/:id/cancel", post(handle_passthrough))
            .route("/v1/fine-tunes/:id/events", get(handle_passthrough))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Lists the upstream models once, so a bad key or base URL shows up at
    /// startup rather than on the first client call.
    pub async fn verify_upstream(&self) -> Result<usize, PersonaError> {
        let models = self.service.forward(Method::GET, "models", None).await?;
        let ids: Vec<&str> = models["data"]
            .as_array()
            .map(|data| data.iter().filter_map(|m| m["id"].as_str()).collect())
            .unwrap_or_default();
        for id in &ids {
            log::info!("upstream model: {id}");
        }
        Ok(ids.len())
    }

    /// Serves until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), PersonaError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.socket_addr();
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        log::info!("proxy listening on {addr}");
        self.serve_on(listener, shutdown).await
    }

    /// Serves on an already bound listener.
    pub async fn serve_on<F>(
        self,
        listener: tokio::net::TcpListener,
        shutdown: F,
    ) -> Result<(), PersonaError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        log::info!("proxy stopped");
        Ok(())
    }
}
