//! Observing reverse proxy.
//!
//! Mirrors the JSON endpoints of the upstream REST API, relays each call
//! through a [`crate::chat::CompletionService`] and lets a
//! [`ProxyObserver`] look at every completed exchange.

#[path = "proxy/handlers.rs"]
mod handlers;
#[path = "proxy/helpers.rs"]
mod helpers;
#[path = "proxy/observer.rs"]
mod observer;
#[path = "proxy/server.rs"]
mod server;

pub use helpers::{ApiError, ApiResult};
pub use observer::{LoggingObserver, ProxyObserver};
pub use server::Proxy;

#[cfg(test)]
#[path = "proxy/tests.rs"]
mod tests;
