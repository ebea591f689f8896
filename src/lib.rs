//! Persona-driven chat sessions over an OpenAI-compatible completion API.
//!
//! A [`conversation::Conversation`] owns one transcript and the rules for
//! growing it: queries, edits of earlier turns, system directives and the
//! commit of multi-choice or streamed replies. [`personas`] wraps it in the
//! three delivery flavours (plain text, choice list, stream) and [`proxy`]
//! exposes an observing reverse proxy in front of the same upstream.
//!
//! ```no_run
//! # async fn demo() -> Result<(), gpeasy::PersonaError> {
//! use gpeasy::{ClientConfig, Preset, SimpleChat};
//!
//! let config = ClientConfig::from_env(None, None)?;
//! let persona = SimpleChat::with_config(&config)?;
//! persona.init(Preset::Generic, "").await?;
//! let answer = persona.query("What is a borrow checker?").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod error;
pub mod personas;
#[cfg(feature = "proxy")]
pub mod proxy;
pub mod streaming;

#[cfg(test)]
mod testing;

pub use chat::{ChatMessage, ChatRole, CompletionService};
pub use config::{AppConfig, ClientConfig, ProxyConfig};
pub use conversation::{Conversation, Preset};
pub use error::PersonaError;
pub use personas::{AdvancedChat, AdvancedChatStream, Persona, SimpleChat};
pub use streaming::StreamHandle;
