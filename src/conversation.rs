//! Persona sessions: the transcript, its commit state and the operations
//! that drive it.

#[path = "conversation/manager.rs"]
mod manager;
#[path = "conversation/preset.rs"]
mod preset;
#[path = "conversation/state.rs"]
mod state;

pub use manager::Conversation;
pub use preset::Preset;
pub use state::{Pending, SessionState};

#[cfg(test)]
#[path = "conversation/tests.rs"]
mod tests;
