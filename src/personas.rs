//! Ready-made persona flavours over [`crate::conversation::Conversation`],
//! differing only in how a reply is handed back.

#[path = "personas/mode.rs"]
mod mode;
#[path = "personas/persona.rs"]
mod persona;

pub use mode::{ChoicesMode, ResponseMode, StreamMode, TextMode};
pub use persona::Persona;

/// Returns the reply text, settling multi-choice replies on the first one.
pub type SimpleChat = Persona<TextMode>;
/// Returns every choice; the caller commits one when there are several.
pub type AdvancedChat = Persona<ChoicesMode>;
/// Returns a [`crate::streaming::StreamHandle`] to drain.
pub type AdvancedChatStream = Persona<StreamMode>;
