mod completion;
mod message;
mod source;
mod sse;
mod stream;
mod traits;
mod usage;

pub use completion::{ChatCompletionRequest, ChatCompletionResponse, Choice};
pub use message::{ChatMessage, ChatMessageBuilder, ChatRole};
pub use source::BoxedStreamSource;
pub use stream::{StreamChoice, StreamDelta, StreamResponse};
pub use traits::{CompletionService, StreamSource};
pub use usage::Usage;

pub(crate) use sse::{create_sse_stream, event_data};
