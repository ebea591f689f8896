//! Streaming delivery: relays an upstream stream to a byte sink and commits
//! the accumulated reply back to the owning session once it completes.

#[path = "streaming/commit.rs"]
mod commit;
#[path = "streaming/handle.rs"]
mod handle;

pub use commit::ResponseCommitter;
pub use handle::StreamHandle;
