//! Completion service backends.

pub mod openai;
