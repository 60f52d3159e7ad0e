//! Language-model access
//!
//! The model is an opaque collaborator: it gets a prompt and returns text.
//! Turning that text into a decision is the interpreter's job, not ours.

pub mod client;

pub use client::{ChatClient, ChatCompletion, ChatMessage, ChatRequest, LlmClient, LlmError, Role};
