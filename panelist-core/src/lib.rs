//! Core LLM plumbing for the panelist interview service.
//!
//! This crate owns everything that talks to (or interprets output from)
//! the text-generation provider: the chat-completions client, question
//! prompt construction and parsing, and evaluation prompt construction
//! and strict decoding. The server crate composes these with the
//! lifecycle and session machinery.

pub mod evaluation;
pub mod llm;
pub mod questions;

pub use evaluation::{EvaluationResult, QaPair, Recommendation};
pub use llm::{LlmError, OpenAiClient};
