//! Model clients and prompt templates

pub mod ollama;
pub mod prompt;

pub use ollama::OllamaClient;
pub(crate) use ollama::retry_request;
pub use prompt::{parse_index_labels, PromptBuilder, UNKNOWN_ANSWER};
