//! Retrieval: vector index, query intent and grounded answering

pub mod intent;
pub mod rag;
pub mod search;

pub use intent::{detect_intent_rule, IntentClassifier};
pub use rag::{build_context, RagOrchestrator, NO_RESULTS_ANSWER};
pub use search::{build_filter, VectorIndex};
