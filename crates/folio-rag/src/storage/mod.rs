//! Storage module for persistent data storage
//!
//! Provides SQLite-based persistence for chunk embeddings.

mod database;

pub use database::VectorDb;
