//! Local provider implementations backed by SQLite
//!
//! Wraps the synchronous `VectorDb` so the async pipeline never blocks the runtime.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::storage::VectorDb;

use super::vector_store::{MetadataFilter, SearchHit, VectorRecord, VectorStoreProvider};

/// Local vector store wrapping the rusqlite `VectorDb`
pub struct LocalVectorStore {
    db: Arc<VectorDb>,
}

impl LocalVectorStore {
    /// Create from an existing database
    pub fn new(db: Arc<VectorDb>) -> Self {
        Self { db }
    }

    /// Create from config
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let db = Arc::new(VectorDb::new(&config.storage.vector_db_path)?);
        Ok(Self { db })
    }

    /// Get underlying database for direct access
    pub fn inner(&self) -> &Arc<VectorDb> {
        &self.db
    }
}

#[async_trait]
impl VectorStoreProvider for LocalVectorStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize> {
        // VectorDb is sync, wrap in blocking task
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.upsert(&records))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    async fn query(&self, embedding: &[f32], k: usize, filter: Option<MetadataFilter>) -> Result<Vec<SearchHit>> {
        let db = self.db.clone();
        let embedding = embedding.to_vec();
        tokio::task::spawn_blocking(move || db.query(&embedding, k, filter.as_ref()))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    async fn delete_by_document(&self, doc_id: &str) -> Result<usize> {
        let db = self.db.clone();
        let doc_id = doc_id.to_string();
        tokio::task::spawn_blocking(move || db.delete_by_document(&doc_id))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    async fn len(&self) -> Result<usize> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.len())
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.len().await.is_ok())
    }

    fn name(&self) -> &str {
        "local-sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Scalar, ScalarMap};

    #[tokio::test]
    async fn test_local_store_round_trip() {
        let store = LocalVectorStore::new(Arc::new(VectorDb::in_memory().unwrap()));
        let mut metadata = ScalarMap::new();
        metadata.insert("doc_id".into(), Scalar::Text("doc_001".into()));
        metadata.insert("source".into(), Scalar::Text("text".into()));

        let written = store
            .upsert(vec![VectorRecord {
                id: "doc_001::text::txt_0001".into(),
                content: "Opening balance".into(),
                metadata,
                embedding: vec![0.6, 0.8],
            }])
            .await
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(store.len().await.unwrap(), 1);
        assert!(store.health_check().await.unwrap());

        let hits = store
            .query(&[0.6, 0.8], 3, Some(MetadataFilter::is_in("doc_id", ["doc_001"])))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "Opening balance");

        assert_eq!(store.delete_by_document("doc_001").await.unwrap(), 1);
        assert_eq!(store.len().await.unwrap(), 0);
    }
}
