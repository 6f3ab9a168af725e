//! Vector index over chunks: embedding, flattened metadata and filtered search

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, MetadataFilter, Providers, SearchHit, VectorRecord, VectorStoreProvider};
use crate::types::{Chunk, Scalar, ScalarMap, SourceKind};

/// Chunk index backed by an embedding provider and a vector store
#[derive(Clone)]
pub struct VectorIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
    batch_size: usize,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStoreProvider>, batch_size: usize) -> Self {
        Self {
            embedder,
            store,
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_providers(providers: &Providers, batch_size: usize) -> Self {
        Self::new(Arc::clone(&providers.embedder), Arc::clone(&providers.vector_store), batch_size)
    }

    /// Embed and upsert chunks by id; re-indexing overwrites
    pub async fn index_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut indexed = 0;
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }

            let records = batch
                .iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| VectorRecord {
                    id: chunk.id.clone(),
                    content: chunk.content.clone(),
                    metadata: flatten_metadata(chunk),
                    embedding,
                })
                .collect();

            indexed += self.store.upsert(records).await?;
        }

        tracing::info!("Indexed {} chunks into {}", indexed, self.store.name());
        Ok(indexed)
    }

    /// Nearest chunks to `query`, optionally restricted by document and source kind
    ///
    /// Backend failures surface as `RetrievalUnavailable`, never as an empty result.
    pub async fn search_similar(
        &self,
        query: &str,
        k: usize,
        doc_ids: Option<&[String]>,
        sources: Option<&[SourceKind]>,
    ) -> Result<Vec<SearchHit>> {
        let embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| Error::retrieval(format!("{} embedding failed: {}", self.embedder.name(), e)))?;

        let filter = build_filter(doc_ids, sources);
        tracing::debug!("Searching top {} with filter {:?}", k, filter);

        let hits = self
            .store
            .query(&embedding, k, filter)
            .await
            .map_err(|e| Error::retrieval(format!("{} query failed: {}", self.store.name(), e)))?;

        Ok(hits
            .into_iter()
            .map(|mut hit| {
                hit.metadata.insert("chunk_id".to_string(), Scalar::Text(hit.id.clone()));
                hit
            })
            .collect())
    }

    /// Drop every chunk of a document
    pub async fn delete_document(&self, doc_id: &str) -> Result<usize> {
        let deleted = self.store.delete_by_document(doc_id).await?;
        if deleted > 0 {
            tracing::debug!("Deleted {} stale chunks of {}", deleted, doc_id);
        }
        Ok(deleted)
    }

    pub async fn len(&self) -> Result<usize> {
        self.store.len().await
    }
}

/// Chunk metadata as scalars, plus the chunk id
pub fn flatten_metadata(chunk: &Chunk) -> ScalarMap {
    let mut metadata: ScalarMap = chunk
        .metadata
        .iter()
        .map(|(key, value)| (key.clone(), Scalar::from_json(value)))
        .collect();
    metadata.insert("chunk_id".to_string(), Scalar::Text(chunk.id.clone()));
    metadata
}

/// Zero, one or an AND of two set-membership predicates; empty lists do not constrain
pub fn build_filter(doc_ids: Option<&[String]>, sources: Option<&[SourceKind]>) -> Option<MetadataFilter> {
    let mut filters = Vec::new();

    if let Some(doc_ids) = doc_ids.filter(|ids| !ids.is_empty()) {
        filters.push(MetadataFilter::is_in("doc_id", doc_ids.iter().cloned()));
    }
    if let Some(sources) = sources.filter(|s| !s.is_empty()) {
        filters.push(MetadataFilter::is_in("source", sources.iter().map(|s| s.to_string())));
    }

    match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(MetadataFilter::And(filters)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::embedding::MockEmbeddingProvider;
    use crate::providers::vector_store::MockVectorStoreProvider;
    use crate::providers::LocalVectorStore;
    use crate::storage::VectorDb;
    use crate::types::DocumentType;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn chunk(doc_id: &str, kind: SourceKind, block_id: &str, content: &str) -> Chunk {
        let mut metadata = BTreeMap::new();
        metadata.insert("doc_id".to_string(), json!(doc_id));
        metadata.insert("source".to_string(), json!(kind.to_string()));
        metadata.insert("page".to_string(), json!(1));
        metadata.insert("columns".to_string(), json!(["date", "amount"]));
        Chunk {
            id: Chunk::compose_id(doc_id, kind, block_id),
            doc_id: doc_id.into(),
            doc_type: DocumentType::BankStatement,
            source_kind: kind,
            page: 1,
            content: content.into(),
            metadata,
        }
    }

    /// Deterministic embedder: table content points one way, everything else another
    fn keyword_embedder() -> MockEmbeddingProvider {
        let embed = |text: &str| -> Vec<f32> {
            if text.contains("Table") || text.contains("ตาราง") {
                vec![1.0, 0.0, 0.0]
            } else {
                vec![0.0, 1.0, 0.0]
            }
        };
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_embed().returning(move |t| Ok(embed(t)));
        embedder
            .expect_embed_batch()
            .returning(move |texts| Ok(texts.iter().map(|t| embed(t)).collect()));
        embedder.expect_name().return_const("mock".to_string());
        embedder
    }

    #[test]
    fn test_build_filter() {
        assert_eq!(build_filter(None, None), None);
        assert_eq!(build_filter(Some(&[]), Some(&[])), None);

        let doc_ids = vec!["doc_001".to_string()];
        assert_eq!(
            build_filter(Some(doc_ids.as_slice()), None),
            Some(MetadataFilter::is_in("doc_id", ["doc_001"]))
        );
        assert_eq!(
            build_filter(Some(doc_ids.as_slice()), Some(&[SourceKind::Table])),
            Some(MetadataFilter::And(vec![
                MetadataFilter::is_in("doc_id", ["doc_001"]),
                MetadataFilter::is_in("source", ["table"]),
            ]))
        );
    }

    #[test]
    fn test_flatten_metadata_stringifies_lists() {
        let flat = flatten_metadata(&chunk("doc_001", SourceKind::Table, "tbl_0001", "Table x"));
        assert_eq!(flat["columns"], Scalar::Text("[\"date\",\"amount\"]".into()));
        assert_eq!(flat["page"], Scalar::Int(1));
        assert_eq!(flat["chunk_id"], Scalar::Text("doc_001::table::tbl_0001".into()));
    }

    #[tokio::test]
    async fn test_search_issues_single_and_filter() {
        let mut store = MockVectorStoreProvider::new();
        store
            .expect_query()
            .withf(|_, k, filter| {
                *k == 5
                    && *filter
                        == Some(MetadataFilter::And(vec![
                            MetadataFilter::is_in("doc_id", ["doc_001"]),
                            MetadataFilter::is_in("source", ["table"]),
                        ]))
            })
            .times(1)
            .returning(|_, _, _| Ok(vec![]));
        store.expect_name().return_const("mock".to_string());

        let index = VectorIndex::new(Arc::new(keyword_embedder()), Arc::new(store), 8);
        let doc_ids = vec!["doc_001".to_string()];
        let hits = index
            .search_similar("ยอดคงเหลือ", 5, Some(doc_ids.as_slice()), Some(&[SourceKind::Table]))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_search_without_constraints_is_unfiltered() {
        let mut store = MockVectorStoreProvider::new();
        store
            .expect_query()
            .withf(|_, _, filter| filter.is_none())
            .times(1)
            .returning(|_, _, _| Ok(vec![]));
        store.expect_name().return_const("mock".to_string());

        let index = VectorIndex::new(Arc::new(keyword_embedder()), Arc::new(store), 8);
        index.search_similar("anything", 10, None, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_embedding_failure_is_retrieval_unavailable() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed()
            .returning(|_| Err(Error::embedding("API key expired")));
        embedder.expect_name().return_const("mock".to_string());
        let store = MockVectorStoreProvider::new();

        let index = VectorIndex::new(Arc::new(embedder), Arc::new(store), 8);
        let err = index.search_similar("q", 3, None, None).await.unwrap_err();
        assert!(matches!(err, Error::RetrievalUnavailable(_)));
    }

    #[tokio::test]
    async fn test_index_and_search_local_store() {
        let store = LocalVectorStore::new(Arc::new(VectorDb::in_memory().unwrap()));
        let index = VectorIndex::new(Arc::new(keyword_embedder()), Arc::new(store), 2);

        let chunks = vec![
            chunk("doc_001", SourceKind::Text, "txt_0001", "Opening balance"),
            chunk("doc_001", SourceKind::Table, "tbl_0001", "Table table_1 (page 1)"),
            chunk("doc_002", SourceKind::Table, "tbl_0001", "Table table_1 (page 1)"),
        ];
        assert_eq!(index.index_chunks(&chunks).await.unwrap(), 3);
        // Re-indexing overwrites instead of duplicating
        index.index_chunks(&chunks).await.unwrap();
        assert_eq!(index.len().await.unwrap(), 3);
        assert_eq!(index.index_chunks(&[]).await.unwrap(), 0);

        let doc_ids = vec!["doc_001".to_string()];
        let hits = index
            .search_similar("ตาราง", 10, Some(doc_ids.as_slice()), Some(&[SourceKind::Table]))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(
            hits[0].metadata["chunk_id"],
            Scalar::Text("doc_001::table::tbl_0001".into())
        );
    }
}
