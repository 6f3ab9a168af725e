//! SQLite database for persistent chunk vector storage
//!
//! Each row holds one chunk: its content, flattened scalar metadata as JSON
//! and the embedding as a little-endian `f32` blob. Metadata filters compile
//! to a single `WHERE` clause; similarity is scored in process.

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::vector_store::{MetadataFilter, SearchHit, VectorRecord};
use crate::types::ScalarMap;

/// SQLite-based vector database
pub struct VectorDb {
    conn: Arc<Mutex<Connection>>,
}

impl VectorDb {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::VectorDb(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::VectorDb(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
        "#).map_err(|e| Error::VectorDb(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS chunk_vectors (
                id TEXT PRIMARY KEY,
                doc_id TEXT NOT NULL,
                source TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL,
                embedding BLOB NOT NULL,
                dimensions INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chunk_vectors_doc ON chunk_vectors(doc_id);
            CREATE INDEX IF NOT EXISTS idx_chunk_vectors_source ON chunk_vectors(source);
        "#).map_err(|e| Error::VectorDb(format!("Failed to create tables: {}", e)))?;

        Ok(())
    }

    /// Insert or replace records in one transaction
    pub fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()
            .map_err(|e| Error::VectorDb(format!("Failed to begin transaction: {}", e)))?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO chunk_vectors (
                    id, doc_id, source, content, metadata, embedding, dimensions, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(id) DO UPDATE SET
                    doc_id = excluded.doc_id,
                    source = excluded.source,
                    content = excluded.content,
                    metadata = excluded.metadata,
                    embedding = excluded.embedding,
                    dimensions = excluded.dimensions,
                    updated_at = excluded.updated_at
                "#
            ).map_err(|e| Error::VectorDb(format!("Failed to prepare statement: {}", e)))?;

            let now = Utc::now().to_rfc3339();
            for record in records {
                let doc_id = record.metadata.get("doc_id").map(|v| v.render()).unwrap_or_default();
                let source = record.metadata.get("source").map(|v| v.render()).unwrap_or_default();
                stmt.execute(params![
                    record.id,
                    doc_id,
                    source,
                    record.content,
                    serde_json::to_string(&record.metadata)?,
                    encode_embedding(&record.embedding),
                    record.embedding.len() as i64,
                    &now,
                ]).map_err(|e| Error::VectorDb(format!("Failed to upsert '{}': {}", record.id, e)))?;
            }
        }

        tx.commit()
            .map_err(|e| Error::VectorDb(format!("Failed to commit transaction: {}", e)))?;

        Ok(records.len())
    }

    /// Top `k` records by cosine similarity among rows passing `filter`
    pub fn query(&self, embedding: &[f32], k: usize, filter: Option<&MetadataFilter>) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let (clause, values) = match filter {
            Some(filter) => {
                let mut values = Vec::new();
                let clause = compile_filter(filter, &mut values);
                (format!(" WHERE {}", clause), values)
            }
            None => (String::new(), Vec::new()),
        };

        let conn = self.conn.lock();
        let sql = format!("SELECT id, content, metadata, embedding FROM chunk_vectors{}", clause);
        let mut stmt = conn.prepare(&sql)
            .map_err(|e| Error::VectorDb(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            let id: String = row.get(0)?;
            let content: String = row.get(1)?;
            let metadata: String = row.get(2)?;
            let blob: Vec<u8> = row.get(3)?;
            Ok((id, content, metadata, blob))
        }).map_err(|e| Error::VectorDb(format!("Failed to execute query: {}", e)))?;

        let mut hits = Vec::new();
        for row in rows {
            let (id, content, metadata, blob) = match row {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Error reading vector row: {}", e);
                    continue;
                }
            };
            let candidate = decode_embedding(&blob);
            if candidate.len() != embedding.len() {
                tracing::warn!(
                    "Skipping '{}': dimension {} does not match query dimension {}",
                    id,
                    candidate.len(),
                    embedding.len()
                );
                continue;
            }
            let metadata: ScalarMap = serde_json::from_str(&metadata)?;
            hits.push(SearchHit {
                score: cosine_similarity(embedding, &candidate),
                id,
                content,
                metadata,
            });
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }

    /// Delete every record belonging to a document
    pub fn delete_by_document(&self, doc_id: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM chunk_vectors WHERE doc_id = ?1", params![doc_id])
            .map_err(|e| Error::VectorDb(format!("Failed to delete document vectors: {}", e)))?;
        Ok(deleted)
    }

    /// Number of stored records
    pub fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunk_vectors", [], |row| row.get(0))
            .map_err(|e| Error::VectorDb(format!("Failed to count vectors: {}", e)))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Compile a filter to SQL, pushing bound values in placeholder order
fn compile_filter(filter: &MetadataFilter, values: &mut Vec<String>) -> String {
    match filter {
        MetadataFilter::In { key, values: allowed } => {
            if allowed.is_empty() {
                return "0".to_string();
            }
            values.push(format!("$.\"{}\"", key.replace('"', "")));
            let placeholders = vec!["?"; allowed.len()].join(", ");
            values.extend(allowed.iter().cloned());
            format!("CAST(json_extract(metadata, ?) AS TEXT) IN ({})", placeholders)
        }
        MetadataFilter::And(filters) if filters.is_empty() => "1".to_string(),
        MetadataFilter::And(filters) => filters
            .iter()
            .map(|f| format!("({})", compile_filter(f, values)))
            .collect::<Vec<_>>()
            .join(" AND "),
    }
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
