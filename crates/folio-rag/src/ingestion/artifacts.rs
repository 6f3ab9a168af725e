//! On-disk JSON artifacts, one directory per document
//!
//! ```text
//! <output_root>/<doc_id>/
//!     metadata.json  text.json  table.json  image.json
//!     validation.json  transactions.json  images/
//! ```
//!
//! The block files double as the checkpoint a later stage resumes from.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::{DocumentMetadata, ImageBlock, IngestedDocument, Issue, TableBlock, TextBlock};

use super::enrichment::MappingPayload;

pub const METADATA_FILE: &str = "metadata.json";
pub const TEXT_FILE: &str = "text.json";
pub const TABLE_FILE: &str = "table.json";
pub const IMAGE_FILE: &str = "image.json";
pub const VALIDATION_FILE: &str = "validation.json";
pub const TRANSACTIONS_FILE: &str = "transactions.json";

/// Reads and writes per-document artifact bundles
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one document's artifacts
    pub fn doc_dir(&self, doc_id: &str) -> PathBuf {
        self.root.join(doc_id)
    }

    /// Whether a document has been checkpointed
    pub fn exists(&self, doc_id: &str) -> bool {
        self.doc_dir(doc_id).join(METADATA_FILE).is_file()
    }

    fn write_json<T: Serialize + ?Sized>(&self, doc_id: &str, file: &str, value: &T) -> Result<PathBuf> {
        let dir = self.doc_dir(doc_id);
        fs::create_dir_all(&dir)?;
        let path = dir.join(file);
        let data = serde_json::to_string_pretty(value)?;
        fs::write(&path, data)?;
        Ok(path)
    }

    fn read_json<T: DeserializeOwned>(&self, doc_id: &str, file: &str) -> Result<T> {
        let path = self.doc_dir(doc_id).join(file);
        if !path.is_file() {
            return Err(Error::ArtifactMissing {
                doc_id: doc_id.to_string(),
                path,
            });
        }
        let data = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Write metadata and the three block files
    pub fn save(&self, doc: &IngestedDocument) -> Result<PathBuf> {
        let doc_id = doc.doc_id();
        self.write_json(doc_id, METADATA_FILE, &doc.metadata)?;
        self.write_json(doc_id, TEXT_FILE, &doc.texts)?;
        self.write_json(doc_id, TABLE_FILE, &doc.tables)?;
        self.write_json(doc_id, IMAGE_FILE, &doc.images)?;

        tracing::debug!(
            "Saved {} artifacts: {} texts, {} tables, {} images",
            doc_id,
            doc.texts.len(),
            doc.tables.len(),
            doc.images.len()
        );
        Ok(self.doc_dir(doc_id))
    }

    pub fn save_validation(&self, doc_id: &str, issues: &[Issue]) -> Result<PathBuf> {
        self.write_json(doc_id, VALIDATION_FILE, issues)
    }

    pub fn save_transactions(&self, payload: &MappingPayload) -> Result<PathBuf> {
        self.write_json(&payload.doc_id, TRANSACTIONS_FILE, payload)
    }

    /// Load a checkpointed document; blocks belonging to another doc_id are dropped
    pub fn load(&self, doc_id: &str) -> Result<IngestedDocument> {
        let metadata: DocumentMetadata = self.read_json(doc_id, METADATA_FILE)?;
        if metadata.doc_id != doc_id {
            return Err(Error::DocumentMismatch {
                expected: doc_id.to_string(),
                found: metadata.doc_id,
            });
        }

        let mut texts: Vec<TextBlock> = self.read_json(doc_id, TEXT_FILE)?;
        let mut tables: Vec<TableBlock> = self.read_json(doc_id, TABLE_FILE)?;
        let mut images: Vec<ImageBlock> = self.read_json(doc_id, IMAGE_FILE)?;

        let before = texts.len() + tables.len() + images.len();
        texts.retain(|b| b.doc_id == doc_id);
        tables.retain(|b| b.doc_id == doc_id);
        images.retain(|b| b.doc_id == doc_id);
        let dropped = before - (texts.len() + tables.len() + images.len());
        if dropped > 0 {
            tracing::warn!("Dropped {} blocks with a foreign doc_id from {}", dropped, doc_id);
        }

        Ok(IngestedDocument {
            metadata,
            texts,
            tables,
            images,
        })
    }

    /// Every checkpointed doc_id, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut doc_ids: Vec<String> = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir() && e.path().join(METADATA_FILE).is_file())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();

        doc_ids.sort();
        Ok(doc_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentType, IssueCode, IssueLevel};
    use tempfile::TempDir;

    fn sample_doc(doc_id: &str) -> IngestedDocument {
        let mut doc = IngestedDocument::new(DocumentMetadata::new(doc_id, "a.pdf", DocumentType::Invoice, 1));
        doc.texts.push(TextBlock::new("txt_0001", doc_id, 1, "ใบกำกับภาษี"));
        doc.tables.push(TableBlock::new("tbl_0001", doc_id, 1, vec!["item".into()], vec![vec!["pen".into()]]));
        doc
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let doc = sample_doc("doc_001");

        store.save(&doc).unwrap();
        assert!(store.exists("doc_001"));
        for file in [METADATA_FILE, TEXT_FILE, TABLE_FILE, IMAGE_FILE] {
            assert!(dir.path().join("doc_001").join(file).is_file());
        }

        let loaded = store.load("doc_001").unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn test_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save(&sample_doc("doc_001")).unwrap();
        fs::remove_file(dir.path().join("doc_001").join(TABLE_FILE)).unwrap();

        match store.load("doc_001") {
            Err(Error::ArtifactMissing { doc_id, path }) => {
                assert_eq!(doc_id, "doc_001");
                assert!(path.ends_with(TABLE_FILE));
            }
            other => panic!("expected ArtifactMissing, got {:?}", other.map(|d| d.metadata.doc_id)),
        }
        assert!(matches!(store.load("nope"), Err(Error::ArtifactMissing { .. })));
    }

    #[test]
    fn test_doc_id_mismatch() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save(&sample_doc("doc_001")).unwrap();
        fs::rename(dir.path().join("doc_001"), dir.path().join("doc_002")).unwrap();

        assert!(matches!(
            store.load("doc_002"),
            Err(Error::DocumentMismatch { expected, found }) if expected == "doc_002" && found == "doc_001"
        ));
    }

    #[test]
    fn test_list_and_side_files() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save(&sample_doc("doc_b")).unwrap();
        store.save(&sample_doc("doc_a")).unwrap();
        fs::create_dir_all(dir.path().join("stray")).unwrap();

        assert_eq!(store.list().unwrap(), vec!["doc_a", "doc_b"]);

        let issues = vec![Issue::new(IssueLevel::Warning, IssueCode::TableNoRows, "x").with("table_index", 0)];
        store.save_validation("doc_a", &issues).unwrap();
        let stored: Vec<Issue> =
            serde_json::from_str(&fs::read_to_string(dir.path().join("doc_a").join("validation.json")).unwrap()).unwrap();
        assert_eq!(stored, issues);

        assert!(ArtifactStore::new(dir.path().join("missing")).list().unwrap().is_empty());
    }
}
