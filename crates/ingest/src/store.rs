use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{DocumentId, DocumentRecord, Embedding, IngestError};

/// A document that passed validation and is ready to append.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub content: String,
    pub metadata: Map<String, Value>,
    pub jurisdiction: String,
    pub domain: String,
    pub language: String,
    pub embedding: Option<Embedding>,
}

impl NewDocument {
    fn validate(&self) -> Result<(), IngestError> {
        if self.content.trim().is_empty() {
            return Err(IngestError::InvalidDocument("content is empty".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct StoreInner {
    records: Vec<Arc<DocumentRecord>>,
    positions: HashMap<DocumentId, usize>,
    next_id: u64,
}

impl StoreInner {
    fn append(&mut self, doc: NewDocument) -> DocumentId {
        self.next_id += 1;
        let id = DocumentId::new(self.next_id);
        let record = DocumentRecord {
            id,
            content: doc.content,
            metadata: doc.metadata,
            jurisdiction: doc.jurisdiction,
            domain: doc.domain,
            language: doc.language,
            embedding: doc.embedding,
            ingested_at: Utc::now(),
        };
        self.positions.insert(id, self.records.len());
        self.records.push(Arc::new(record));
        id
    }
}

/// Append-only log of documents.
///
/// Duplicates are allowed. Appends go through a single write lock, so the
/// records of one batch are contiguous and keep their input order.
#[derive(Default)]
pub struct DocumentStore {
    inner: RwLock<StoreInner>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a half-appended record
    // (push happens last), so poisoned guards are safe to reuse.
    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends one record. Rejects empty content with `InvalidDocument`.
    pub fn add(&self, doc: NewDocument) -> Result<DocumentId, IngestError> {
        doc.validate()?;
        Ok(self.write().append(doc))
    }

    /// Appends every valid document under one lock. Results are positional.
    pub fn add_batch(&self, docs: Vec<NewDocument>) -> Vec<Result<DocumentId, IngestError>> {
        let mut inner = self.write();
        docs.into_iter()
            .map(|doc| {
                doc.validate()?;
                Ok(inner.append(doc))
            })
            .collect()
    }

    pub fn get(&self, id: DocumentId) -> Option<Arc<DocumentRecord>> {
        let inner = self.read();
        inner
            .positions
            .get(&id)
            .and_then(|&pos| inner.records.get(pos))
            .cloned()
    }

    /// Every record in insertion order.
    pub fn all(&self) -> Vec<Arc<DocumentRecord>> {
        self.read().records.clone()
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("len", &self.len())
            .finish()
    }
}
