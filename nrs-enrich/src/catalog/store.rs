//! Document store contract
//!
//! The store enumerates catalog documents, hands them out for mutation and
//! persists each one whole once all of its entries are processed.

use super::CatalogDocument;
use crate::error::{EnrichError, Result};
use async_trait::async_trait;
use globset::{GlobBuilder, GlobMatcher};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Opaque pointer to one stored document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentHandle(PathBuf);

impl DocumentHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Documents whose path matches a glob, in stable order
    async fn list(&self, pattern: &str) -> Result<Vec<DocumentHandle>>;

    async fn load(&self, handle: &DocumentHandle) -> Result<CatalogDocument>;

    /// Persist a whole document, replacing the stored copy
    async fn save(&self, document: &CatalogDocument) -> Result<()>;
}

/// Compile a path glob; `*` and `?` stop at `/`, `**` spans directories,
/// `[..]` classes and `{a,b}` alternatives are supported
pub fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| EnrichError::Store(format!("Invalid document pattern {}: {}", pattern, e)))?;
    Ok(glob.compile_matcher())
}

/// Store keeping documents in memory, keyed by path
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<BTreeMap<PathBuf, CatalogDocument>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new(documents: impl IntoIterator<Item = CatalogDocument>) -> Self {
        Self {
            documents: Mutex::new(
                documents
                    .into_iter()
                    .map(|document| (document.path.clone(), document))
                    .collect(),
            ),
            saves: AtomicUsize::new(0),
        }
    }

    /// Current stored copy of a document
    pub fn get(&self, path: impl AsRef<Path>) -> Option<CatalogDocument> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path.as_ref())
            .cloned()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(&self, pattern: &str) -> Result<Vec<DocumentHandle>> {
        let matcher = compile_glob(pattern)?;
        let documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(documents
            .keys()
            .filter(|path| matcher.is_match(path))
            .map(|path| DocumentHandle::new(path.clone()))
            .collect())
    }

    async fn load(&self, handle: &DocumentHandle) -> Result<CatalogDocument> {
        self.get(handle.path()).ok_or_else(|| {
            EnrichError::Store(format!("Document not found: {}", handle.path().display()))
        })
    }

    async fn save(&self, document: &CatalogDocument) -> Result<()> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(document.path.clone(), document.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
