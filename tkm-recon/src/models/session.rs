//! Reconciliation session (in-memory state)

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use uuid::Uuid;

use super::{DocumentIndex, IdentityDescriptor, MatchingMode, PendingQueue};

/// A generated output bundle available for download
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputBundle {
    pub download_id: Uuid,
    /// Filename offered to the downloader
    pub filename: String,
    #[serde(skip)]
    pub path: PathBuf,
}

/// One finalized sheet
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedFile {
    pub display_name: String,
    pub sheet_name: String,
    pub mode: MatchingMode,
    pub matched_count: usize,
    pub total_count: usize,
    pub unmatched: Vec<IdentityDescriptor>,
    /// Ambiguous records dropped by abandoning the pending entry
    pub dropped_ambiguous: usize,
    pub bundle: Option<OutputBundle>,
    pub processed_at: DateTime<Utc>,
}

/// One reconciliation run: a document bundle plus every roster processed against it
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    document_root: PathBuf,
    document_index: OnceCell<Arc<DocumentIndex>>,
    processed: Vec<ProcessedFile>,
    pending: PendingQueue,
}

impl Session {
    pub fn new(id: Uuid, document_root: PathBuf, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            document_root,
            document_index: OnceCell::new(),
            processed: Vec::new(),
            pending: PendingQueue::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn document_root(&self) -> &Path {
        &self.document_root
    }

    /// Cached document index, if already built
    pub fn document_index(&self) -> Option<Arc<DocumentIndex>> {
        self.document_index.get().cloned()
    }

    /// Cached document index, building it with `init` on first use
    ///
    /// `init` runs at most once successfully per session; a failed build
    /// leaves the cache empty.
    pub async fn document_index_or_init<F, Fut, E>(&self, init: F) -> Result<Arc<DocumentIndex>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<DocumentIndex>, E>>,
    {
        self.document_index.get_or_try_init(init).await.cloned()
    }

    /// Finalized sheets in processing order
    pub fn processed(&self) -> &[ProcessedFile] {
        &self.processed
    }

    pub fn push_processed(&mut self, file: ProcessedFile) {
        self.processed.push(file);
    }

    pub fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    pub fn pending_mut(&mut self) -> &mut PendingQueue {
        &mut self.pending
    }
}
