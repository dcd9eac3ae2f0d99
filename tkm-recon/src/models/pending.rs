//! Pending duplicate-resolution entries
//!
//! State machine per entry:
//! QUEUED → RESOLVED (human chose a document for every ambiguous record)
//! QUEUED → ABANDONED (human skipped; ambiguous records are dropped)
//!
//! Terminal entries are removed from the queue; only queued entries are stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use super::{AmbiguousRecord, DocumentEntry, IdentityDescriptor, MatchingMode, UploadedFile};

/// Lifecycle state of a pending entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingState {
    Queued,
    Resolved,
    Abandoned,
}

/// One human choice: the document chosen for one ambiguous record
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Selection {
    /// Position of the ambiguous record in its sheet
    pub record_index: usize,
    pub selected_filename: String,
}

/// A sheet whose finalization waits on human resolution of ambiguous records
#[derive(Debug)]
pub struct PendingDuplicateEntry {
    pub pending_id: String,
    /// Name the finalized sheet will be reported under
    pub display_name: String,
    /// Bundle filename without extension
    pub output_base_name: String,
    pub sheet_name: String,
    pub mode: MatchingMode,
    /// Documents already matched unambiguously
    pub matched: Vec<Arc<DocumentEntry>>,
    pub ambiguous: Vec<AmbiguousRecord>,
    pub unmatched: Vec<IdentityDescriptor>,
    pub total_records: usize,
    pub created_at: DateTime<Utc>,
    /// Keeps the uploaded roster on disk until this entry is terminal
    pub upload: Arc<UploadedFile>,
}

impl PendingDuplicateEntry {
    /// What the human sees while this entry is active
    pub fn descriptor(&self, pending_count: usize) -> PendingDescriptor {
        PendingDescriptor {
            pending_id: self.pending_id.clone(),
            state: PendingState::Queued,
            display_name: self.display_name.clone(),
            sheet_name: self.sheet_name.clone(),
            mode: self.mode,
            matched_count: self.matched.len(),
            unmatched_count: self.unmatched.len(),
            total_records: self.total_records,
            ambiguous: self
                .ambiguous
                .iter()
                .map(|a| {
                    let identity = a.record.descriptor(self.mode);
                    AmbiguousDescriptor {
                        record_index: a.record_index,
                        name: identity.name,
                        room: identity.room,
                        id_document: identity.id_document,
                        candidates: a
                            .candidates
                            .iter()
                            .map(|doc| CandidateDescriptor {
                                filename: doc.filename.clone(),
                                room: doc.room.clone(),
                                name: doc.name.clone(),
                            })
                            .collect(),
                    }
                })
                .collect(),
            pending_count,
            created_at: self.created_at,
        }
    }
}

/// Candidate document offered for an ambiguous record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateDescriptor {
    pub filename: String,
    pub room: String,
    pub name: String,
}

/// Ambiguous record with the identity fields of its sheet's matching mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbiguousDescriptor {
    pub record_index: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_document: Option<String>,
    pub candidates: Vec<CandidateDescriptor>,
}

/// The active pending entry as reported to callers
#[derive(Debug, Clone, Serialize)]
pub struct PendingDescriptor {
    pub pending_id: String,
    /// Always `queued`: terminal entries are no longer described
    pub state: PendingState,
    pub display_name: String,
    pub sheet_name: String,
    pub mode: MatchingMode,
    pub matched_count: usize,
    pub unmatched_count: usize,
    pub total_records: usize,
    pub ambiguous: Vec<AmbiguousDescriptor>,
    /// Entries queued in the session, this one included
    pub pending_count: usize,
    pub created_at: DateTime<Utc>,
}

/// FIFO of pending entries for one session
///
/// The head is the active entry; later entries wait behind it in creation order.
#[derive(Debug, Default)]
pub struct PendingQueue {
    order: VecDeque<String>,
    entries: HashMap<String, PendingDuplicateEntry>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: PendingDuplicateEntry) {
        self.order.push_back(entry.pending_id.clone());
        self.entries.insert(entry.pending_id.clone(), entry);
    }

    /// Entry currently awaiting resolution
    pub fn active(&self) -> Option<&PendingDuplicateEntry> {
        self.order.front().and_then(|id| self.entries.get(id))
    }

    pub fn is_active(&self, pending_id: &str) -> bool {
        self.order.front().map(String::as_str) == Some(pending_id)
    }

    pub fn get(&self, pending_id: &str) -> Option<&PendingDuplicateEntry> {
        self.entries.get(pending_id)
    }

    pub fn contains(&self, pending_id: &str) -> bool {
        self.entries.contains_key(pending_id)
    }

    /// Remove an entry, preserving the order of the rest
    pub fn take(&mut self, pending_id: &str) -> Option<PendingDuplicateEntry> {
        let entry = self.entries.remove(pending_id)?;
        self.order.retain(|id| id != pending_id);
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Descriptor of the active entry
    pub fn active_descriptor(&self) -> Option<PendingDescriptor> {
        self.active().map(|entry| entry.descriptor(self.len()))
    }

    /// Entries in creation order
    pub fn iter(&self) -> impl Iterator<Item = &PendingDuplicateEntry> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }
}
