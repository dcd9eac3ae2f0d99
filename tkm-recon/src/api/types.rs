//! Request and response bodies of the HTTP API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{IdentityDescriptor, MatchingMode, PendingDescriptor, PendingState, ProcessedFile, Selection};
use crate::services::{ResolutionOutcome, RosterOutcome, SessionSummary, SessionTotals, SkippedSheet};

/// Download URL of a bundle
pub fn download_url(download_id: Uuid) -> String {
    format!("/api/download/{}", download_id)
}

/// One finalized sheet as reported to the caller
#[derive(Debug, Clone, Serialize)]
pub struct SheetSummary {
    pub display_name: String,
    pub sheet_name: String,
    pub mode: MatchingMode,
    pub matched: usize,
    pub total: usize,
    pub unmatched_count: usize,
    pub unmatched: Vec<IdentityDescriptor>,
    pub dropped_ambiguous: usize,
    pub download_url: Option<String>,
    pub download_filename: Option<String>,
    pub processed_at: DateTime<Utc>,
}

impl From<&ProcessedFile> for SheetSummary {
    fn from(file: &ProcessedFile) -> Self {
        Self {
            display_name: file.display_name.clone(),
            sheet_name: file.sheet_name.clone(),
            mode: file.mode,
            matched: file.matched_count,
            total: file.total_count,
            unmatched_count: file.unmatched.len(),
            unmatched: file.unmatched.clone(),
            dropped_ambiguous: file.dropped_ambiguous,
            download_url: file.bundle.as_ref().map(|b| download_url(b.download_id)),
            download_filename: file.bundle.as_ref().map(|b| b.filename.clone()),
            processed_at: file.processed_at,
        }
    }
}

fn summaries(files: &[ProcessedFile]) -> Vec<SheetSummary> {
    files.iter().map(SheetSummary::from).collect()
}

/// Whether the caller must resolve duplicates before continuing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Finalized,
    Pending,
}

impl WorkflowStatus {
    fn of(pending: &Option<PendingDescriptor>) -> Self {
        if pending.is_some() {
            WorkflowStatus::Pending
        } else {
            WorkflowStatus::Finalized
        }
    }
}

/// POST /api/upload-archive response
#[derive(Debug, Serialize)]
pub struct ArchiveUploadResponse {
    pub success: bool,
    pub session_id: Uuid,
    pub files: usize,
    pub message: String,
}

/// POST /api/upload-excel response
#[derive(Debug, Serialize)]
pub struct RosterUploadResponse {
    pub success: bool,
    pub session_id: Uuid,
    pub status: WorkflowStatus,
    /// Sheets of this upload finalized immediately
    pub processed: Vec<SheetSummary>,
    pub skipped_sheets: Vec<SkippedSheet>,
    /// Pending ids this upload queued
    pub queued: Vec<String>,
    pub pending: Option<PendingDescriptor>,
}

impl From<RosterOutcome> for RosterUploadResponse {
    fn from(outcome: RosterOutcome) -> Self {
        Self {
            success: true,
            session_id: outcome.session_id,
            status: WorkflowStatus::of(&outcome.active_pending),
            processed: summaries(&outcome.finalized),
            skipped_sheets: outcome.skipped_sheets,
            queued: outcome.queued,
            pending: outcome.active_pending,
        }
    }
}

/// POST /api/resolve-duplicates request
#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub session_id: Uuid,
    pub pending_id: String,
    #[serde(default)]
    pub selections: Vec<Selection>,
}

/// POST /api/skip-duplicates request
#[derive(Debug, Deserialize)]
pub struct SkipRequest {
    pub session_id: Uuid,
    pub pending_id: String,
}

/// Resolution and abandonment response
#[derive(Debug, Serialize)]
pub struct ResolutionResponse {
    pub success: bool,
    pub session_id: Uuid,
    pub pending_id: String,
    pub state: PendingState,
    pub status: WorkflowStatus,
    /// The sheet this request finalized
    pub finalized: SheetSummary,
    /// Every finalized sheet of the session
    pub processed: Vec<SheetSummary>,
    pub totals: SessionTotals,
    /// Next entry awaiting resolution
    pub pending: Option<PendingDescriptor>,
}

impl From<ResolutionOutcome> for ResolutionResponse {
    fn from(outcome: ResolutionOutcome) -> Self {
        Self {
            success: true,
            session_id: outcome.session_id,
            pending_id: outcome.pending_id,
            state: outcome.state,
            status: WorkflowStatus::of(&outcome.active_pending),
            finalized: SheetSummary::from(&outcome.finalized),
            totals: SessionTotals::of(&outcome.processed),
            processed: summaries(&outcome.processed),
            pending: outcome.active_pending,
        }
    }
}

/// GET /api/sessions/:session_id response
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub document_count: Option<usize>,
    pub status: WorkflowStatus,
    pub processed: Vec<SheetSummary>,
    pub totals: SessionTotals,
    pub pending: Option<PendingDescriptor>,
    pub pending_count: usize,
}

impl From<SessionSummary> for SessionResponse {
    fn from(summary: SessionSummary) -> Self {
        Self {
            session_id: summary.session_id,
            created_at: summary.created_at,
            document_count: summary.document_count,
            status: WorkflowStatus::of(&summary.active_pending),
            processed: summaries(&summary.processed),
            totals: summary.totals,
            pending: summary.active_pending,
            pending_count: summary.pending_count,
        }
    }
}
