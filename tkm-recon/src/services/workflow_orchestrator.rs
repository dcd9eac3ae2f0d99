//! Reconciliation workflow
//!
//! Ties the engine to sessions: bundle ingestion creates a session, roster
//! ingestion matches every sheet against the session's cached document index
//! and either finalizes the sheet or queues it for duplicate resolution, and
//! resolution/abandonment drains that queue one entry at a time.
//!
//! Every operation on a session holds that session's lock until it returns,
//! so sheets of one session are processed strictly in sequence.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tkm_common::Clock;
use uuid::Uuid;

use super::archive_extractor::{ArchiveError, ArchiveExtractor, BundleExtractor};
use super::bundle_packager::{unique_entry_names, BundlePackager, PackageError, ZipPackager};
use super::document_indexer::{DocumentIndexer, IndexError};
use super::duplicate_resolver::{abandon as abandon_entry, merge_selections, Resolution, ResolveError};
use super::matching_engine::reconcile_sheet;
use super::record_extractor::parse_sheets;
use super::retention_sweeper::{remove_session_artifacts, sweep_stale_files, SweepReport};
use super::session_store::{DownloadRecord, SessionStore};
use super::sheet_reader::{read_roster, RosterError, RosterFormat};
use crate::config::ServiceConfig;
use crate::models::{
    DocumentEntry, DocumentIndex, IdentityDescriptor, MatchingMode, OutputBundle, PendingDescriptor,
    PendingDuplicateEntry, PendingState, ProcessedFile, Selection, Session, UploadedFile,
};

/// Workflow failures, each isolated to the request that hit it
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Pending entry not found: {0}")]
    PendingNotFound(String),

    #[error("Pending entry {pending_id} is queued behind {active}; resolve the active entry first")]
    NotActive { pending_id: String, active: String },

    #[error("Download not found: {0}")]
    BundleNotFound(Uuid),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result of bundle ingestion
#[derive(Debug, Clone, Serialize)]
pub struct BundleIngest {
    pub session_id: Uuid,
    pub files: usize,
}

/// A sheet that was skipped during roster ingestion
#[derive(Debug, Clone, Serialize)]
pub struct SkippedSheet {
    pub sheet_name: String,
    pub reason: String,
}

/// Result of one roster upload
#[derive(Debug, Clone)]
pub struct RosterOutcome {
    pub session_id: Uuid,
    /// Sheets of this upload finalized immediately
    pub finalized: Vec<ProcessedFile>,
    /// Pending ids queued by this upload, in creation order
    pub queued: Vec<String>,
    pub skipped_sheets: Vec<SkippedSheet>,
    /// The session's active pending entry, possibly from an earlier upload
    pub active_pending: Option<PendingDescriptor>,
}

/// Result of resolving or abandoning a pending entry
#[derive(Debug, Clone)]
pub struct ResolutionOutcome {
    pub session_id: Uuid,
    pub pending_id: String,
    pub state: PendingState,
    pub finalized: ProcessedFile,
    /// Every finalized sheet of the session
    pub processed: Vec<ProcessedFile>,
    pub active_pending: Option<PendingDescriptor>,
}

/// Aggregates over a session's finalized sheets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionTotals {
    pub sheets: usize,
    pub matched: usize,
    pub total: usize,
    pub unmatched: usize,
    pub dropped_ambiguous: usize,
}

impl SessionTotals {
    pub fn of(processed: &[ProcessedFile]) -> Self {
        processed.iter().fold(Self::default(), |mut totals, file| {
            totals.sheets += 1;
            totals.matched += file.matched_count;
            totals.total += file.total_count;
            totals.unmatched += file.unmatched.len();
            totals.dropped_ambiguous += file.dropped_ambiguous;
            totals
        })
    }
}

/// Current state of a session
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// `None` until the first roster triggered the document scan
    pub document_count: Option<usize>,
    pub processed: Vec<ProcessedFile>,
    pub active_pending: Option<PendingDescriptor>,
    pub pending_count: usize,
    pub totals: SessionTotals,
}

/// Everything needed to finalize one sheet
struct SheetFinal {
    display_name: String,
    sheet_name: String,
    output_base_name: String,
    mode: MatchingMode,
    documents: Vec<Arc<DocumentEntry>>,
    total_records: usize,
    unmatched: Vec<IdentityDescriptor>,
    dropped_ambiguous: usize,
}

pub struct WorkflowOrchestrator {
    config: ServiceConfig,
    store: SessionStore,
    indexer: Arc<DocumentIndexer>,
    extractor: Arc<dyn ArchiveExtractor>,
    packager: Arc<dyn BundlePackager>,
}

impl WorkflowOrchestrator {
    /// Orchestrator with the zip extractor and packager
    pub fn new(config: ServiceConfig, clock: Arc<dyn Clock>) -> Result<Self, WorkflowError> {
        Self::with_collaborators(config, clock, Arc::new(BundleExtractor::new()), Arc::new(ZipPackager::new()))
    }

    pub fn with_collaborators(
        config: ServiceConfig,
        clock: Arc<dyn Clock>,
        extractor: Arc<dyn ArchiveExtractor>,
        packager: Arc<dyn BundlePackager>,
    ) -> Result<Self, WorkflowError> {
        let indexer = Arc::new(DocumentIndexer::new(&config.document_extension)?);
        Ok(Self {
            config,
            store: SessionStore::new(clock),
            indexer,
            extractor,
            packager,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub async fn active_sessions(&self) -> usize {
        self.store.len().await
    }

    /// Fresh path in the uploads area for an incoming file
    pub fn new_upload_path(&self) -> PathBuf {
        self.config.areas.uploads.join(Uuid::new_v4().to_string())
    }

    /// Extract a document bundle and open a session over it
    ///
    /// The uploaded archive is deleted whether or not extraction succeeds;
    /// no session exists after a failed extraction.
    pub async fn ingest_bundle(&self, upload: UploadedFile) -> Result<BundleIngest, WorkflowError> {
        let session_id = Uuid::new_v4();
        let target = self.config.areas.temp.join(session_id.to_string());
        let extractor = Arc::clone(&self.extractor);

        let tree = tokio::task::spawn_blocking(move || {
            extractor.extract(upload.path(), upload.original_name(), &target)
        })
        .await??;

        self.store.create(session_id, tree.root.clone()).await;
        tracing::info!(
            session_id = %session_id,
            root = %tree.root.display(),
            files = tree.files,
            "Session created"
        );

        Ok(BundleIngest {
            session_id,
            files: tree.files,
        })
    }

    async fn session(&self, session_id: Uuid) -> Result<Arc<tokio::sync::Mutex<Session>>, WorkflowError> {
        self.store
            .get(session_id)
            .await
            .ok_or(WorkflowError::SessionNotFound(session_id))
    }

    /// The session's document index, scanned on first use only
    async fn document_index(&self, session: &Session) -> Result<Arc<DocumentIndex>, WorkflowError> {
        let indexer = Arc::clone(&self.indexer);
        let root = session.document_root().to_path_buf();
        let session_id = session.id();

        session
            .document_index_or_init(|| async move {
                let index = tokio::task::spawn_blocking(move || indexer.scan(&root)).await??;
                tracing::info!(
                    session_id = %session_id,
                    root = %index.root().display(),
                    documents = index.len(),
                    skipped = index.skipped(),
                    "Session document index cached"
                );
                Ok::<_, WorkflowError>(Arc::new(index))
            })
            .await
    }

    /// Match every sheet of a roster against the session's documents
    ///
    /// Sheets without ambiguity are finalized right away; each sheet with at
    /// least one ambiguous record is queued behind any existing entries. A sheet
    /// that fails to package is reported as skipped; the upload fails only when
    /// none of its sheets was finalized or queued.
    pub async fn ingest_roster(&self, session_id: Uuid, upload: UploadedFile) -> Result<RosterOutcome, WorkflowError> {
        let session = self.session(session_id).await?;
        RosterFormat::from_filename(upload.original_name())?;

        let mut session = session.lock().await;
        let index = self.document_index(&session).await?;

        let upload = Arc::new(upload);
        let grids = {
            let upload = Arc::clone(&upload);
            tokio::task::spawn_blocking(move || read_roster(upload.path(), upload.original_name())).await??
        };

        let (sheets, rejected) = parse_sheets(&grids);
        if sheets.is_empty() {
            let reasons = rejected
                .iter()
                .map(|(sheet, reason)| format!("{}: {}", sheet, reason))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RosterError::NoValidSheets {
                file: upload.original_name().to_string(),
                reasons,
            }
            .into());
        }

        let multi_sheet = sheets.len() > 1;
        let stem = upload.stem();
        let mut finalized = Vec::new();
        let mut queued = Vec::new();
        let mut failed = Vec::new();
        let mut first_failure = None;

        for sheet in &sheets {
            let (display_name, output_base_name) = if multi_sheet {
                (
                    format!("{} ({})", upload.original_name(), sheet.sheet_name()),
                    format!("{}-{}", stem, sheet.sheet_name()),
                )
            } else {
                (upload.original_name().to_string(), stem.clone())
            };

            let report = reconcile_sheet(sheet, &index);
            if report.has_ambiguous() {
                let pending_id = self.pending_id(&session, sheet.sheet_name());
                let entry = PendingDuplicateEntry {
                    pending_id: pending_id.clone(),
                    display_name,
                    output_base_name,
                    sheet_name: sheet.sheet_name().to_string(),
                    mode: report.mode,
                    matched: report.matched_documents(),
                    unmatched: report.unmatched_descriptors(),
                    ambiguous: report.ambiguous,
                    total_records: report.total_records,
                    created_at: self.store.now(),
                    upload: Arc::clone(&upload),
                };
                tracing::info!(
                    session_id = %session_id,
                    pending_id = %pending_id,
                    ambiguous = entry.ambiguous.len(),
                    "Sheet queued for duplicate resolution"
                );
                session.pending_mut().push(entry);
                queued.push(pending_id);
            } else {
                let result = self
                    .finalize(
                        &mut session,
                        SheetFinal {
                            display_name,
                            sheet_name: sheet.sheet_name().to_string(),
                            output_base_name,
                            mode: report.mode,
                            documents: report.matched_documents(),
                            total_records: report.total_records,
                            unmatched: report.unmatched_descriptors(),
                            dropped_ambiguous: 0,
                        },
                    )
                    .await;
                match result {
                    Ok(file) => finalized.push(file),
                    Err(e) => {
                        tracing::warn!(
                            session_id = %session_id,
                            sheet = %sheet.sheet_name(),
                            error = %e,
                            "Sheet could not be finalized, skipped"
                        );
                        failed.push(SkippedSheet {
                            sheet_name: sheet.sheet_name().to_string(),
                            reason: e.to_string(),
                        });
                        first_failure.get_or_insert(e);
                    }
                }
            }
        }

        // Nothing from this upload reached the session
        if finalized.is_empty() && queued.is_empty() {
            if let Some(e) = first_failure {
                return Err(e);
            }
        }

        let mut skipped_sheets: Vec<SkippedSheet> = rejected
            .into_iter()
            .map(|(sheet_name, reason)| SkippedSheet {
                sheet_name,
                reason: reason.to_string(),
            })
            .collect();
        skipped_sheets.extend(failed);

        Ok(RosterOutcome {
            session_id,
            finalized,
            queued,
            skipped_sheets,
            active_pending: session.pending().active_descriptor(),
        })
    }

    /// `{session}-{sheet}-{millis}`, suffixed when two sheets queue within one millisecond
    fn pending_id(&self, session: &Session, sheet_name: &str) -> String {
        let base = format!("{}-{}-{}", session.id(), sheet_name, self.store.now().timestamp_millis());
        if !session.pending().contains(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{}-{}", base, n))
            .find(|id| !session.pending().contains(id))
            .unwrap_or(base)
    }

    /// Package the sheet's documents, record it on the session, register the download
    async fn finalize(&self, session: &mut Session, sheet: SheetFinal) -> Result<ProcessedFile, WorkflowError> {
        let bundle = if sheet.documents.is_empty() {
            None
        } else {
            let download_id = Uuid::new_v4();
            let path = self.config.areas.output.join(format!("{}.zip", download_id));
            let names = unique_entry_names(sheet.documents.iter().map(|doc| doc.filename.as_str()));
            let files: Vec<(PathBuf, String)> = sheet
                .documents
                .iter()
                .map(|doc| doc.path.clone())
                .zip(names)
                .collect();

            let packager = Arc::clone(&self.packager);
            let output = path.clone();
            tokio::task::spawn_blocking(move || packager.package(&files, &output)).await??;

            let filename = format!("{}.zip", sheet.output_base_name);
            self.store
                .register_download(
                    download_id,
                    DownloadRecord {
                        session_id: session.id(),
                        path: path.clone(),
                        filename: filename.clone(),
                    },
                )
                .await;
            Some(OutputBundle {
                download_id,
                filename,
                path,
            })
        };

        let file = ProcessedFile {
            display_name: sheet.display_name,
            sheet_name: sheet.sheet_name,
            mode: sheet.mode,
            matched_count: sheet.documents.len(),
            total_count: sheet.total_records,
            unmatched: sheet.unmatched,
            dropped_ambiguous: sheet.dropped_ambiguous,
            bundle,
            processed_at: self.store.now(),
        };
        tracing::info!(
            session_id = %session.id(),
            sheet = %file.display_name,
            matched = file.matched_count,
            total = file.total_count,
            unmatched = file.unmatched.len(),
            "Sheet finalized"
        );

        session.push_processed(file.clone());
        Ok(file)
    }

    /// The entry, provided it is the session's active one
    fn active_entry<'a>(session: &'a Session, pending_id: &str) -> Result<&'a PendingDuplicateEntry, WorkflowError> {
        let entry = session
            .pending()
            .get(pending_id)
            .ok_or_else(|| WorkflowError::PendingNotFound(pending_id.to_string()))?;
        if !session.pending().is_active(pending_id) {
            return Err(WorkflowError::NotActive {
                pending_id: pending_id.to_string(),
                active: session
                    .pending()
                    .active()
                    .map(|active| active.pending_id.clone())
                    .unwrap_or_default(),
            });
        }
        Ok(entry)
    }

    /// Resolve the active pending entry with one selection per ambiguous record
    ///
    /// Rejected resolutions leave the entry queued and unchanged.
    pub async fn resolve(
        &self,
        session_id: Uuid,
        pending_id: &str,
        selections: &[Selection],
    ) -> Result<ResolutionOutcome, WorkflowError> {
        let session = self.session(session_id).await?;
        let mut session = session.lock().await;

        let entry = Self::active_entry(&session, pending_id)?;
        let resolution = merge_selections(entry, selections)?;
        self.complete(&mut session, pending_id, resolution, PendingState::Resolved)
            .await
    }

    /// Finalize the active pending entry with its unambiguous matches only
    pub async fn abandon(&self, session_id: Uuid, pending_id: &str) -> Result<ResolutionOutcome, WorkflowError> {
        let session = self.session(session_id).await?;
        let mut session = session.lock().await;

        let entry = Self::active_entry(&session, pending_id)?;
        let resolution = abandon_entry(entry);
        self.complete(&mut session, pending_id, resolution, PendingState::Abandoned)
            .await
    }

    /// Finalize a pending entry, then remove it from the queue
    ///
    /// A packaging failure leaves the entry queued.
    async fn complete(
        &self,
        session: &mut Session,
        pending_id: &str,
        resolution: Resolution,
        state: PendingState,
    ) -> Result<ResolutionOutcome, WorkflowError> {
        let sheet = {
            let entry = session
                .pending()
                .get(pending_id)
                .ok_or_else(|| WorkflowError::PendingNotFound(pending_id.to_string()))?;
            SheetFinal {
                display_name: entry.display_name.clone(),
                sheet_name: entry.sheet_name.clone(),
                output_base_name: entry.output_base_name.clone(),
                mode: entry.mode,
                documents: resolution.documents,
                total_records: entry.total_records,
                unmatched: entry.unmatched.clone(),
                dropped_ambiguous: resolution.dropped,
            }
        };

        let finalized = self.finalize(session, sheet).await?;
        session.pending_mut().take(pending_id);

        match state {
            PendingState::Abandoned => tracing::info!(
                session_id = %session.id(),
                pending_id = %pending_id,
                dropped = resolution.dropped,
                "Pending entry abandoned, ambiguous records dropped"
            ),
            _ => tracing::info!(
                session_id = %session.id(),
                pending_id = %pending_id,
                resolved = resolution.resolved,
                "Pending entry resolved"
            ),
        }

        Ok(ResolutionOutcome {
            session_id: session.id(),
            pending_id: pending_id.to_string(),
            state,
            finalized,
            processed: session.processed().to_vec(),
            active_pending: session.pending().active_descriptor(),
        })
    }

    pub async fn session_summary(&self, session_id: Uuid) -> Result<SessionSummary, WorkflowError> {
        let session = self.session(session_id).await?;
        let session = session.lock().await;

        Ok(SessionSummary {
            session_id,
            created_at: session.created_at(),
            document_count: session.document_index().map(|index| index.len()),
            processed: session.processed().to_vec(),
            active_pending: session.pending().active_descriptor(),
            pending_count: session.pending().len(),
            totals: SessionTotals::of(session.processed()),
        })
    }

    /// A generated bundle that is still on disk
    pub async fn find_bundle(&self, download_id: Uuid) -> Result<DownloadRecord, WorkflowError> {
        let record = self
            .store
            .find_download(download_id)
            .await
            .ok_or(WorkflowError::BundleNotFound(download_id))?;
        if !tokio::fs::try_exists(&record.path).await.unwrap_or(false) {
            tracing::warn!(download_id = %download_id, path = %record.path.display(), "Bundle file missing");
            return Err(WorkflowError::BundleNotFound(download_id));
        }
        Ok(record)
    }

    /// Remove expired sessions and stale working files
    pub async fn sweep(&self) -> SweepReport {
        let expired = self.store.sweep_expired(self.config.retention_chrono()).await;
        let areas = self.config.areas.all().to_vec();
        let retention = self.config.retention;
        let now = SystemTime::from(self.store.now());

        let task = tokio::task::spawn_blocking(move || {
            let mut report = SweepReport::default();
            remove_session_artifacts(&expired, &mut report);
            sweep_stale_files(&areas, retention, now, &mut report);
            report
        });

        match task.await {
            Ok(report) => {
                if report.sessions_removed > 0 || report.paths_removed > 0 {
                    tracing::info!(
                        sessions = report.sessions_removed,
                        paths = report.paths_removed,
                        failures = report.failures,
                        "Retention sweep completed"
                    );
                }
                report
            }
            Err(e) => {
                tracing::warn!(error = %e, "Retention sweep task failed");
                SweepReport::default()
            }
        }
    }
}
