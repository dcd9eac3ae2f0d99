//! Reconciliation services
//!
//! Leaves first: name normalization, spreadsheet reading, column detection,
//! record extraction, document indexing, matching, duplicate resolution.
//! Bundle extraction and packaging sit behind traits; the workflow
//! orchestrator drives all of them per session.

pub mod archive_extractor;
pub mod bundle_packager;
pub mod column_detector;
pub mod document_indexer;
pub mod duplicate_resolver;
pub mod matching_engine;
pub mod name_normalizer;
pub mod record_extractor;
pub mod retention_sweeper;
pub mod session_store;
pub mod sheet_reader;
pub mod workflow_orchestrator;

pub use archive_extractor::{
    ArchiveError, ArchiveExtractor, ArchiveFormat, BundleExtractor, ExtractedTree, RarExtractor, ZipExtractor,
};
pub use bundle_packager::{BundlePackager, PackageError, ZipPackager};
pub use column_detector::{detect_columns, ColumnMap, SheetRejection};
pub use document_indexer::{DocumentIndexer, IndexError};
pub use duplicate_resolver::{merge_selections, Resolution, ResolveError};
pub use matching_engine::{match_records, reconcile_sheet};
pub use name_normalizer::normalize_name;
pub use record_extractor::{parse_sheet, parse_sheets};
pub use retention_sweeper::SweepReport;
pub use session_store::{DownloadRecord, SessionStore};
pub use sheet_reader::{read_roster, RosterError, SheetGrid};
pub use workflow_orchestrator::{
    BundleIngest, ResolutionOutcome, RosterOutcome, SessionSummary, SessionTotals, SkippedSheet,
    WorkflowError, WorkflowOrchestrator,
};
