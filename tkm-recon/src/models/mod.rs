//! Data models for tkm-recon
//!
//! Roster records and sheets, indexed documents, per-record match outcomes,
//! and the per-session state that accumulates finalized and pending sheets.

pub mod document;
pub mod outcome;
pub mod pending;
pub mod roster;
pub mod session;
pub mod upload;

pub use document::{DocumentEntry, DocumentIndex};
pub use outcome::{AmbiguousRecord, MatchOutcome, MatchReport, MatchedRecord, UnmatchedRecord};
pub use pending::{
    AmbiguousDescriptor, CandidateDescriptor, PendingDescriptor, PendingDuplicateEntry, PendingQueue,
    PendingState, Selection,
};
pub use roster::{IdentityDescriptor, MatchingMode, RosterRecord, SheetParseResult};
pub use session::{OutputBundle, ProcessedFile, Session};
pub use upload::UploadedFile;
