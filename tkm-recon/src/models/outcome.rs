//! Per-record match classification

use std::sync::Arc;

use super::{DocumentEntry, IdentityDescriptor, MatchingMode, RosterRecord, SheetParseResult};

/// Classification of one roster record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Exactly one document belongs to the record
    Matched(Arc<DocumentEntry>),
    /// A human must choose among these candidates
    Ambiguous(Vec<Arc<DocumentEntry>>),
    /// No candidate document
    Unmatched,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRecord {
    pub record_index: usize,
    pub document: Arc<DocumentEntry>,
}

/// A roster record awaiting a human choice among its candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousRecord {
    /// Position of the record in its sheet
    pub record_index: usize,
    pub record: RosterRecord,
    pub candidates: Vec<Arc<DocumentEntry>>,
}

impl AmbiguousRecord {
    /// Candidate with the given filename, if it is one of this record's candidates
    pub fn candidate(&self, filename: &str) -> Option<&Arc<DocumentEntry>> {
        self.candidates.iter().find(|doc| doc.filename == filename)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedRecord {
    pub record_index: usize,
    pub descriptor: IdentityDescriptor,
}

/// Outcomes of one sheet, partitioned by classification
///
/// Every record index of the sheet appears in exactly one of the three lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    pub mode: MatchingMode,
    pub total_records: usize,
    pub matched: Vec<MatchedRecord>,
    pub ambiguous: Vec<AmbiguousRecord>,
    pub unmatched: Vec<UnmatchedRecord>,
}

impl MatchReport {
    /// Partition `outcomes` (one per record, in record order)
    pub fn from_outcomes(sheet: &SheetParseResult, outcomes: Vec<MatchOutcome>) -> Self {
        debug_assert_eq!(sheet.records().len(), outcomes.len());

        let mode = sheet.mode();
        let mut report = Self {
            mode,
            total_records: sheet.records().len(),
            matched: Vec::new(),
            ambiguous: Vec::new(),
            unmatched: Vec::new(),
        };

        for (record_index, (record, outcome)) in sheet.records().iter().zip(outcomes).enumerate() {
            match outcome {
                MatchOutcome::Matched(document) => report.matched.push(MatchedRecord {
                    record_index,
                    document,
                }),
                MatchOutcome::Ambiguous(candidates) => report.ambiguous.push(AmbiguousRecord {
                    record_index,
                    record: record.clone(),
                    candidates,
                }),
                MatchOutcome::Unmatched => report.unmatched.push(UnmatchedRecord {
                    record_index,
                    descriptor: record.descriptor(mode),
                }),
            }
        }

        report
    }

    pub fn has_ambiguous(&self) -> bool {
        !self.ambiguous.is_empty()
    }

    pub fn matched_documents(&self) -> Vec<Arc<DocumentEntry>> {
        self.matched.iter().map(|m| Arc::clone(&m.document)).collect()
    }

    pub fn unmatched_descriptors(&self) -> Vec<IdentityDescriptor> {
        self.unmatched.iter().map(|u| u.descriptor.clone()).collect()
    }
}
