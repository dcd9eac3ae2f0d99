//! Roster-to-document matching
//!
//! **room-name mode** (two passes):
//! 1. Exact: room equal and normalized name equal. The first unclaimed such
//!    document is claimed; a document is never assigned to two records.
//! 2. Fallback for records without an exact match: every document with an
//!    equal normalized name is a candidate, claimed or not. Any candidate
//!    makes the record Ambiguous, even a single one, because the room
//!    disagreed and a human must confirm. No candidate: Unmatched.
//!
//! **name-only mode**: all documents with an equal normalized name are
//! candidates. None: Unmatched. One: Matched. Several: Ambiguous.
//!
//! Documents are not claimed across sheets; each sheet is matched against
//! the full index.

use std::sync::Arc;

use super::name_normalizer::normalize_name;
use crate::models::{DocumentIndex, MatchOutcome, MatchReport, MatchingMode, SheetParseResult};

/// One outcome per record, in record order
pub fn match_records(sheet: &SheetParseResult, index: &DocumentIndex) -> Vec<MatchOutcome> {
    match sheet.mode() {
        MatchingMode::RoomName => match_room_name(sheet, index),
        MatchingMode::NameOnly => match_name_only(sheet, index),
    }
}

fn match_room_name(sheet: &SheetParseResult, index: &DocumentIndex) -> Vec<MatchOutcome> {
    let mut claimed = vec![false; index.len()];
    let normalized: Vec<String> = sheet.records().iter().map(|r| normalize_name(&r.name)).collect();
    let mut outcomes: Vec<Option<MatchOutcome>> = vec![None; sheet.records().len()];

    for (i, record) in sheet.records().iter().enumerate() {
        let Some(room) = record.room.as_deref() else {
            continue;
        };
        let exact = index
            .with_normalized_name(&normalized[i])
            .find(|(doc_index, doc)| !claimed[*doc_index] && doc.room == room);

        if let Some((doc_index, doc)) = exact {
            claimed[doc_index] = true;
            tracing::debug!(room = %room, name = %record.name, file = %doc.filename, "Matched");
            outcomes[i] = Some(MatchOutcome::Matched(Arc::clone(doc)));
        }
    }

    outcomes
        .into_iter()
        .enumerate()
        .map(|(i, outcome)| {
            if let Some(outcome) = outcome {
                return outcome;
            }
            let record = &sheet.records()[i];
            let candidates: Vec<_> = index
                .with_normalized_name(&normalized[i])
                .map(|(_, doc)| Arc::clone(doc))
                .collect();

            if candidates.is_empty() {
                tracing::debug!(room = ?record.room, name = %record.name, "Unmatched");
                MatchOutcome::Unmatched
            } else {
                tracing::debug!(
                    room = ?record.room,
                    name = %record.name,
                    candidates = candidates.len(),
                    "Room mismatch, same-name documents need confirmation"
                );
                MatchOutcome::Ambiguous(candidates)
            }
        })
        .collect()
}

fn match_name_only(sheet: &SheetParseResult, index: &DocumentIndex) -> Vec<MatchOutcome> {
    sheet
        .records()
        .iter()
        .map(|record| {
            let normalized = normalize_name(&record.name);
            let mut candidates: Vec<_> = index
                .with_normalized_name(&normalized)
                .map(|(_, doc)| Arc::clone(doc))
                .collect();

            match candidates.len() {
                0 => {
                    tracing::debug!(name = %record.name, id = ?record.id_document, "Unmatched");
                    MatchOutcome::Unmatched
                }
                1 => {
                    let doc = candidates.remove(0);
                    tracing::debug!(name = %record.name, file = %doc.filename, "Matched");
                    MatchOutcome::Matched(doc)
                }
                n => {
                    tracing::debug!(
                        name = %record.name,
                        id = ?record.id_document,
                        candidates = n,
                        "Duplicate name, needs selection"
                    );
                    MatchOutcome::Ambiguous(candidates)
                }
            }
        })
        .collect()
}

/// Match a sheet and partition the outcomes
pub fn reconcile_sheet(sheet: &SheetParseResult, index: &DocumentIndex) -> MatchReport {
    let report = MatchReport::from_outcomes(sheet, match_records(sheet, index));
    tracing::info!(
        sheet = %sheet.sheet_name(),
        mode = %report.mode,
        total = report.total_records,
        matched = report.matched.len(),
        ambiguous = report.ambiguous.len(),
        unmatched = report.unmatched.len(),
        "Sheet matched"
    );
    report
}
