//! Merging human selections into a pending entry
//!
//! Validation never mutates the entry: a rejected resolution leaves the
//! pending entry exactly as it was.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{DocumentEntry, PendingDuplicateEntry, Selection};

/// Resolution rejected before any merge
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Selections cover {covered} of {required} ambiguous records (missing record indexes {missing:?})")]
    IncompleteSelections {
        covered: usize,
        required: usize,
        missing: Vec<usize>,
    },
}

/// Documents a finalized sheet ends up with
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Originally matched documents followed by the resolved ones, in record order
    pub documents: Vec<Arc<DocumentEntry>>,
    /// Ambiguous records that received a valid candidate
    pub resolved: usize,
    /// Ambiguous records left without a document
    pub dropped: usize,
}

/// Last selection per record index; later selections for the same record win
fn selection_map(selections: &[Selection]) -> HashMap<usize, &str> {
    selections
        .iter()
        .map(|s| (s.record_index, s.selected_filename.as_str()))
        .collect()
}

/// Merge `selections` into the entry's matched set
///
/// Every ambiguous record must have a selection. A selection naming a file
/// outside its record's candidates is ignored, as are selections for record
/// indexes that are not ambiguous in this entry. A document already in the
/// result, matched or picked for an earlier record, is not added again and
/// the later record counts as dropped.
pub fn merge_selections(
    entry: &PendingDuplicateEntry,
    selections: &[Selection],
) -> Result<Resolution, ResolveError> {
    let chosen = selection_map(selections);

    let missing: Vec<usize> = entry
        .ambiguous
        .iter()
        .map(|a| a.record_index)
        .filter(|i| !chosen.contains_key(i))
        .collect();
    if !missing.is_empty() {
        return Err(ResolveError::IncompleteSelections {
            covered: entry.ambiguous.len() - missing.len(),
            required: entry.ambiguous.len(),
            missing,
        });
    }

    let known: BTreeSet<usize> = entry.ambiguous.iter().map(|a| a.record_index).collect();
    for index in chosen.keys().filter(|i| !known.contains(i)) {
        tracing::debug!(pending_id = %entry.pending_id, record_index = index, "Ignoring selection for unknown record");
    }

    let mut documents = entry.matched.clone();
    let mut included: HashSet<&Path> = entry.matched.iter().map(|d| d.path.as_path()).collect();
    let mut resolved = 0;
    for record in &entry.ambiguous {
        let Some(filename) = chosen.get(&record.record_index) else {
            continue;
        };
        match record.candidate(filename) {
            Some(doc) if !included.insert(doc.path.as_path()) => tracing::warn!(
                pending_id = %entry.pending_id,
                record_index = record.record_index,
                selected = %filename,
                "Selected file is already in the bundle, ignoring"
            ),
            Some(doc) => {
                documents.push(Arc::clone(doc));
                resolved += 1;
            }
            None => tracing::warn!(
                pending_id = %entry.pending_id,
                record_index = record.record_index,
                selected = %filename,
                "Selected file is not a candidate of this record, ignoring"
            ),
        }
    }

    Ok(Resolution {
        documents,
        resolved,
        dropped: entry.ambiguous.len() - resolved,
    })
}

/// Finalize an entry without selections: only the unambiguous matches survive
pub fn abandon(entry: &PendingDuplicateEntry) -> Resolution {
    Resolution {
        documents: entry.matched.clone(),
        resolved: 0,
        dropped: entry.ambiguous.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AmbiguousRecord, MatchingMode, RosterRecord, UploadedFile};
    use chrono::Utc;
    use std::path::PathBuf;

    fn doc(room: &str, name: &str) -> Arc<DocumentEntry> {
        let filename = format!("t-{}-{}--x.pdf", room, name);
        Arc::new(DocumentEntry::new(
            PathBuf::from("/docs").join(&filename),
            filename,
            room.to_string(),
            name.to_string(),
        ))
    }

    fn ambiguous(index: usize, id: &str, candidates: &[Arc<DocumentEntry>]) -> AmbiguousRecord {
        AmbiguousRecord {
            record_index: index,
            record: RosterRecord {
                name: "WANG LEI".to_string(),
                room: None,
                id_document: Some(id.to_string()),
            },
            candidates: candidates.to_vec(),
        }
    }

    fn entry() -> PendingDuplicateEntry {
        let candidates = vec![doc("1", "WANG LEI"), doc("2", "WANG LEI"), doc("3", "WANG LEI")];
        PendingDuplicateEntry {
            pending_id: "p1".to_string(),
            display_name: "roster.xlsx".to_string(),
            output_base_name: "roster".to_string(),
            sheet_name: "Sheet1".to_string(),
            mode: MatchingMode::NameOnly,
            matched: vec![doc("4", "HAN MEIMEI")],
            ambiguous: vec![ambiguous(0, "E1", &candidates), ambiguous(2, "E2", &candidates)],
            unmatched: vec![],
            total_records: 3,
            created_at: Utc::now(),
            upload: Arc::new(UploadedFile::new(PathBuf::from("/nonexistent/u"), "roster.xlsx")),
        }
    }

    fn select(index: usize, filename: &str) -> Selection {
        Selection {
            record_index: index,
            selected_filename: filename.to_string(),
        }
    }

    #[test]
    fn test_full_coverage_merges_in_record_order() {
        let entry = entry();
        let resolution = merge_selections(
            &entry,
            &[select(2, "t-3-WANG LEI--x.pdf"), select(0, "t-1-WANG LEI--x.pdf")],
        )
        .unwrap();

        let names: Vec<&str> = resolution.documents.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(
            names,
            vec!["t-4-HAN MEIMEI--x.pdf", "t-1-WANG LEI--x.pdf", "t-3-WANG LEI--x.pdf"]
        );
        assert_eq!(resolution.resolved, 2);
        assert_eq!(resolution.dropped, 0);
    }

    #[test]
    fn test_incomplete_coverage_rejected() {
        let entry = entry();
        let err = merge_selections(&entry, &[select(0, "t-1-WANG LEI--x.pdf")]).unwrap_err();
        assert_eq!(
            err,
            ResolveError::IncompleteSelections {
                covered: 1,
                required: 2,
                missing: vec![2],
            }
        );
    }

    #[test]
    fn test_unknown_record_index_does_not_count() {
        let entry = entry();
        let result = merge_selections(
            &entry,
            &[select(0, "t-1-WANG LEI--x.pdf"), select(1, "t-2-WANG LEI--x.pdf")],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_selection_outside_candidates_is_ignored() {
        let entry = entry();
        let resolution = merge_selections(
            &entry,
            &[select(0, "t-1-WANG LEI--x.pdf"), select(2, "not-a-candidate.pdf")],
        )
        .unwrap();
        assert_eq!(resolution.documents.len(), 2);
        assert_eq!(resolution.resolved, 1);
        assert_eq!(resolution.dropped, 1);
    }

    #[test]
    fn test_same_file_picked_twice_added_once() {
        let entry = entry();
        let resolution = merge_selections(
            &entry,
            &[select(0, "t-2-WANG LEI--x.pdf"), select(2, "t-2-WANG LEI--x.pdf")],
        )
        .unwrap();

        let names: Vec<&str> = resolution.documents.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["t-4-HAN MEIMEI--x.pdf", "t-2-WANG LEI--x.pdf"]);
        assert_eq!(resolution.resolved, 1);
        assert_eq!(resolution.dropped, 1);
    }

    #[test]
    fn test_pick_of_matched_file_not_duplicated() {
        let mut entry = entry();
        let matched = doc("4", "HAN MEIMEI");
        entry.ambiguous[1].candidates.push(Arc::clone(&matched));

        let resolution = merge_selections(
            &entry,
            &[select(0, "t-1-WANG LEI--x.pdf"), select(2, "t-4-HAN MEIMEI--x.pdf")],
        )
        .unwrap();

        assert_eq!(resolution.documents.len(), 2);
        assert_eq!(resolution.resolved, 1);
        assert_eq!(resolution.dropped, 1);
    }

    #[test]
    fn test_last_selection_wins() {
        let entry = entry();
        let resolution = merge_selections(
            &entry,
            &[
                select(0, "t-1-WANG LEI--x.pdf"),
                select(2, "t-2-WANG LEI--x.pdf"),
                select(0, "t-3-WANG LEI--x.pdf"),
            ],
        )
        .unwrap();
        assert_eq!(resolution.documents[1].filename, "t-3-WANG LEI--x.pdf");
    }

    #[test]
    fn test_abandon_keeps_only_unambiguous_matches() {
        let entry = entry();
        let resolution = abandon(&entry);
        assert_eq!(resolution.documents.len(), 1);
        assert_eq!(resolution.dropped, 2);
    }
}
