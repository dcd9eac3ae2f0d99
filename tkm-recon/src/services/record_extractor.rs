//! Roster record extraction
//!
//! Walks the data rows below the detected header and builds one
//! [`RosterRecord`] per usable row. Rows that lack a field required by the
//! sheet's matching mode are skipped without error.

use super::column_detector::{detect_columns, ColumnMap, SheetRejection};
use super::name_normalizer::is_ideograph;
use super::sheet_reader::SheetGrid;
use crate::models::{MatchingMode, RosterRecord, SheetParseResult};

/// Trimmed cell text, `None` when blank
fn field(grid: &SheetGrid, row: usize, col: Option<usize>) -> Option<String> {
    let text = grid.cell(row, col?)?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Insert a space between adjacent ideographs: "李雷" → "李 雷"
///
/// Document filenames commonly spell Chinese names with spaced characters;
/// spacing roster names the same way keeps displayed names comparable.
pub fn format_roster_name(raw: &str) -> String {
    let mut formatted = String::with_capacity(raw.len() * 2);
    let mut previous: Option<char> = None;
    for c in raw.trim().chars() {
        if let Some(prev) = previous {
            if is_ideograph(prev) && is_ideograph(c) {
                formatted.push(' ');
            }
        }
        formatted.push(c);
        previous = Some(c);
    }
    formatted
}

/// Build records from the rows below the header
pub fn extract_records(grid: &SheetGrid, columns: &ColumnMap) -> Vec<RosterRecord> {
    let mut records = Vec::new();
    // Merged room cells: blank rows inherit the room above them
    let mut last_room: Option<String> = None;

    for row in (columns.header_row + 1)..grid.rows.len() {
        let room = match field(grid, row, columns.room) {
            Some(room) => {
                last_room = Some(room.clone());
                Some(room)
            }
            None => last_room.clone(),
        };

        let name = field(grid, row, columns.full_name)
            .map(|full| format_roster_name(&full))
            .or_else(|| {
                let (surname_col, given_col) = columns.split_name()?;
                let surname = field(grid, row, Some(surname_col)).unwrap_or_default();
                let given = field(grid, row, Some(given_col)).unwrap_or_default();
                let joined = format!("{} {}", surname, given).trim().to_string();
                (!joined.is_empty()).then_some(joined)
            });

        let id_document = field(grid, row, columns.id_document);

        let Some(name) = name else {
            continue;
        };

        let usable = match columns.mode {
            MatchingMode::RoomName => room.is_some(),
            MatchingMode::NameOnly => id_document.is_some(),
        };
        if !usable {
            tracing::trace!(sheet = %grid.name, row, "Row lacks required fields, skipped");
            continue;
        }

        records.push(RosterRecord {
            name,
            room: match columns.mode {
                MatchingMode::RoomName => room,
                MatchingMode::NameOnly => None,
            },
            id_document,
        });
    }

    records
}

/// Detect columns and extract records for one sheet
pub fn parse_sheet(grid: &SheetGrid) -> Result<SheetParseResult, SheetRejection> {
    let columns = detect_columns(grid)?;
    let records = extract_records(grid, &columns);

    tracing::info!(
        sheet = %grid.name,
        mode = %columns.mode,
        records = records.len(),
        "Sheet parsed"
    );

    SheetParseResult::new(columns.mode, records, grid.name.clone()).ok_or(SheetRejection::NoRecords)
}

/// Parse every sheet; a rejected sheet never prevents the others from parsing
pub fn parse_sheets(grids: &[SheetGrid]) -> (Vec<SheetParseResult>, Vec<(String, SheetRejection)>) {
    let mut parsed = Vec::new();
    let mut rejected = Vec::new();

    for grid in grids {
        match parse_sheet(grid) {
            Ok(sheet) => parsed.push(sheet),
            Err(reason) => {
                tracing::warn!(sheet = %grid.name, reason = %reason, "Sheet skipped");
                rejected.push((grid.name.clone(), reason));
            }
        }
    }

    (parsed, rejected)
}
