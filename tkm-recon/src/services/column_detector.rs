//! Header row and semantic column detection
//!
//! Roster layouts are authored by hand: title rows above the header, columns
//! in any order, labels in Chinese or English with free-form wording. Each
//! semantic column is found by scoring every header label against a ranked
//! rule list; the rule lists are plain data so they can be tested alone.

use thiserror::Error;

use super::sheet_reader::SheetGrid;
use crate::models::MatchingMode;

/// Why a sheet was skipped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SheetRejection {
    #[error("sheet is empty")]
    EmptySheet,

    #[error("no header row found")]
    NoHeaderRow,

    /// Neither a full-name column nor a surname + given-name pair
    #[error("no name column (expected 姓名/中文姓名 or surname + given name); headers: [{}]", .headers.join(", "))]
    NoNameColumn { headers: Vec<String> },

    /// Neither a room column nor an identity-document column
    #[error("no room or identity-document column (expected 房号/room or 身份证/证件号/passport); headers: [{}]", .headers.join(", "))]
    NoDisambiguatorColumn { headers: Vec<String> },

    #[error("no row has all required fields")]
    NoRecords,
}

/// Predicate over one header label
///
/// `Exact` compares the trimmed label as authored; every other pattern works
/// on the lowercased trimmed label, so `Contains` texts are written lowercase.
#[derive(Debug, Clone, Copy)]
pub enum LabelPattern {
    Exact(&'static str),
    ExactFolded(&'static str),
    Contains(&'static str),
    Any(&'static [LabelPattern]),
    All(&'static [LabelPattern]),
    Not(&'static LabelPattern),
}

impl LabelPattern {
    pub fn matches(&self, label: &str) -> bool {
        let trimmed = label.trim();
        self.matches_prepared(trimmed, &trimmed.to_lowercase())
    }

    fn matches_prepared(&self, trimmed: &str, folded: &str) -> bool {
        match self {
            LabelPattern::Exact(text) => trimmed == *text,
            LabelPattern::ExactFolded(text) => folded == *text,
            LabelPattern::Contains(text) => folded.contains(text),
            LabelPattern::Any(patterns) => patterns.iter().any(|p| p.matches_prepared(trimmed, folded)),
            LabelPattern::All(patterns) => patterns.iter().all(|p| p.matches_prepared(trimmed, folded)),
            LabelPattern::Not(pattern) => !pattern.matches_prepared(trimmed, folded),
        }
    }
}

/// A pattern and the score a matching label earns
#[derive(Debug, Clone, Copy)]
pub struct LabelRule {
    pub pattern: LabelPattern,
    pub score: u32,
}

impl LabelRule {
    pub const fn new(pattern: LabelPattern, score: u32) -> Self {
        Self { pattern, score }
    }
}

use LabelPattern::{All, Any, Contains, Exact, ExactFolded, Not};

pub const ROOM_RULES: &[LabelRule] = &[
    LabelRule::new(Contains("房号"), 1),
    LabelRule::new(Contains("房间"), 1),
    LabelRule::new(Contains("room"), 1),
];

/// Exact label > compound label > substring
pub const FULL_NAME_RULES: &[LabelRule] = &[
    LabelRule::new(Exact("中文姓名"), 100),
    LabelRule::new(Exact("姓名"), 100),
    LabelRule::new(Exact("名字"), 100),
    LabelRule::new(ExactFolded("name"), 100),
    LabelRule::new(Contains("中文姓名"), 90),
    LabelRule::new(Contains("中文名姓"), 90),
    LabelRule::new(Contains("full name"), 90),
    LabelRule::new(Contains("姓名"), 80),
    LabelRule::new(Contains("中文名"), 80),
];

pub const SURNAME_RULES: &[LabelRule] = &[LabelRule::new(
    All(&[
        Any(&[Contains("拼音姓"), Contains("surname"), Contains("last name")]),
        Not(&Contains("名")),
    ]),
    1,
)];

pub const GIVEN_NAME_RULES: &[LabelRule] = &[LabelRule::new(
    All(&[
        Any(&[Contains("拼音名"), Contains("given name"), Contains("first name")]),
        Not(&Contains("姓")),
    ]),
    1,
)];

pub const ID_DOCUMENT_RULES: &[LabelRule] = &[
    LabelRule::new(Contains("身份证"), 1),
    LabelRule::new(Contains("证件号"), 1),
    LabelRule::new(Contains("证件"), 1),
    LabelRule::new(Contains("证号"), 1),
    LabelRule::new(Contains("护照"), 1),
    LabelRule::new(
        All(&[Contains("id"), Any(&[Contains("card"), Contains("number"), Contains("no")])]),
        1,
    ),
    LabelRule::new(Contains("passport"), 1),
    LabelRule::new(Contains("identity"), 1),
];

/// Highest score any rule awards `label` (0 when none match)
pub fn score_label(label: &str, rules: &[LabelRule]) -> u32 {
    let trimmed = label.trim();
    let folded = trimmed.to_lowercase();
    rules
        .iter()
        .filter(|rule| rule.pattern.matches_prepared(trimmed, &folded))
        .map(|rule| rule.score)
        .max()
        .unwrap_or(0)
}

/// Column with the highest score; the leftmost wins ties
pub fn best_column(headers: &[Option<String>], rules: &[LabelRule]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (index, label) in headers.iter().enumerate() {
        let Some(label) = label.as_deref() else {
            continue;
        };
        let score = score_label(label, rules);
        if score > best.map_or(0, |(_, s)| s) {
            best = Some((index, score));
        }
    }
    best.map(|(index, _)| index)
}

/// Located header row and semantic columns of one sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub header_row: usize,
    pub room: Option<usize>,
    pub full_name: Option<usize>,
    pub surname: Option<usize>,
    pub given_name: Option<usize>,
    pub id_document: Option<usize>,
    pub mode: MatchingMode,
}

impl ColumnMap {
    /// Surname and given-name columns, when both exist
    pub fn split_name(&self) -> Option<(usize, usize)> {
        self.surname.zip(self.given_name)
    }
}

fn non_empty_cells(row: &[Option<String>]) -> usize {
    row.iter()
        .filter(|cell| cell.as_deref().is_some_and(|c| !c.trim().is_empty()))
        .count()
}

/// Header row index: row 0, unless it looks like a title (≤2 filled cells)
pub fn find_header_row(grid: &SheetGrid) -> Result<usize, SheetRejection> {
    let first = grid.rows.first().ok_or(SheetRejection::EmptySheet)?;

    let header_row = if non_empty_cells(first) <= 2 {
        tracing::debug!(sheet = %grid.name, "First row looks like a title, using second row as header");
        1
    } else {
        0
    };

    match grid.rows.get(header_row) {
        Some(row) if non_empty_cells(row) > 0 => Ok(header_row),
        _ => Err(SheetRejection::NoHeaderRow),
    }
}

/// Locate the header row and the semantic columns, and pick the matching mode
pub fn detect_columns(grid: &SheetGrid) -> Result<ColumnMap, SheetRejection> {
    let header_row = find_header_row(grid)?;
    let headers = &grid.rows[header_row];

    let room = best_column(headers, ROOM_RULES);
    let full_name = best_column(headers, FULL_NAME_RULES);
    let surname = best_column(headers, SURNAME_RULES);
    let given_name = best_column(headers, GIVEN_NAME_RULES);
    let id_document = best_column(headers, ID_DOCUMENT_RULES);

    tracing::debug!(
        sheet = %grid.name,
        header_row,
        ?room,
        ?full_name,
        ?surname,
        ?given_name,
        ?id_document,
        "Columns detected"
    );

    let labels = || {
        headers
            .iter()
            .flatten()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect::<Vec<_>>()
    };

    if full_name.is_none() && surname.zip(given_name).is_none() {
        return Err(SheetRejection::NoNameColumn { headers: labels() });
    }

    let mode = if room.is_some() {
        MatchingMode::RoomName
    } else if id_document.is_some() {
        MatchingMode::NameOnly
    } else {
        return Err(SheetRejection::NoDisambiguatorColumn { headers: labels() });
    };

    Ok(ColumnMap {
        header_row,
        room,
        full_name,
        surname,
        given_name,
        id_document,
        mode,
    })
}
