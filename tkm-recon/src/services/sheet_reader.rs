//! Roster spreadsheet loading
//!
//! Turns an uploaded roster file into one grid of untyped cell text per sheet.
//! Workbooks (xlsx, xlsm, xlsb, xls, ods) are read with calamine; CSV files
//! become a single sheet named after the file.

use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use thiserror::Error;

/// Upload-level roster failures
#[derive(Debug, Error)]
pub enum RosterError {
    /// Extension is not a supported spreadsheet type
    #[error("Unsupported roster file type: {0}")]
    UnsupportedFormat(String),

    /// File could not be opened or decoded
    #[error("Failed to read roster {0}: {1}")]
    Unreadable(String, String),

    /// Every sheet was rejected
    #[error("No valid sheet in {file}: {reasons}")]
    NoValidSheets { file: String, reasons: String },
}

/// Supported roster container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterFormat {
    Workbook,
    Csv,
}

impl RosterFormat {
    /// Format from a filename's extension (case-insensitive)
    pub fn from_filename(filename: &str) -> Result<Self, RosterError> {
        let ext = Path::new(filename)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(RosterFormat::Workbook),
            "csv" => Ok(RosterFormat::Csv),
            _ => Err(RosterError::UnsupportedFormat(filename.to_string())),
        }
    }
}

/// One sheet as rows of optional cell text
///
/// `None` marks an empty cell. Text is kept as authored (not trimmed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetGrid {
    pub name: String,
    pub rows: Vec<Vec<Option<String>>>,
}

impl SheetGrid {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Build from string literals; empty strings become empty cells
    #[cfg(test)]
    pub fn from_strs(name: &str, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                    .collect()
            })
            .collect();
        Self::new(name, rows)
    }

    /// Cell text at (row, col), `None` when out of range or empty
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|c| c.as_deref())
    }
}

/// Read every sheet of a roster file
///
/// `display_name` is the uploader's filename; it picks the format and names
/// the sheet of a CSV file.
pub fn read_roster(path: &Path, display_name: &str) -> Result<Vec<SheetGrid>, RosterError> {
    match RosterFormat::from_filename(display_name)? {
        RosterFormat::Workbook => read_workbook(path, display_name),
        RosterFormat::Csv => {
            let sheet_name = Path::new(display_name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Sheet1".to_string());
            read_csv(path, &sheet_name, display_name).map(|grid| vec![grid])
        }
    }
}

fn read_workbook(path: &Path, display_name: &str) -> Result<Vec<SheetGrid>, RosterError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| RosterError::Unreadable(display_name.to_string(), e.to_string()))?;

    let mut grids = Vec::new();
    for sheet_name in workbook.sheet_names() {
        let range = match workbook.worksheet_range(&sheet_name) {
            Ok(range) => range,
            Err(e) => {
                tracing::warn!(sheet = %sheet_name, error = %e, "Skipping unreadable sheet");
                continue;
            }
        };

        let rows = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();
        grids.push(SheetGrid::new(sheet_name, rows));
    }

    tracing::debug!(file = %display_name, sheets = grids.len(), "Workbook loaded");
    Ok(grids)
}

/// Cell text as a person reading the sheet would see it
fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty => return None,
        Data::String(s) => s.clone(),
        // Integers without decimals: room 203 arrives as 203.0
        Data::Float(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#{:?}", e),
    };
    (!text.is_empty()).then_some(text)
}

fn read_csv(path: &Path, sheet_name: &str, display_name: &str) -> Result<SheetGrid, RosterError> {
    let bytes = std::fs::read(path)
        .map_err(|e| RosterError::Unreadable(display_name.to_string(), e.to_string()))?;
    let text = decode_text(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| RosterError::Unreadable(display_name.to_string(), e.to_string()))?;
        rows.push(
            record
                .iter()
                .map(|field| (!field.is_empty()).then(|| field.to_string()))
                .collect(),
        );
    }

    Ok(SheetGrid::new(sheet_name, rows))
}

/// UTF-8 (BOM stripped), falling back to GBK for legacy exports
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (decoded, _, had_errors) = encoding_rs::GBK.decode(bytes);
            if had_errors {
                tracing::warn!("CSV is neither UTF-8 nor clean GBK; some characters were replaced");
            }
            decoded.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(RosterFormat::from_filename("名单.XLSX").unwrap(), RosterFormat::Workbook);
        assert_eq!(RosterFormat::from_filename("a.xls").unwrap(), RosterFormat::Workbook);
        assert_eq!(RosterFormat::from_filename("a.ods").unwrap(), RosterFormat::Workbook);
        assert_eq!(RosterFormat::from_filename("a.csv").unwrap(), RosterFormat::Csv);
        assert!(matches!(
            RosterFormat::from_filename("a.pdf"),
            Err(RosterError::UnsupportedFormat(_))
        ));
        assert!(RosterFormat::from_filename("noext").is_err());
    }

    #[test]
    fn test_cell_text_formats_numbers() {
        assert_eq!(cell_text(&Data::Float(203.0)).as_deref(), Some("203"));
        assert_eq!(cell_text(&Data::Float(2.5)).as_deref(), Some("2.5"));
        assert_eq!(cell_text(&Data::Int(7)).as_deref(), Some("7"));
        assert_eq!(cell_text(&Data::Empty), None);
        assert_eq!(cell_text(&Data::String(String::new())), None);
        assert_eq!(cell_text(&Data::String(" 李雷 ".into())).as_deref(), Some(" 李雷 "));
    }

    #[test]
    fn test_read_csv_utf8_with_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        std::fs::write(&path, "\u{FEFF}房号,姓名\n203,李雷\n,韩梅梅\n".as_bytes()).unwrap();

        let sheets = read_roster(&path, "名单.csv").unwrap();
        assert_eq!(sheets.len(), 1);
        let grid = &sheets[0];
        assert_eq!(grid.name, "名单");
        assert_eq!(grid.cell(0, 0), Some("房号"));
        assert_eq!(grid.cell(1, 1), Some("李雷"));
        assert_eq!(grid.cell(2, 0), None);
        assert_eq!(grid.cell(2, 1), Some("韩梅梅"));
    }

    #[test]
    fn test_read_csv_gbk_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        let (encoded, _, _) = encoding_rs::GBK.encode("房号,姓名\n203,李雷\n");
        std::fs::write(&path, &encoded[..]).unwrap();

        let sheets = read_roster(&path, "gbk.csv").unwrap();
        assert_eq!(sheets[0].cell(0, 1), Some("姓名"));
        assert_eq!(sheets[0].cell(1, 1), Some("李雷"));
    }

    #[test]
    fn test_unreadable_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a workbook").unwrap();
        assert!(matches!(
            read_roster(&path, "broken.xlsx"),
            Err(RosterError::Unreadable(_, _))
        ));
    }

    #[test]
    fn test_grid_from_strs() {
        let grid = SheetGrid::from_strs("S", &[&["a", ""], &["b"]]);
        assert_eq!(grid.cell(0, 0), Some("a"));
        assert_eq!(grid.cell(0, 1), None);
        assert_eq!(grid.cell(1, 5), None);
        assert_eq!(grid.cell(9, 0), None);
    }
}
