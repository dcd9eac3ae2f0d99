//! Roster records extracted from spreadsheets

use serde::{Deserialize, Serialize};

/// How records of one sheet are matched against documents
///
/// Decided once per sheet from the columns present; never mixed per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchingMode {
    /// Room number plus name; room disambiguates same-name participants
    RoomName,
    /// Name only; identity-document number is shown to a human when names collide
    NameOnly,
}

impl std::fmt::Display for MatchingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchingMode::RoomName => write!(f, "room-name"),
            MatchingMode::NameOnly => write!(f, "name-only"),
        }
    }
}

/// One expected participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_document: Option<String>,
}

impl RosterRecord {
    /// Fields used to identify this record to a human, per matching mode
    pub fn descriptor(&self, mode: MatchingMode) -> IdentityDescriptor {
        match mode {
            MatchingMode::RoomName => IdentityDescriptor {
                room: self.room.clone(),
                name: self.name.clone(),
                id_document: None,
            },
            MatchingMode::NameOnly => IdentityDescriptor {
                room: None,
                name: self.name.clone(),
                id_document: self.id_document.clone(),
            },
        }
    }
}

/// Human-facing identity of a roster record (reported for unmatched records)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_document: Option<String>,
}

/// One validated roster sheet
///
/// Always holds at least one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetParseResult {
    mode: MatchingMode,
    records: Vec<RosterRecord>,
    sheet_name: String,
}

impl SheetParseResult {
    /// Returns `None` when `records` is empty
    pub fn new(mode: MatchingMode, records: Vec<RosterRecord>, sheet_name: impl Into<String>) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        Some(Self {
            mode,
            records,
            sheet_name: sheet_name.into(),
        })
    }

    pub fn mode(&self) -> MatchingMode {
        self.mode
    }

    pub fn records(&self) -> &[RosterRecord] {
        &self.records
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RosterRecord {
        RosterRecord {
            name: "李 雷".to_string(),
            room: Some("203".to_string()),
            id_document: Some("E12345678".to_string()),
        }
    }

    #[test]
    fn test_sheet_requires_records() {
        assert!(SheetParseResult::new(MatchingMode::RoomName, vec![], "Sheet1").is_none());
        let sheet = SheetParseResult::new(MatchingMode::RoomName, vec![record()], "Sheet1").unwrap();
        assert_eq!(sheet.records().len(), 1);
        assert_eq!(sheet.sheet_name(), "Sheet1");
    }

    #[test]
    fn test_descriptor_follows_mode() {
        let room_name = record().descriptor(MatchingMode::RoomName);
        assert_eq!(room_name.room.as_deref(), Some("203"));
        assert!(room_name.id_document.is_none());

        let name_only = record().descriptor(MatchingMode::NameOnly);
        assert!(name_only.room.is_none());
        assert_eq!(name_only.id_document.as_deref(), Some("E12345678"));
    }

    #[test]
    fn test_mode_serializes_kebab_case() {
        assert_eq!(serde_json::to_string(&MatchingMode::RoomName).unwrap(), "\"room-name\"");
        assert_eq!(serde_json::to_string(&MatchingMode::NameOnly).unwrap(), "\"name-only\"");
        assert_eq!(MatchingMode::NameOnly.to_string(), "name-only");
    }
}
