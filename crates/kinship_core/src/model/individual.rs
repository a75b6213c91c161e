//! Parsed document records.
//!
//! # Responsibility
//! - Hold individuals and family drafts reconstructed from one document.
//!
//! # Invariants
//! - Ids and references are stored without their `@` delimiters.
//! - `FamilyDraft::child_refs` keeps document order.
//! - Date fields hold the verbatim source value; nothing here interprets them.

use serde::{Deserialize, Serialize};

/// Biological sex as recorded in the source document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Sex {
    /// Maps a raw `SEX` value. Only unambiguous `M`/`F` are recognized.
    pub fn from_raw(value: &str) -> Self {
        match value.trim() {
            "M" | "m" => Self::Male,
            "F" | "f" => Self::Female,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// One person extracted from the source document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Individual {
    /// Document-local id, e.g. `I12`.
    pub id: String,
    /// Display name with surname delimiters removed.
    pub name: String,
    pub sex: Sex,
    pub birth_date: Option<String>,
    pub birth_place: Option<String>,
    pub death_date: Option<String>,
    pub death_place: Option<String>,
}

impl Individual {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Household unit as referenced by the source document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyDraft {
    pub id: String,
    pub husband_ref: Option<String>,
    pub wife_ref: Option<String>,
    /// Child references in document order (usually birth order).
    pub child_refs: Vec<String>,
}

impl FamilyDraft {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Sex;

    #[test]
    fn sex_from_raw_only_accepts_unambiguous_values() {
        assert_eq!(Sex::from_raw("M"), Sex::Male);
        assert_eq!(Sex::from_raw(" F "), Sex::Female);
        assert_eq!(Sex::from_raw("U"), Sex::Unknown);
        assert_eq!(Sex::from_raw("MF"), Sex::Unknown);
    }

    #[test]
    fn sex_storage_names_roundtrip() {
        for sex in [Sex::Male, Sex::Female, Sex::Unknown] {
            assert_eq!(Sex::parse(sex.as_str()), Some(sex));
        }
        assert_eq!(Sex::parse("M"), None);
    }
}
