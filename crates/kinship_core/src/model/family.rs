//! Persisted family records and member rows.
//!
//! # Responsibility
//! - Define the read models returned by the storage port.
//! - Define the write models the importer hands to the storage port.
//!
//! # Invariants
//! - `sort_order` is 1 for the husband, 2 for the wife, 3.. for children.
//! - Year fields are display strings; a bracketed value is imputed
//!   (see [`crate::model::year`]).

use crate::model::individual::Sex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TreeId = Uuid;
pub type OwnerId = Uuid;
pub type FamilyRecordId = Uuid;
pub type MemberId = Uuid;

pub const HUSBAND_SORT_ORDER: i64 = 1;
pub const WIFE_SORT_ORDER: i64 = 2;
pub const FIRST_CHILD_SORT_ORDER: i64 = 3;

/// Slot a member occupies inside one family record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Husband,
    Wife,
    Child,
}

impl MemberRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Husband => "husband",
            Self::Wife => "wife",
            Self::Child => "child",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "husband" => Some(Self::Husband),
            "wife" => Some(Self::Wife),
            "child" => Some(Self::Child),
            _ => None,
        }
    }
}

/// Which year column of a member row an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearField {
    Birth,
    Death,
}

impl YearField {
    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::Birth => "birth_year",
            Self::Death => "death_year",
        }
    }
}

/// Persisted household unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyRecord {
    pub id: FamilyRecordId,
    pub tree_id: TreeId,
    pub owner_id: OwnerId,
    pub name: String,
    /// Composition code, e.g. `MZDD` for husband, wife and two children.
    pub structure_pattern: String,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub modified_at: i64,
    pub enabled: bool,
}

/// One person's data attached to one family record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: MemberId,
    pub family_record_id: FamilyRecordId,
    pub role: MemberRole,
    pub full_name: String,
    pub birth_year: Option<String>,
    pub birth_place: Option<String>,
    pub death_year: Option<String>,
    pub death_place: Option<String>,
    pub gender: Sex,
    /// Document id of the individual, used to link appearances across families.
    pub source_individual_id: Option<String>,
    pub sort_order: i64,
}

impl FamilyMember {
    pub fn year(&self, field: YearField) -> Option<&str> {
        match field {
            YearField::Birth => self.birth_year.as_deref(),
            YearField::Death => self.death_year.as_deref(),
        }
    }
}

/// Write model for one family record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFamilyRecord {
    pub tree_id: TreeId,
    pub owner_id: OwnerId,
    pub name: String,
    pub structure_pattern: String,
}

/// Write model for one member row of a family record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub role: MemberRole,
    pub full_name: String,
    pub birth_year: Option<String>,
    pub birth_place: Option<String>,
    pub death_year: Option<String>,
    pub death_place: Option<String>,
    pub gender: Sex,
    pub source_individual_id: Option<String>,
    pub sort_order: i64,
}
