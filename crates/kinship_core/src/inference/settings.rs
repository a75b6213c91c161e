//! Tunable constants for birth-year inference.

use serde::{Deserialize, Serialize};

/// Pass budget and year offsets used by the inference engine.
///
/// Missing fields fall back to their defaults when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    /// Full passes over all families. Not a convergence loop.
    pub passes: u32,
    /// Wife = earliest child year minus this.
    pub wife_years_before_child: i32,
    /// Husband = earliest child year minus this, only when no wife year exists.
    pub husband_years_before_child: i32,
    /// Added to the known spouse's year to impute the other spouse.
    pub spouse_gap: i32,
    /// First child = wife year plus this.
    pub first_child_after_wife: i32,
    /// Later child = preceding sibling year plus this.
    pub sibling_gap: i32,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            passes: 3,
            wife_years_before_child: 20,
            husband_years_before_child: 30,
            spouse_gap: 10,
            first_child_after_wife: 20,
            sibling_gap: 3,
        }
    }
}
