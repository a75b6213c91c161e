//! Birth-year inference over persisted family members.
//!
//! # Responsibility
//! - Derive missing birth years from relatives, across all families of a tree.
//! - Produce the list of rows to write back; performing the writes is the
//!   caller's job.
//!
//! # Invariants
//! - A year already known (authoritative or imputed) is never replaced.
//! - Every derived year is written with the imputed marker.
//! - Rows holding an authoritative value are never part of the write plan.
//! - The engine runs exactly `InferenceSettings::passes` passes.

use crate::inference::settings::InferenceSettings;
use crate::model::family::{FamilyMember, MemberId, MemberRole};
use crate::model::year::{extract_year, is_imputed, is_unknown, mark_imputed, IMPUTABLE_YEARS};
use log::{debug, warn};
use std::collections::HashMap;

/// Birth years by source individual id, shared across families of one run.
pub type YearIndex = HashMap<String, i32>;

/// One birth-year write produced by inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearUpdate {
    pub member_id: MemberId,
    /// Marked display value, e.g. `[1930]`.
    pub value: String,
}

/// Outcome of one engine run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InferencePlan {
    pub updates: Vec<YearUpdate>,
    /// Rows whose derivation was discarded because they hold an
    /// authoritative value the engine could not read as a year.
    pub protected: usize,
}

/// Seeds the cross-family index from every stored birth year.
pub fn seed_year_index(families: &[Vec<FamilyMember>]) -> YearIndex {
    let mut index = YearIndex::new();
    for member in families.iter().flatten() {
        let (Some(source_id), Some(stored)) = (
            member.source_individual_id.as_deref(),
            member.birth_year.as_deref(),
        ) else {
            continue;
        };
        if let Some(year) = extract_year(stored) {
            index.entry(source_id.to_string()).or_insert(year);
        }
    }
    index
}

/// Runs inference on `families` (each sorted by `sort_order`).
pub fn plan_birth_years(
    families: &[Vec<FamilyMember>],
    settings: &InferenceSettings,
) -> InferencePlan {
    let mut index = seed_year_index(families);
    let mut working = families
        .iter()
        .map(|members| WorkingFamily::new(members))
        .collect::<Vec<_>>();

    for _ in 0..settings.passes {
        for family in &mut working {
            family.run_pass(&mut index, settings);
        }
    }

    let mut plan = InferencePlan::default();
    for family in &working {
        family.collect_updates(&mut plan);
    }
    plan
}

struct WorkingFamily<'a> {
    members: &'a [FamilyMember],
    years: Vec<Option<i32>>,
    derived: Vec<bool>,
    husband: Option<usize>,
    wife: Option<usize>,
    children: Vec<usize>,
}

impl<'a> WorkingFamily<'a> {
    fn new(members: &'a [FamilyMember]) -> Self {
        let mut husband = None;
        let mut wife = None;
        let mut children = Vec::new();
        for (slot, member) in members.iter().enumerate() {
            match member.role {
                MemberRole::Husband if husband.is_none() => husband = Some(slot),
                MemberRole::Wife if wife.is_none() => wife = Some(slot),
                MemberRole::Child => children.push(slot),
                _ => {}
            }
        }

        Self {
            members,
            years: members
                .iter()
                .map(|member| member.birth_year.as_deref().and_then(extract_year))
                .collect(),
            derived: vec![false; members.len()],
            husband,
            wife,
            children,
        }
    }

    fn year_of(&self, slot: Option<usize>) -> Option<i32> {
        slot.and_then(|slot| self.years[slot])
    }

    fn earliest_child_year(&self) -> Option<i32> {
        self.children
            .iter()
            .filter_map(|slot| self.years[*slot])
            .min()
    }

    fn run_pass(&mut self, index: &mut YearIndex, settings: &InferenceSettings) {
        self.absorb_index(index);

        let earliest_child = self.earliest_child_year();
        if let (Some(wife), Some(child_year)) = (self.wife, earliest_child) {
            if self.years[wife].is_none() {
                self.derive(wife, child_year - settings.wife_years_before_child, index);
            }
        }
        // Only when the wife step could not supply a year.
        if let (Some(husband), Some(child_year)) = (self.husband, earliest_child) {
            if self.years[husband].is_none() && self.year_of(self.wife).is_none() {
                self.derive(husband, child_year - settings.husband_years_before_child, index);
            }
        }

        match (self.year_of(self.husband), self.year_of(self.wife)) {
            (Some(husband_year), None) => {
                if let Some(wife) = self.wife {
                    self.derive(wife, husband_year + settings.spouse_gap, index);
                }
            }
            (None, Some(wife_year)) => {
                if let Some(husband) = self.husband {
                    self.derive(husband, wife_year + settings.spouse_gap, index);
                }
            }
            _ => {}
        }

        let wife_year = self.year_of(self.wife);
        let mut previous_sibling = None;
        for position in 0..self.children.len() {
            let slot = self.children[position];
            if self.years[slot].is_none() {
                let candidate = if position == 0 {
                    wife_year.map(|year| year + settings.first_child_after_wife)
                } else {
                    previous_sibling.map(|year| year + settings.sibling_gap)
                };
                if let Some(year) = candidate {
                    self.derive(slot, year, index);
                }
            }
            if let Some(year) = self.years[slot] {
                previous_sibling = Some(year);
            }
        }
    }

    fn absorb_index(&mut self, index: &YearIndex) {
        for slot in 0..self.members.len() {
            if self.years[slot].is_some() {
                continue;
            }
            let indexed = self.members[slot]
                .source_individual_id
                .as_ref()
                .and_then(|source_id| index.get(source_id));
            if let Some(year) = indexed {
                self.years[slot] = Some(*year);
                self.derived[slot] = true;
            }
        }
    }

    fn derive(&mut self, slot: usize, year: i32, index: &mut YearIndex) {
        // The slot stays unknown; a later pass may reach it another way.
        if !IMPUTABLE_YEARS.contains(&year) {
            debug!(
                "event=inference_derive module=inference status=skip reason=year_out_of_range member_id={} year={}",
                self.members[slot].id, year
            );
            return;
        }
        self.years[slot] = Some(year);
        self.derived[slot] = true;
        if let Some(source_id) = &self.members[slot].source_individual_id {
            index.entry(source_id.clone()).or_insert(year);
        }
    }

    fn collect_updates(&self, plan: &mut InferencePlan) {
        for (slot, member) in self.members.iter().enumerate() {
            let (true, Some(year)) = (self.derived[slot], self.years[slot]) else {
                continue;
            };
            let value = mark_imputed(year);
            let stored = member.birth_year.as_deref();
            if stored == Some(value.as_str()) {
                continue;
            }
            if !is_unknown(stored) && !stored.is_some_and(is_imputed) {
                warn!(
                    "event=inference_write module=inference status=skip reason=authoritative_value member_id={}",
                    member.id
                );
                plan.protected += 1;
                continue;
            }
            plan.updates.push(YearUpdate {
                member_id: member.id,
                value,
            });
        }
    }
}
