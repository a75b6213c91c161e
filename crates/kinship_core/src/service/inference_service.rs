//! Inference use-case service.
//!
//! # Responsibility
//! - Load one tree's member rows, run the inference engine, write results.
//! - Strip imputed years back to unknown on reset.
//!
//! # Invariants
//! - Only `birth_year`/`death_year` of existing rows are ever modified.
//! - Reset touches only values carrying the imputed marker.
//! - Runs on the same tree must be serialized by the caller.

use crate::inference::engine::plan_birth_years;
use crate::inference::settings::InferenceSettings;
use crate::model::family::{FamilyMember, FamilyRecordId, TreeId, YearField};
use crate::model::year::is_imputed;
use crate::repo::family_repo::{FamilyRepository, RepoError};
use log::{error, info};
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Errors from inference and reset runs.
#[derive(Debug)]
pub enum InferenceError {
    Storage { tree_id: TreeId, source: RepoError },
}

impl Display for InferenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage { tree_id, source } => {
                write!(f, "inference storage failure in tree {tree_id}: {source}")
            }
        }
    }
}

impl Error for InferenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage { source, .. } => Some(source),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InferenceReport {
    /// Member rows written.
    pub updated: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    /// Member rows with at least one imputed year cleared.
    pub cleared: usize,
}

/// Inference use-case facade.
pub struct InferenceService<R: FamilyRepository> {
    repo: R,
    settings: InferenceSettings,
}

impl<R: FamilyRepository> InferenceService<R> {
    pub fn new(repo: R) -> Self {
        Self::with_settings(repo, InferenceSettings::default())
    }

    pub fn with_settings(repo: R, settings: InferenceSettings) -> Self {
        Self { repo, settings }
    }

    pub fn settings(&self) -> &InferenceSettings {
        &self.settings
    }

    /// Imputes missing birth years across the whole tree.
    ///
    /// # Errors
    /// - `InferenceError::Storage` when reading or writing rows fails. Rows
    ///   written before the failure keep their new values.
    pub fn run_inference(&self, tree_id: TreeId) -> Result<InferenceReport, InferenceError> {
        let started_at = Instant::now();
        let families = self.load_families(tree_id)?;
        let plan = plan_birth_years(&families, &self.settings);

        for update in &plan.updates {
            self.repo
                .update_member_year(update.member_id, YearField::Birth, &update.value)
                .map_err(|source| storage_failure("run_inference", tree_id, source))?;
        }

        info!(
            "event=run_inference module=inference status=ok tree_id={} families={} updated={} protected={} passes={} duration_ms={}",
            tree_id,
            families.len(),
            plan.updates.len(),
            plan.protected,
            self.settings.passes,
            started_at.elapsed().as_millis()
        );
        Ok(InferenceReport {
            updated: plan.updates.len(),
        })
    }

    /// Clears every imputed birth/death year of the tree. Idempotent.
    pub fn reset_inference(&self, tree_id: TreeId) -> Result<ResetReport, InferenceError> {
        let started_at = Instant::now();
        let members = self.load_members(tree_id)?;

        let mut cleared = 0;
        for member in &members {
            let mut touched = false;
            for field in [YearField::Birth, YearField::Death] {
                if !member.year(field).is_some_and(is_imputed) {
                    continue;
                }
                self.repo
                    .clear_member_year(member.id, field)
                    .map_err(|source| storage_failure("reset_inference", tree_id, source))?;
                touched = true;
            }
            if touched {
                cleared += 1;
            }
        }

        info!(
            "event=reset_inference module=inference status=ok tree_id={} cleared={} duration_ms={}",
            tree_id,
            cleared,
            started_at.elapsed().as_millis()
        );
        Ok(ResetReport { cleared })
    }

    /// Member rows of the tree grouped per family, in family creation order.
    fn load_families(&self, tree_id: TreeId) -> Result<Vec<Vec<FamilyMember>>, InferenceError> {
        let family_ids = self.load_family_ids(tree_id)?;
        let members = self
            .repo
            .list_members(&family_ids)
            .map_err(|source| storage_failure("list_members", tree_id, source))?;

        let mut grouped: HashMap<FamilyRecordId, Vec<FamilyMember>> = HashMap::new();
        for member in members {
            grouped
                .entry(member.family_record_id)
                .or_default()
                .push(member);
        }

        Ok(family_ids
            .iter()
            .map(|family_id| {
                let mut family = grouped.remove(family_id).unwrap_or_default();
                family.sort_by_key(|member| member.sort_order);
                family
            })
            .collect())
    }

    fn load_members(&self, tree_id: TreeId) -> Result<Vec<FamilyMember>, InferenceError> {
        let family_ids = self.load_family_ids(tree_id)?;
        self.repo
            .list_members(&family_ids)
            .map_err(|source| storage_failure("list_members", tree_id, source))
    }

    fn load_family_ids(&self, tree_id: TreeId) -> Result<Vec<FamilyRecordId>, InferenceError> {
        let records = self
            .repo
            .list_family_records(tree_id)
            .map_err(|source| storage_failure("list_family_records", tree_id, source))?;
        Ok(records.into_iter().map(|record| record.id).collect())
    }
}

fn storage_failure(operation: &str, tree_id: TreeId, source: RepoError) -> InferenceError {
    error!(
        "event={} module=inference status=error tree_id={} error={}",
        operation, tree_id, source
    );
    InferenceError::Storage { tree_id, source }
}
