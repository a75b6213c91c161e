//! Document import use-case service.
//!
//! # Responsibility
//! - Turn raw document bytes into persisted family records and member rows.
//! - Report skipped lines as diagnostics instead of failing the import.
//!
//! # Invariants
//! - Each family is written atomically through `FamilyRepository::persist_family`.
//! - A storage failure stops the import; families written before it stay.
//! - Dangling references omit the slot; they are never an error.
//! - Dates are copied verbatim from the document.

use crate::model::family::{
    MemberRole, NewFamilyRecord, NewMember, OwnerId, TreeId, FIRST_CHILD_SORT_ORDER,
    HUSBAND_SORT_ORDER, WIFE_SORT_ORDER,
};
use crate::model::individual::{FamilyDraft, Individual};
use crate::parse::assembler::{assemble, AssembledDocument};
use crate::parse::tokenizer::{
    decode_document, lossy_line_numbers, split_diagnostics, tokenize, DecodeError,
    LineDiagnostic,
};
use crate::repo::family_repo::{FamilyRepository, RepoError};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const FAMILY_NAME_CONNECTOR: &str = " & ";
const UNNAMED_FAMILY: &str = "Unnamed family";

/// Errors that abort an import.
#[derive(Debug)]
pub enum ImportError {
    /// Input bytes cannot be decoded at all; nothing was written.
    DocumentUnreadable(DecodeError),
    /// Persisting one family failed.
    Storage {
        /// Document id of the family that failed.
        family_id: String,
        tree_id: TreeId,
        /// Families committed before the failure.
        families_committed: usize,
        source: RepoError,
    },
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentUnreadable(err) => write!(f, "document unreadable: {err}"),
            Self::Storage {
                family_id,
                tree_id,
                families_committed,
                source,
            } => write!(
                f,
                "failed to store family `{family_id}` in tree {tree_id} after {families_committed} committed families: {source}"
            ),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::DocumentUnreadable(err) => Some(err),
            Self::Storage { source, .. } => Some(source),
        }
    }
}

/// Counts of rows written by one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub families_created: usize,
    pub members_created: usize,
}

/// Result of a whole-document import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub families_created: usize,
    pub members_created: usize,
    /// Lines skipped because they did not match the line grammar.
    pub diagnostics: Vec<LineDiagnostic>,
    /// Lines kept with undecodable bytes replaced by U+FFFD.
    pub lossy_lines: Vec<usize>,
}

/// Rows prepared for one family draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyPlan {
    pub record: NewFamilyRecord,
    pub members: Vec<NewMember>,
}

/// Import use-case facade.
pub struct ImportService<R: FamilyRepository> {
    repo: R,
}

impl<R: FamilyRepository> ImportService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Decodes, parses and persists one document into `tree_id`.
    ///
    /// # Errors
    /// - `ImportError::DocumentUnreadable` when the bytes cannot be decoded.
    /// - `ImportError::Storage` when a family cannot be written.
    pub fn import_document(
        &self,
        raw: &[u8],
        tree_id: TreeId,
        owner_id: OwnerId,
    ) -> Result<ImportReport, ImportError> {
        let started_at = Instant::now();
        let text = decode_document(raw).map_err(|err| {
            error!(
                "event=import_document module=import status=error tree_id={} bytes={} error_code=document_unreadable error={}",
                tree_id,
                raw.len(),
                err
            );
            ImportError::DocumentUnreadable(err)
        })?;

        let lossy_lines = lossy_line_numbers(&text);
        for line_number in &lossy_lines {
            warn!(
                "event=line_lossy module=import tree_id={} line={} reason=invalid_utf8_replaced",
                tree_id, line_number
            );
        }

        let mut diagnostics = Vec::new();
        let document = assemble(split_diagnostics(tokenize(&text), &mut diagnostics));
        for diagnostic in &diagnostics {
            warn!(
                "event=line_skipped module=import tree_id={} line={} reason={}",
                tree_id, diagnostic.line_number, diagnostic.reason
            );
        }

        let summary = self.import_records(&document, tree_id, owner_id)?;
        info!(
            "event=import_document module=import status=ok tree_id={} individuals={} families={} members={} skipped_lines={} duration_ms={}",
            tree_id,
            document.individuals.len(),
            summary.families_created,
            summary.members_created,
            diagnostics.len(),
            started_at.elapsed().as_millis()
        );

        Ok(ImportReport {
            families_created: summary.families_created,
            members_created: summary.members_created,
            diagnostics,
            lossy_lines,
        })
    }

    /// Persists already-assembled records, one transaction per family, in
    /// document order.
    pub fn import_records(
        &self,
        document: &AssembledDocument,
        tree_id: TreeId,
        owner_id: OwnerId,
    ) -> Result<ImportSummary, ImportError> {
        let mut summary = ImportSummary::default();
        for draft in document.families() {
            let plan = plan_family(document, draft, tree_id, owner_id);
            if let Err(source) = self.repo.persist_family(&plan.record, &plan.members) {
                error!(
                    "event=import_family module=import status=error tree_id={} family={} committed={} error={}",
                    tree_id, draft.id, summary.families_created, source
                );
                return Err(ImportError::Storage {
                    family_id: draft.id.clone(),
                    tree_id,
                    families_committed: summary.families_created,
                    source,
                });
            }
            summary.families_created += 1;
            summary.members_created += plan.members.len();
        }
        Ok(summary)
    }
}

/// Builds the record and ordered member rows for one family draft.
pub fn plan_family(
    document: &AssembledDocument,
    draft: &FamilyDraft,
    tree_id: TreeId,
    owner_id: OwnerId,
) -> FamilyPlan {
    let husband = resolve(document, draft, draft.husband_ref.as_deref());
    let wife = resolve(document, draft, draft.wife_ref.as_deref());

    let mut members = Vec::with_capacity(2 + draft.child_refs.len());
    if let Some(husband) = husband {
        members.push(new_member(husband, MemberRole::Husband, HUSBAND_SORT_ORDER));
    }
    if let Some(wife) = wife {
        members.push(new_member(wife, MemberRole::Wife, WIFE_SORT_ORDER));
    }
    let children = draft
        .child_refs
        .iter()
        .filter_map(|child_ref| resolve(document, draft, Some(child_ref.as_str())));
    for (sort_order, child) in (FIRST_CHILD_SORT_ORDER..).zip(children) {
        members.push(new_member(child, MemberRole::Child, sort_order));
    }

    FamilyPlan {
        record: NewFamilyRecord {
            tree_id,
            owner_id,
            name: family_display_name(husband, wife),
            structure_pattern: structure_pattern(
                husband.is_some(),
                wife.is_some(),
                draft.child_refs.len(),
            ),
        },
        members,
    }
}

/// Composition code: `M` husband, `Z` wife, one `D` per child reference.
pub fn structure_pattern(husband_present: bool, wife_present: bool, child_refs: usize) -> String {
    let mut pattern = String::with_capacity(2 + child_refs);
    if husband_present {
        pattern.push('M');
    }
    if wife_present {
        pattern.push('Z');
    }
    pattern.extend(std::iter::repeat('D').take(child_refs));
    pattern
}

/// Family label from the spouses' names.
pub fn family_display_name(husband: Option<&Individual>, wife: Option<&Individual>) -> String {
    let names = [husband, wife]
        .into_iter()
        .flatten()
        .map(|person| person.name.trim())
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>();
    if names.is_empty() {
        UNNAMED_FAMILY.to_string()
    } else {
        names.join(FAMILY_NAME_CONNECTOR)
    }
}

fn resolve<'d>(
    document: &'d AssembledDocument,
    draft: &FamilyDraft,
    reference: Option<&str>,
) -> Option<&'d Individual> {
    let reference = reference?;
    let resolved = document.individual(reference);
    if resolved.is_none() {
        debug!(
            "event=dangling_reference module=import family={} reference={}",
            draft.id, reference
        );
    }
    resolved
}

fn new_member(individual: &Individual, role: MemberRole, sort_order: i64) -> NewMember {
    NewMember {
        role,
        full_name: individual.name.clone(),
        birth_year: individual.birth_date.clone(),
        birth_place: individual.birth_place.clone(),
        death_year: individual.death_date.clone(),
        death_place: individual.death_place.clone(),
        gender: individual.sex,
        source_individual_id: Some(individual.id.clone()),
        sort_order,
    }
}

#[cfg(test)]
mod tests {
    use super::{family_display_name, plan_family, structure_pattern};
    use crate::model::family::MemberRole;
    use crate::model::individual::{Individual, Sex};
    use crate::parse::assembler::assemble;
    use crate::parse::tokenizer::tokenize;
    use uuid::Uuid;

    fn person(id: &str, name: &str) -> Individual {
        Individual {
            name: name.to_string(),
            ..Individual::new(id)
        }
    }

    #[test]
    fn structure_pattern_counts_every_child_reference() {
        assert_eq!(structure_pattern(true, true, 2), "MZDD");
        assert_eq!(structure_pattern(false, true, 1), "ZD");
        assert_eq!(structure_pattern(false, false, 0), "");
    }

    #[test]
    fn display_name_drops_missing_sides() {
        let husband = person("I1", "Jan Novak");
        let wife = person("I2", "Eva Novakova");
        let blank = person("I3", "  ");
        assert_eq!(
            family_display_name(Some(&husband), Some(&wife)),
            "Jan Novak & Eva Novakova"
        );
        assert_eq!(family_display_name(None, Some(&wife)), "Eva Novakova");
        assert_eq!(family_display_name(Some(&husband), Some(&blank)), "Jan Novak");
        assert_eq!(family_display_name(None, None), "Unnamed family");
    }

    #[test]
    fn plan_skips_dangling_slots_and_compacts_child_order() {
        let document = assemble(
            tokenize(
                "0 @I1@ INDI\n1 NAME Jan /Novak/\n1 SEX M\n1 BIRT\n2 DATE 1919\n\
                 0 @I3@ INDI\n1 NAME Petr /Novak/\n\
                 0 @F1@ FAM\n1 HUSB @I1@\n1 WIFE @I9@\n1 CHIL @I8@\n1 CHIL @I3@\n",
            )
            .filter_map(Result::ok),
        );
        let draft = document.family("F1").unwrap();
        let plan = plan_family(&document, draft, Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(plan.record.structure_pattern, "MDD");
        assert_eq!(plan.record.name, "Jan Novak");
        assert_eq!(plan.members.len(), 2);

        let husband = &plan.members[0];
        assert_eq!(husband.role, MemberRole::Husband);
        assert_eq!(husband.sort_order, 1);
        assert_eq!(husband.gender, Sex::Male);
        assert_eq!(husband.birth_year.as_deref(), Some("1919"));
        assert_eq!(husband.source_individual_id.as_deref(), Some("I1"));

        let child = &plan.members[1];
        assert_eq!(child.role, MemberRole::Child);
        assert_eq!(child.sort_order, 3);
        assert_eq!(child.gender, Sex::Unknown);
    }
}
