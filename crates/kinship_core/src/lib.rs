//! Core domain logic for Kinship family trees.
//!
//! Parses hierarchical genealogy documents into family records, persists them
//! through the [`FamilyRepository`] port, and imputes missing birth years.

pub mod db;
pub mod inference;
pub mod logging;
pub mod model;
pub mod parse;
pub mod repo;
pub mod service;

pub use inference::engine::{plan_birth_years, InferencePlan, YearUpdate};
pub use inference::settings::InferenceSettings;
pub use logging::{default_log_level, init_logging, init_logging_from_env, logging_status};
pub use model::family::{
    FamilyMember, FamilyRecord, FamilyRecordId, MemberId, MemberRole, NewFamilyRecord, NewMember,
    OwnerId, TreeId, YearField,
};
pub use model::individual::{FamilyDraft, Individual, Sex};
pub use parse::assembler::{assemble, AssembledDocument, EventContext, RecordAssembler};
pub use parse::tokenizer::{decode_document, tokenize, DecodeError, LineDiagnostic, RawLine};
pub use repo::family_repo::{FamilyRepository, RepoError, RepoResult, SqliteFamilyRepository};
pub use service::import_service::{ImportError, ImportReport, ImportService, ImportSummary};
pub use service::inference_service::{
    InferenceError, InferenceReport, InferenceService, ResetReport,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
