//! Storage port and its SQLite implementation.
//!
//! # Responsibility
//! - Define the data access contract the import and inference services use.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`MemberNotFound`) in addition to
//!   DB transport errors.

pub mod family_repo;
