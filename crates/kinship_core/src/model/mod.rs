//! Domain model for parsed documents and persisted family trees.
//!
//! # Responsibility
//! - Define the records produced by the parser (`individual`).
//! - Define the rows exchanged with the storage port (`family`).
//! - Own the imputed-year display convention (`year`).
//!
//! # Invariants
//! - Parsed records live for one import run only.
//! - Persisted rows are never created or deleted by inference.

pub mod family;
pub mod individual;
pub mod year;
