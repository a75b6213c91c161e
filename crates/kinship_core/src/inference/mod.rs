//! Birth-year inference engine.
//!
//! # Responsibility
//! - Impute missing birth years from relatives with fixed heuristics.
//! - Keep the algorithm free of storage access so it can run on any snapshot.
//!
//! # See also
//! - `service::inference_service` for load/write orchestration.

pub mod engine;
pub mod settings;
