//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate parser, engine and repository calls into entry points.
//! - Keep callers decoupled from storage details.

pub mod import_service;
pub mod inference_service;
