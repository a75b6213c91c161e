//! Hierarchical genealogy text parsing.
//!
//! # Responsibility
//! - Decode and tokenize documents into typed lines (`tokenizer`).
//! - Reassemble individuals and families from the line stream (`assembler`).
//!
//! # Invariants
//! - Malformed lines are reported, never fatal.
//! - Parsing state lives in values owned by each call; nothing is global.

pub mod assembler;
pub mod tokenizer;
