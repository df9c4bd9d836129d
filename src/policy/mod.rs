//! Transfer policy enforcement
//!
//! This module provides:
//! - Policy rules (spend limit, denylist, allowlist)
//! - The validator that runs them against a proposed transfer

pub mod engine;
pub mod rules;

pub use engine::{validate, AccountPolicy};
pub use rules::PolicyViolation;
