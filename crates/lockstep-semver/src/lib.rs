//! Semantic version parsing, ordering and constraint matching.
//!
//! This crate provides the version arithmetic used by the lockstep solver:
//! parsing of `major.minor.patch[-pre][+build]` versions, precedence
//! ordering, and constraint expressions built from comparators (`=`, `!=`,
//! `<`, `<=`, `>`, `>=`, `~`, `^`, `*`) joined by whitespace (AND) and
//! `||` (OR).

mod constraint;
mod version;

pub use constraint::{Comparator, Constraint, ConstraintError, Operator};
pub use version::{Version, VersionError};
