use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use crate::atoms::PackageAndVersion;
use crate::sat::{Lit, Var};

/// A version constraint, opaque to the solver.
///
/// The solver only ever looks at the raw text (for memoization keys and
/// messages); deciding whether a version satisfies the constraint is
/// delegated to a [`ConstraintMatcher`]. Two constraints with equal raw
/// text are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionConstraint {
    raw: String,
}

impl VersionConstraint {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The constraint text.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for VersionConstraint {
    fn from(raw: &str) -> Self {
        VersionConstraint::new(raw)
    }
}

impl From<String> for VersionConstraint {
    fn from(raw: String) -> Self {
        VersionConstraint::new(raw)
    }
}

/// Decides whether a version satisfies a constraint.
pub trait ConstraintMatcher {
    fn satisfies(&self, constraint: &VersionConstraint, version: &str) -> bool;
}

/// A [`ConstraintMatcher`] backed by `lockstep-semver`.
///
/// Parsed constraints are cached by their raw text, so repeated checks
/// against the same constraint parse once. An unparseable constraint
/// matches every version rather than failing the solve.
#[derive(Debug, Default)]
pub struct SemverMatcher {
    parsed: RefCell<HashMap<String, Option<lockstep_semver::Constraint>>>,
}

impl SemverMatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConstraintMatcher for SemverMatcher {
    fn satisfies(&self, constraint: &VersionConstraint, version: &str) -> bool {
        let mut cache = self.parsed.borrow_mut();
        let parsed = cache
            .entry(constraint.raw().to_string())
            .or_insert_with(|| lockstep_semver::Constraint::parse(constraint.raw()).ok());
        match parsed {
            Some(parsed) => parsed.satisfies(version),
            None => true,
        }
    }
}

/// A collected constraint, ready for clause generation and explanation.
///
/// `from` is the package-version whose dependency produced the constraint,
/// or `None` for a top-level constraint. `conflict_var`, when true in a
/// model, waives the constraint; minimizing the number of true conflict
/// variables finds the smallest set of constraints that must be dropped.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub from: Option<PackageAndVersion>,
    pub package: String,
    pub constraint: VersionConstraint,
    pub conflict_var: Var,
}

/// The boolean shape of "some selected version of the package satisfies
/// the constraint".
#[derive(Debug, Clone)]
pub enum ConstraintFormula {
    /// Every candidate version satisfies the constraint.
    Always,
    /// `¬package ∨ pv₁ ∨ ... ∨ pvₙ` over the satisfying versions.
    Clause(Vec<Lit>),
}

/// Memoizes constraint formulas by `"<package>@<raw>"`.
///
/// Many dependency edges carry the same (package, constraint) pair; the
/// by-value key makes all of them share one formula.
#[derive(Debug, Default)]
pub struct FormulaCache {
    memo: HashMap<String, ConstraintFormula>,
}

impl FormulaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(package: &str, constraint: &VersionConstraint) -> String {
        format!("{}@{}", package, constraint.raw())
    }

    pub fn get(&self, key: &str) -> Option<&ConstraintFormula> {
        self.memo.get(key)
    }

    pub fn insert(&mut self, key: String, formula: ConstraintFormula) {
        self.memo.insert(key, formula);
    }

    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }
}
