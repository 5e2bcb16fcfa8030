use indexmap::{IndexMap, IndexSet};

use crate::catalog::Catalog;
use crate::constraints::VersionConstraint;

/// Everything a single solve works from, read-only for its duration.
#[derive(Debug, Default)]
pub struct Input {
    /// Root package names, in order, unique.
    pub dependencies: Vec<String>,
    /// Top-level version constraints, in order.
    pub constraints: Vec<(String, VersionConstraint)>,
    /// The previously chosen version per package, if any.
    pub previous_solution: IndexMap<String, String>,
    /// Packages the caller wants moved forward.
    pub upgrade: IndexSet<String>,
    /// Prereleases that should not be penalized, per package.
    pub anticipated_prereleases: IndexMap<String, IndexSet<String>>,
    /// Whether a root may cross an incompatible version boundary without
    /// an error.
    pub allow_incompatible_update: bool,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root dependency. Duplicates are ignored.
    pub fn dependency(&mut self, package: impl Into<String>) -> &mut Self {
        let package = package.into();
        if !self.dependencies.contains(&package) {
            self.dependencies.push(package);
        }
        self
    }

    /// Add a top-level version constraint.
    pub fn constrain(
        &mut self,
        package: impl Into<String>,
        constraint: impl Into<VersionConstraint>,
    ) -> &mut Self {
        self.constraints.push((package.into(), constraint.into()));
        self
    }

    /// Record the previously selected version of a package.
    pub fn previous(
        &mut self,
        package: impl Into<String>,
        version: impl Into<String>,
    ) -> &mut Self {
        self.previous_solution.insert(package.into(), version.into());
        self
    }

    /// Mark a package for upgrade.
    pub fn upgrade(&mut self, package: impl Into<String>) -> &mut Self {
        self.upgrade.insert(package.into());
        self
    }

    /// Whitelist a prerelease so it carries no prerelease penalty.
    pub fn anticipate_prerelease(
        &mut self,
        package: impl Into<String>,
        version: impl Into<String>,
    ) -> &mut Self {
        self.anticipated_prereleases
            .entry(package.into())
            .or_default()
            .insert(version.into());
        self
    }

    /// Allow roots to cross incompatible version boundaries.
    pub fn allow_incompatible_update(&mut self, allow: bool) -> &mut Self {
        self.allow_incompatible_update = allow;
        self
    }

    /// Whether the catalog knows any version of `package`.
    pub fn is_known_package(&self, catalog: &dyn Catalog, package: &str) -> bool {
        !catalog.versions_of(package).is_empty()
    }

    pub fn is_root_dependency(&self, package: &str) -> bool {
        self.dependencies.iter().any(|root| root == package)
    }

    pub fn is_in_previous_solution(&self, package: &str) -> bool {
        self.previous_solution.contains_key(package)
    }

    pub fn is_upgrading(&self, package: &str) -> bool {
        self.upgrade.contains(package)
    }

    /// Whether `version` of `package` is a whitelisted prerelease.
    pub fn is_anticipated_prerelease(&self, package: &str, version: &str) -> bool {
        self.anticipated_prereleases
            .get(package)
            .is_some_and(|versions| versions.contains(version))
    }
}

/// Per-call options for [`crate::Solver::solve`].
#[derive(Default)]
pub struct SolveOptions<'a> {
    /// Also enumerate every other solution achieving the same optima.
    pub all_answers: bool,
    /// Called between backend progress events so the host can yield, e.g.
    /// to refresh a progress display. Must not re-enter the solver.
    pub nudge: Option<&'a dyn Fn()>,
}

/// The outcome of a successful solve.
#[derive(Debug, Clone, Default)]
pub struct Solution {
    /// Exactly one version per reachable, selected package.
    pub answer: IndexMap<String, String>,
    /// Whether the answer needed a prerelease that was not whitelisted.
    pub needed_unanticipated_prereleases: bool,
    /// Every optimum-equivalent answer (the primary one first), when
    /// requested via [`SolveOptions::all_answers`].
    pub all_answers: Option<Vec<IndexMap<String, String>>>,
}
