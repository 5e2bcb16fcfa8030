use indexmap::{IndexMap, IndexSet};

use crate::atoms::PackageAndVersion;
use crate::catalog::Catalog;
use crate::constraints::{ConstraintMatcher, VersionConstraint};
use crate::error::{Result, SolverError};
use crate::input::Input;

/// A constraint gathered during analysis, before atoms are assigned.
///
/// `from` is the package-version whose dependency produced it; `None`
/// marks a top-level constraint.
#[derive(Debug, Clone)]
pub struct CollectedConstraint {
    pub from: Option<PackageAndVersion>,
    pub package: String,
    pub constraint: VersionConstraint,
}

/// The analyses feeding clause generation: root triage, the allowed-version
/// filter, reachability and constraint collection.
#[derive(Debug)]
pub struct Analysis {
    /// Known packages reachable from the roots via strong dependencies.
    pub reachable: IndexSet<String>,
    /// Unknown packages and the package-versions that require them.
    pub unknown: IndexMap<String, Vec<PackageAndVersion>>,
    /// Previous versions of roots that are not being upgraded.
    pub previous_root_versions: Vec<PackageAndVersion>,
    /// Every constraint, top-level entries first.
    pub constraints: Vec<CollectedConstraint>,
    /// Version lists pre-pruned by top-level constraints.
    allowed: IndexMap<String, Vec<String>>,
}

impl Analysis {
    /// Run every analysis pass. Fails on unknown root dependencies and on
    /// top-level constraints that rule out every version of a package.
    pub fn run(
        input: &Input,
        catalog: &dyn Catalog,
        matcher: &dyn ConstraintMatcher,
    ) -> Result<Analysis> {
        // Root triage: unknown roots end the solve before any clause
        // exists, one reason per root.
        let unknown_roots: Vec<String> = input
            .dependencies
            .iter()
            .filter(|root| !input.is_known_package(catalog, root))
            .map(|root| format!("unknown package in top-level dependencies: {}", root))
            .collect();
        if !unknown_roots.is_empty() {
            return Err(SolverError::unsolvable(unknown_roots));
        }

        let previous_root_versions = input
            .dependencies
            .iter()
            .filter(|root| input.is_in_previous_solution(root) && !input.is_upgrading(root))
            .map(|root| {
                PackageAndVersion::new(root.clone(), input.previous_solution[root.as_str()].clone())
            })
            .collect();

        let allowed = Self::filter_allowed_versions(input, catalog, matcher)?;

        let mut analysis = Analysis {
            reachable: IndexSet::new(),
            unknown: IndexMap::new(),
            previous_root_versions,
            constraints: Vec::new(),
            allowed,
        };

        for root in &input.dependencies {
            analysis.visit(root, input, catalog);
        }
        log::debug!(
            "reachability: {} packages, {} unknown",
            analysis.reachable.len(),
            analysis.unknown.len()
        );

        analysis.collect_constraints(input, catalog);
        log::debug!("collected {} constraints", analysis.constraints.len());

        Ok(analysis)
    }

    /// Intersect each constrained package's version list with every
    /// top-level constraint on it. Packages with no catalog versions stay
    /// unfiltered; they surface later through the unknown-package
    /// objective.
    fn filter_allowed_versions(
        input: &Input,
        catalog: &dyn Catalog,
        matcher: &dyn ConstraintMatcher,
    ) -> Result<IndexMap<String, Vec<String>>> {
        let mut allowed: IndexMap<String, Vec<String>> = IndexMap::new();
        for (package, _) in &input.constraints {
            if allowed.contains_key(package) {
                continue;
            }
            let catalog_versions = catalog.versions_of(package);
            if catalog_versions.is_empty() {
                continue;
            }
            let mut kept = catalog_versions.to_vec();
            for (constrained, constraint) in &input.constraints {
                if constrained == package {
                    kept.retain(|version| matcher.satisfies(constraint, version));
                }
            }
            if kept.is_empty() {
                let listed: Vec<String> = input
                    .constraints
                    .iter()
                    .filter(|(constrained, _)| constrained == package)
                    .map(|(_, constraint)| format!("{}@{}", package, constraint.raw()))
                    .collect();
                return Err(SolverError::unsolvable(vec![format!(
                    "No version of {} satisfies top-level constraints: {}",
                    package,
                    listed.join(", ")
                )]));
            }
            allowed.insert(package.clone(), kept);
        }
        Ok(allowed)
    }

    /// Depth-first reachability over strong dependencies, visiting every
    /// version of every package. Weak dependencies do not propagate;
    /// unknown targets are recorded with their requirers instead.
    fn visit(&mut self, package: &str, input: &Input, catalog: &dyn Catalog) {
        if !self.reachable.insert(package.to_string()) {
            return;
        }
        let versions = self.versions_of(catalog, package).to_vec();
        for version in versions {
            for dep in catalog.dependencies_of(package, &version) {
                if !input.is_known_package(catalog, &dep.package) {
                    self.unknown
                        .entry(dep.package.clone())
                        .or_default()
                        .push(PackageAndVersion::new(package, version.clone()));
                } else if !dep.weak {
                    let target = dep.package.clone();
                    self.visit(&target, input, catalog);
                }
            }
        }
    }

    /// One constraint per top-level entry, then one per dependency (weak
    /// included) of every version of every reachable package, skipping
    /// unknown targets.
    fn collect_constraints(&mut self, input: &Input, catalog: &dyn Catalog) {
        for (package, constraint) in &input.constraints {
            self.constraints.push(CollectedConstraint {
                from: None,
                package: package.clone(),
                constraint: constraint.clone(),
            });
        }
        let reachable: Vec<String> = self.reachable.iter().cloned().collect();
        for package in reachable {
            let versions = self.versions_of(catalog, &package).to_vec();
            for version in versions {
                for dep in catalog.dependencies_of(&package, &version) {
                    if !input.is_known_package(catalog, &dep.package) {
                        continue;
                    }
                    self.constraints.push(CollectedConstraint {
                        from: Some(PackageAndVersion::new(package.clone(), version.clone())),
                        package: dep.package.clone(),
                        constraint: dep.constraint.clone(),
                    });
                }
            }
        }
    }

    /// The candidate versions of a package: the filtered list when a
    /// top-level constraint pruned it, the catalog list otherwise.
    pub fn versions_of<'a>(&'a self, catalog: &'a dyn Catalog, package: &str) -> &'a [String] {
        match self.allowed.get(package) {
            Some(versions) => versions,
            None => catalog.versions_of(package),
        }
    }
}
