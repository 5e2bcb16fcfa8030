use indexmap::{IndexMap, IndexSet};

use crate::atoms::PackageAndVersion;
use crate::catalog::Catalog;
use crate::constraints::Constraint;
use crate::error::{Result, SolverError};
use crate::input::Input;

/// Builds human-readable explanations for unsatisfied constraints by
/// walking reverse dependency paths over the selected assignment.
pub(crate) struct Explainer<'a> {
    pub version_map: &'a IndexMap<String, String>,
    pub constraints: &'a [Constraint],
    pub catalog: &'a dyn Catalog,
    pub input: &'a Input,
}

impl Explainer<'_> {
    /// The message for one waived constraint: which selected version broke
    /// it, and where every constraint on that package comes from.
    pub fn conflict_message(&self, constraint: &Constraint) -> Result<String> {
        let selected = self.version_map.get(&constraint.package).ok_or_else(|| {
            SolverError::internal(format!(
                "conflicting constraint on {} but no version selected",
                constraint.package
            ))
        })?;
        let mut lines = vec![format!(
            "conflict: constraint {}@{} is not satisfied by {} {}.",
            constraint.package,
            constraint.constraint.raw(),
            constraint.package,
            selected
        )];
        lines.extend(self.list_constraints_on_package(&constraint.package));
        Ok(lines.join("\n"))
    }

    /// One line per constraint on `package`, each annotated with a reverse
    /// path from its source to a selected root (or `top level`).
    pub fn list_constraints_on_package(&self, package: &str) -> Vec<String> {
        let mut lines = vec![format!("Constraints on package \"{}\":", package)];
        for constraint in self.constraints.iter().filter(|c| c.package == package) {
            let label = format!("{}@{}", constraint.package, constraint.constraint.raw());
            match &constraint.from {
                None => lines.push(format!("* {} <- top level", label)),
                Some(from) => {
                    let mut ignore = IndexSet::new();
                    for path in self.paths_to(from, &mut ignore) {
                        let chain: Vec<String> = path.iter().map(|pv| pv.to_string()).collect();
                        lines.push(format!("* {} <- {}", label, chain.join(" <- ")));
                    }
                }
            }
        }
        lines
    }

    /// Reverse paths from `pv` back to a selected root, over the selected
    /// assignment only. Paths longer than the shortest found so far are
    /// dropped as they appear; this bounds the search on dense graphs and
    /// keeps explanations short. Deliberately not exhaustive.
    fn paths_to(
        &self,
        pv: &PackageAndVersion,
        ignore: &mut IndexSet<String>,
    ) -> Vec<Vec<PackageAndVersion>> {
        if self.version_map.get(&pv.package) != Some(&pv.version) {
            return Vec::new();
        }
        if self.input.is_root_dependency(&pv.package) {
            return vec![vec![pv.clone()]];
        }

        ignore.insert(pv.package.clone());
        let mut paths: Vec<Vec<PackageAndVersion>> = Vec::new();
        let mut shortest = usize::MAX;
        for (requirer, version) in self.version_map {
            if ignore.contains(requirer) || !self.has_dep(requirer, version, &pv.package) {
                continue;
            }
            let requirer_pv = PackageAndVersion::new(requirer.clone(), version.clone());
            for tail in self.paths_to(&requirer_pv, ignore) {
                let mut path = Vec::with_capacity(tail.len() + 1);
                path.push(pv.clone());
                path.extend(tail);
                if paths.is_empty() || path.len() <= shortest {
                    shortest = shortest.min(path.len());
                    paths.push(path);
                }
            }
        }
        ignore.swap_remove(&pv.package);
        paths
    }

    /// Whether the selected version of `package` lists `target` among its
    /// dependencies, weak ones included.
    fn has_dep(&self, package: &str, version: &str, target: &str) -> bool {
        self.catalog
            .dependencies_of(package, version)
            .iter()
            .any(|dep| dep.package == target)
    }
}
