use std::collections::HashMap;

use indexmap::IndexMap;

use crate::constraints::VersionConstraint;

/// A declared dependency of one package version on another package.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub package: String,
    pub constraint: VersionConstraint,
    /// Weak dependencies constrain the target's version but do not require
    /// the target to be selected at all.
    pub weak: bool,
}

impl Dependency {
    /// A strong dependency: the target must be selected and satisfy the
    /// constraint.
    pub fn strong(package: impl Into<String>, constraint: impl Into<VersionConstraint>) -> Self {
        Self {
            package: package.into(),
            constraint: constraint.into(),
            weak: false,
        }
    }

    /// A weak dependency: the constraint applies only if the target ends
    /// up selected for other reasons.
    pub fn weak(package: impl Into<String>, constraint: impl Into<VersionConstraint>) -> Self {
        Self {
            package: package.into(),
            constraint: constraint.into(),
            weak: true,
        }
    }
}

/// The package universe the solver draws from.
///
/// `versions_of` returns an empty slice for unknown packages; the order of
/// versions is arbitrary but must be stable for the duration of a solve.
pub trait Catalog {
    fn versions_of(&self, package: &str) -> &[String];
    fn dependencies_of(&self, package: &str, version: &str) -> &[Dependency];
}

const NO_VERSIONS: &[String] = &[];
const NO_DEPENDENCIES: &[Dependency] = &[];

/// An in-memory [`Catalog`] with a builder-style population API.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    versions: IndexMap<String, Vec<String>>,
    dependencies: HashMap<(String, String), Vec<Dependency>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package version and its dependency list. Versions keep
    /// their insertion order.
    pub fn add_package(
        &mut self,
        package: impl Into<String>,
        version: impl Into<String>,
        dependencies: Vec<Dependency>,
    ) -> &mut Self {
        let package = package.into();
        let version = version.into();
        self.versions
            .entry(package.clone())
            .or_default()
            .push(version.clone());
        self.dependencies.insert((package, version), dependencies);
        self
    }

    /// Number of distinct package names.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

impl Catalog for MemoryCatalog {
    fn versions_of(&self, package: &str) -> &[String] {
        self.versions
            .get(package)
            .map(Vec::as_slice)
            .unwrap_or(NO_VERSIONS)
    }

    fn dependencies_of(&self, package: &str, version: &str) -> &[Dependency] {
        self.dependencies
            .get(&(package.to_string(), version.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(NO_DEPENDENCIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_keep_insertion_order() {
        let mut catalog = MemoryCatalog::new();
        catalog
            .add_package("a", "2.0.0", vec![])
            .add_package("a", "1.0.0", vec![]);

        assert_eq!(catalog.versions_of("a"), ["2.0.0", "1.0.0"]);
    }

    #[test]
    fn test_unknown_package_is_empty() {
        let catalog = MemoryCatalog::new();
        assert!(catalog.versions_of("missing").is_empty());
        assert!(catalog.dependencies_of("missing", "1.0.0").is_empty());
    }

    #[test]
    fn test_dependencies_by_version() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_package("a", "1.0.0", vec![Dependency::strong("b", "^1.0")]);
        catalog.add_package("a", "2.0.0", vec![]);

        assert_eq!(catalog.dependencies_of("a", "1.0.0").len(), 1);
        assert!(catalog.dependencies_of("a", "2.0.0").is_empty());

        let dep = &catalog.dependencies_of("a", "1.0.0")[0];
        assert_eq!(dep.package, "b");
        assert_eq!(dep.constraint.raw(), "^1.0");
        assert!(!dep.weak);
    }
}
