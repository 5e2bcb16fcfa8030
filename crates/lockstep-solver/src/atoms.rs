use std::collections::HashMap;
use std::fmt;

use crate::sat::Var;

/// A package name paired with one of its versions.
///
/// The canonical text form is `"<package> <version>"` with exactly one
/// space; neither component may contain spaces, so the form splits back
/// unambiguously.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageAndVersion {
    pub package: String,
    pub version: String,
}

impl PackageAndVersion {
    pub fn new(package: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
        }
    }

    /// Parse the canonical `"<package> <version>"` form.
    pub fn parse(text: &str) -> Option<PackageAndVersion> {
        let (package, version) = text.split_once(' ')?;
        if package.is_empty() || version.is_empty() || version.contains(' ') {
            return None;
        }
        Some(PackageAndVersion::new(package, version))
    }
}

impl fmt::Display for PackageAndVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.package, self.version)
    }
}

/// Two-way table interning atom names to solver variables.
///
/// Three atom shapes exist: a bare package name ("some version of P is
/// selected"), the `"<package> <version>"` form ("exactly this version is
/// selected"), and `conflict#<i>` markers ("constraint i is waived").
/// Variables are 1-based to match the backend's literal encoding.
#[derive(Debug, Default)]
pub struct AtomTable {
    names: Vec<String>,
    by_name: HashMap<String, Var>,
}

impl AtomTable {
    pub fn new() -> Self {
        Self {
            // Slot 0 is unused so that names index directly by variable.
            names: vec![String::new()],
            by_name: HashMap::new(),
        }
    }

    /// Intern `name`, allocating a variable through `alloc` on first use.
    pub fn intern<F: FnMut() -> Var>(&mut self, name: &str, mut alloc: F) -> Var {
        if let Some(&var) = self.by_name.get(name) {
            return var;
        }
        let var = alloc();
        debug_assert_eq!(var as usize, self.names.len(), "atom table out of sync");
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), var);
        var
    }

    /// The variable for `name`, if interned.
    pub fn lookup(&self, name: &str) -> Option<Var> {
        self.by_name.get(name).copied()
    }

    /// The name of a variable.
    pub fn name(&self, var: Var) -> &str {
        &self.names[var as usize]
    }

    pub fn len(&self) -> usize {
        self.names.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The atom name for "version `version` of `package` is selected".
pub fn package_version_atom(package: &str, version: &str) -> String {
    format!("{} {}", package, version)
}

/// The atom name waiving constraint number `index`.
pub fn conflict_atom(index: usize) -> String {
    format!("conflict#{}", index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_and_version_round_trip() {
        let pv = PackageAndVersion::new("foo", "1.2.0");
        assert_eq!(pv.to_string(), "foo 1.2.0");
        assert_eq!(PackageAndVersion::parse("foo 1.2.0"), Some(pv));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(PackageAndVersion::parse("foo"), None);
        assert_eq!(PackageAndVersion::parse("foo "), None);
        assert_eq!(PackageAndVersion::parse("foo 1.0 extra"), None);
    }

    #[test]
    fn test_intern_is_idempotent() {
        let mut next = 0u32;
        let mut table = AtomTable::new();
        let mut alloc = || {
            next += 1;
            next
        };
        let a = table.intern("foo", &mut alloc);
        let b = table.intern("foo 1.0.0", &mut alloc);
        let again = table.intern("foo", &mut alloc);

        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(table.name(a), "foo");
        assert_eq!(table.name(b), "foo 1.0.0");
        assert_eq!(table.lookup("foo 1.0.0"), Some(b));
        assert_eq!(table.lookup("bar"), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_atom_names() {
        assert_eq!(package_version_atom("foo", "1.0.0"), "foo 1.0.0");
        assert_eq!(conflict_atom(3), "conflict#3");
    }
}
