use std::fmt;

use thiserror::Error;

use crate::version::{Version, VersionError};

/// Comparison operators accepted in constraint expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Exact match (`=` or a bare version)
    Equal,
    /// Not equal (`!=`)
    NotEqual,
    /// Strictly lower precedence (`<`)
    LessThan,
    /// Lower or equal precedence (`<=`)
    LessThanOrEqual,
    /// Strictly higher precedence (`>`)
    GreaterThan,
    /// Higher or equal precedence (`>=`)
    GreaterThanOrEqual,
    /// Same major.minor, at least the given patch (`~`)
    Tilde,
    /// Compatible with, semver caret semantics (`^`)
    Caret,
}

impl Operator {
    fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::Tilde => "~",
            Operator::Caret => "^",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised when constraint text cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    #[error("empty constraint")]
    Empty,

    #[error(transparent)]
    Version(#[from] VersionError),
}

/// A single operator applied to a version operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub operator: Operator,
    pub version: Version,
    /// How many of major/minor/patch were written out in the operand.
    /// `=1.2` matches every `1.2.x`, while `=1.2.0` matches only `1.2.0`.
    components: usize,
}

impl Comparator {
    fn parse(token: &str) -> Result<Comparator, ConstraintError> {
        let (operator, rest) = if let Some(rest) = token.strip_prefix(">=") {
            (Operator::GreaterThanOrEqual, rest)
        } else if let Some(rest) = token.strip_prefix("<=") {
            (Operator::LessThanOrEqual, rest)
        } else if let Some(rest) = token.strip_prefix("!=") {
            (Operator::NotEqual, rest)
        } else if let Some(rest) = token.strip_prefix("==") {
            (Operator::Equal, rest)
        } else if let Some(rest) = token.strip_prefix('>') {
            (Operator::GreaterThan, rest)
        } else if let Some(rest) = token.strip_prefix('<') {
            (Operator::LessThan, rest)
        } else if let Some(rest) = token.strip_prefix('=') {
            (Operator::Equal, rest)
        } else if let Some(rest) = token.strip_prefix('~') {
            (Operator::Tilde, rest)
        } else if let Some(rest) = token.strip_prefix('^') {
            (Operator::Caret, rest)
        } else {
            (Operator::Equal, token)
        };

        let operand = rest.trim();
        if operand.is_empty() {
            return Err(ConstraintError::Empty);
        }

        Ok(Comparator {
            operator,
            version: Version::parse(operand)?,
            components: Version::specified_components(operand),
        })
    }

    /// Whether `candidate` satisfies this comparator.
    pub fn matches(&self, candidate: &Version) -> bool {
        match self.operator {
            Operator::Equal => self.matches_exact(candidate),
            Operator::NotEqual => !self.matches_exact(candidate),
            Operator::LessThan => candidate < &self.version,
            Operator::LessThanOrEqual => candidate <= &self.version,
            Operator::GreaterThan => candidate > &self.version,
            Operator::GreaterThanOrEqual => candidate >= &self.version,
            Operator::Tilde => candidate >= &self.version && candidate.release() < self.tilde_upper(),
            Operator::Caret => candidate >= &self.version && candidate.release() < self.caret_upper(),
        }
    }

    fn matches_exact(&self, candidate: &Version) -> bool {
        match self.components {
            1 => candidate.major == self.version.major,
            2 => candidate.major == self.version.major && candidate.minor == self.version.minor,
            _ => candidate == &self.version,
        }
    }

    fn tilde_upper(&self) -> Version {
        if self.components >= 2 {
            Version::new(self.version.major, self.version.minor + 1, 0)
        } else {
            Version::new(self.version.major + 1, 0, 0)
        }
    }

    fn caret_upper(&self) -> Version {
        if self.version.major > 0 {
            Version::new(self.version.major + 1, 0, 0)
        } else if self.version.minor > 0 || self.components < 3 {
            Version::new(0, self.version.minor + 1, 0)
        } else {
            Version::new(0, 0, self.version.patch + 1)
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator, self.version)
    }
}

/// A parsed constraint expression.
///
/// The grammar follows the usual range syntax: whitespace between
/// comparators means AND, `||` between groups means OR, and `*` (or an
/// empty expression) matches everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    raw: String,
    groups: Vec<Vec<Comparator>>,
}

impl Constraint {
    /// Parse constraint text.
    pub fn parse(text: &str) -> Result<Constraint, ConstraintError> {
        let mut groups = Vec::new();
        for group_text in text.split("||") {
            let mut comparators = Vec::new();
            for token in group_text.split_whitespace() {
                if token == "*" {
                    continue;
                }
                comparators.push(Comparator::parse(token)?);
            }
            // An empty group (bare `*` or blank text) matches everything.
            groups.push(comparators);
        }
        Ok(Constraint {
            raw: text.to_string(),
            groups,
        })
    }

    /// The original constraint text.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether the parsed `candidate` satisfies this constraint.
    pub fn matches(&self, candidate: &Version) -> bool {
        self.groups
            .iter()
            .any(|group| group.iter().all(|comparator| comparator.matches(candidate)))
    }

    /// Whether `version` text satisfies this constraint.
    ///
    /// Unparseable version text never satisfies anything.
    pub fn satisfies(&self, version: &str) -> bool {
        match Version::parse(version) {
            Ok(candidate) => self.matches(&candidate),
            Err(_) => false,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(text: &str) -> Constraint {
        Constraint::parse(text).unwrap()
    }

    #[test]
    fn test_exact() {
        assert!(c("=1.2.3").satisfies("1.2.3"));
        assert!(!c("=1.2.3").satisfies("1.2.4"));
        assert!(!c("=1.2.3").satisfies("1.2.3-beta"));
        assert!(c("1.2.3").satisfies("1.2.3"));
        assert!(c("==2.0.0").satisfies("2.0.0"));
    }

    #[test]
    fn test_exact_partial() {
        assert!(c("=1.2").satisfies("1.2.0"));
        assert!(c("=1.2").satisfies("1.2.9"));
        assert!(!c("=1.2").satisfies("1.3.0"));
        assert!(c("=1").satisfies("1.9.9"));
    }

    #[test]
    fn test_relational() {
        assert!(c(">=2.0.0").satisfies("2.0.0"));
        assert!(c(">=2.0.0").satisfies("3.1.0"));
        assert!(!c(">=2.0.0").satisfies("1.9.9"));
        assert!(c("<2.0.0").satisfies("1.9.9"));
        assert!(!c("<2.0.0").satisfies("2.0.0"));
        assert!(c(">1.0.0").satisfies("1.0.1"));
        assert!(!c(">1.0.0").satisfies("1.0.0"));
        assert!(c("<=1.0.0").satisfies("1.0.0"));
        assert!(c("!=1.0.0").satisfies("1.0.1"));
        assert!(!c("!=1.0.0").satisfies("1.0.0"));
    }

    #[test]
    fn test_tilde() {
        assert!(c("~1.2.3").satisfies("1.2.3"));
        assert!(c("~1.2.3").satisfies("1.2.9"));
        assert!(!c("~1.2.3").satisfies("1.3.0"));
        assert!(!c("~1.2.3").satisfies("1.2.2"));
        assert!(c("~1").satisfies("1.9.0"));
        assert!(!c("~1").satisfies("2.0.0"));
    }

    #[test]
    fn test_caret() {
        assert!(c("^1.2.3").satisfies("1.2.3"));
        assert!(c("^1.2.3").satisfies("1.9.0"));
        assert!(!c("^1.2.3").satisfies("2.0.0"));
        assert!(!c("^1.2.3").satisfies("1.2.2"));
        assert!(c("^0.2.1").satisfies("0.2.5"));
        assert!(!c("^0.2.1").satisfies("0.3.0"));
        assert!(c("^0.0.3").satisfies("0.0.3"));
        assert!(!c("^0.0.3").satisfies("0.0.4"));
    }

    #[test]
    fn test_conjunction() {
        let range = c(">=1.0.0 <2.0.0");
        assert!(range.satisfies("1.5.0"));
        assert!(!range.satisfies("2.0.0"));
        assert!(!range.satisfies("0.9.0"));
    }

    #[test]
    fn test_disjunction() {
        let either = c("=1.0.0 || >=2.0.0");
        assert!(either.satisfies("1.0.0"));
        assert!(either.satisfies("2.5.0"));
        assert!(!either.satisfies("1.5.0"));
    }

    #[test]
    fn test_wildcard() {
        assert!(c("*").satisfies("0.0.1"));
        assert!(c("*").satisfies("99.0.0-beta"));
        assert!(c("").satisfies("1.0.0"));
    }

    #[test]
    fn test_prerelease_by_precedence() {
        // Matching is plain precedence comparison; prerelease penalties are
        // the solver's concern, not the matcher's.
        assert!(c("<1.0.0").satisfies("1.0.0-beta"));
        assert!(c(">=1.0.0-alpha").satisfies("1.0.0-beta"));
        assert!(!c(">=1.0.0").satisfies("1.0.0-beta"));
    }

    #[test]
    fn test_unparseable_version_never_matches() {
        assert!(!c("*").satisfies("not-a-version"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Constraint::parse(">=").is_err());
        assert!(Constraint::parse("frobnicate!").is_err());
    }

    #[test]
    fn test_raw_round_trip() {
        let text = ">=1.0.0 <2.0.0 || =3.0.0";
        assert_eq!(c(text).raw(), text);
        assert_eq!(c(text).to_string(), text);
    }
}
