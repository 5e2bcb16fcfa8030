use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error raised when version text cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid version \"{text}\": {reason}")]
pub struct VersionError {
    pub text: String,
    pub reason: String,
}

impl VersionError {
    fn new(text: &str, reason: impl Into<String>) -> Self {
        Self {
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}

/// A single prerelease identifier, numeric or alphanumeric.
///
/// Numeric identifiers compare by value and rank below alphanumeric ones,
/// following semver precedence rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PreId {
    Numeric(u64),
    Alpha(String),
}

impl PreId {
    fn parse(s: &str) -> PreId {
        // Identifiers with leading zeros are treated as alphanumeric so that
        // they keep their textual form.
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) && (s == "0" || !s.starts_with('0'))
        {
            match s.parse::<u64>() {
                Ok(n) => PreId::Numeric(n),
                Err(_) => PreId::Alpha(s.to_string()),
            }
        } else {
            PreId::Alpha(s.to_string())
        }
    }
}

impl Ord for PreId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (PreId::Numeric(a), PreId::Numeric(b)) => a.cmp(b),
            (PreId::Numeric(_), PreId::Alpha(_)) => Ordering::Less,
            (PreId::Alpha(_), PreId::Numeric(_)) => Ordering::Greater,
            (PreId::Alpha(a), PreId::Alpha(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for PreId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreId::Numeric(n) => write!(f, "{}", n),
            PreId::Alpha(s) => write!(f, "{}", s),
        }
    }
}

/// A parsed semantic version.
///
/// Missing minor/patch components default to zero (`"1.2"` parses as
/// `1.2.0`), which keeps partial versions usable as comparator operands.
/// Build metadata is retained for display but ignored by ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pre: Vec<PreId>,
    build: Option<String>,
}

impl Version {
    /// Construct a release version with no prerelease or build metadata.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: Vec::new(),
            build: None,
        }
    }

    /// Parse version text, tolerating a leading `v` and missing
    /// minor/patch components.
    pub fn parse(text: &str) -> Result<Version, VersionError> {
        let trimmed = text.trim();
        let stripped = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if stripped.is_empty() {
            return Err(VersionError::new(text, "empty version"));
        }

        let (rest, build) = match stripped.split_once('+') {
            Some((head, build)) if !build.is_empty() => (head, Some(build.to_string())),
            Some(_) => return Err(VersionError::new(text, "empty build metadata")),
            None => (stripped, None),
        };

        let (core, pre_text) = match rest.split_once('-') {
            Some((head, pre)) if !pre.is_empty() => (head, Some(pre)),
            Some(_) => return Err(VersionError::new(text, "empty prerelease")),
            None => (rest, None),
        };

        let mut numbers = [0u64; 3];
        let mut count = 0usize;
        for part in core.split('.') {
            if count == 3 {
                return Err(VersionError::new(text, "more than three version components"));
            }
            numbers[count] = part
                .parse::<u64>()
                .map_err(|_| VersionError::new(text, format!("non-numeric component \"{}\"", part)))?;
            count += 1;
        }
        if count == 0 {
            return Err(VersionError::new(text, "missing major component"));
        }

        let pre = match pre_text {
            Some(p) => p.split('.').map(PreId::parse).collect(),
            None => Vec::new(),
        };

        Ok(Version {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            pre,
            build,
        })
    }

    /// Number of `major.minor.patch` components present in `text`.
    ///
    /// Used by comparator parsing to decide how wide a partial version
    /// should match; returns 3 for unparseable text.
    pub fn specified_components(text: &str) -> usize {
        let trimmed = text.trim();
        let stripped = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let core = stripped
            .split_once('-')
            .map(|(head, _)| head)
            .unwrap_or(stripped);
        let core = core.split_once('+').map(|(head, _)| head).unwrap_or(core);
        core.split('.').count().min(3)
    }

    /// Whether this version carries a prerelease tag.
    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// The same `major.minor.patch` triple with prerelease and build
    /// metadata stripped.
    pub fn release(&self) -> Version {
        Version::new(self.major, self.minor, self.patch)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.patch.cmp(&other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                // A release outranks any of its prereleases.
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre.is_empty() {
            let ids: Vec<String> = self.pre.iter().map(|p| p.to_string()).collect();
            write!(f, "-{}", ids.join("."))?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}
