use std::collections::HashMap;

use lockstep_semver::Version;

/// How candidate versions should be costed when there is no previous
/// version to stay close to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingMode {
    /// Prefer the newest version on every axis.
    Update,
    /// Prefer the oldest major/minor but the newest patch. Used for
    /// freshly-introduced indirect dependencies, where pulling in the
    /// lowest workable line minimizes churn.
    GravityWithPatches,
}

/// Per-version costs on the four version axes. All vectors have the same
/// length as the priced version list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCosts {
    pub major: Vec<u64>,
    pub minor: Vec<u64>,
    pub patch: Vec<u64>,
    pub rest: Vec<u64>,
}

/// Per-version costs relative to a previous selection, with an extra
/// incompatibility axis (a major change counts as incompatible).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviousCosts {
    pub incompat: Vec<u64>,
    pub major: Vec<u64>,
    pub minor: Vec<u64>,
    pub patch: Vec<u64>,
    pub rest: Vec<u64>,
}

/// Versions split relative to a previous selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionPartition {
    pub older: Vec<String>,
    pub compatible: Vec<String>,
    pub higher_major: Vec<String>,
}

/// Computes integer cost vectors over candidate version lists.
pub trait VersionPricer {
    fn price_versions(&self, versions: &[String], mode: PricingMode) -> VersionCosts;
    fn price_versions_with_previous(&self, versions: &[String], previous: &str) -> PreviousCosts;
    fn partition_versions(&self, versions: &[String], previous: &str) -> VersionPartition;
}

/// A [`VersionPricer`] backed by `lockstep-semver` precedence.
///
/// Versions that do not parse price as zero on every axis and partition as
/// compatible; interpreting version text is strictly this component's
/// business, never the solver's.
#[derive(Debug, Default)]
pub struct SemverPricer;

impl SemverPricer {
    pub fn new() -> Self {
        Self
    }
}

/// Range statistics over the parseable versions of a list.
struct AxisStats {
    min_major: u64,
    max_major: u64,
    /// (min, max) minor per major.
    minor: HashMap<u64, (u64, u64)>,
    /// max patch per (major, minor).
    patch: HashMap<(u64, u64), u64>,
}

impl AxisStats {
    fn collect<'a>(parsed: impl Iterator<Item = &'a Version>) -> AxisStats {
        let mut stats = AxisStats {
            min_major: u64::MAX,
            max_major: 0,
            minor: HashMap::new(),
            patch: HashMap::new(),
        };
        for version in parsed {
            stats.min_major = stats.min_major.min(version.major);
            stats.max_major = stats.max_major.max(version.major);
            let minor = stats
                .minor
                .entry(version.major)
                .or_insert((version.minor, version.minor));
            minor.0 = minor.0.min(version.minor);
            minor.1 = minor.1.max(version.minor);
            let patch = stats
                .patch
                .entry((version.major, version.minor))
                .or_insert(version.patch);
            *patch = (*patch).max(version.patch);
        }
        stats
    }
}

fn same_release(a: &Version, b: &Version) -> bool {
    a.major == b.major && a.minor == b.minor && a.patch == b.patch
}

impl VersionPricer for SemverPricer {
    fn price_versions(&self, versions: &[String], mode: PricingMode) -> VersionCosts {
        let parsed: Vec<Option<Version>> = versions.iter().map(|v| Version::parse(v).ok()).collect();
        let stats = AxisStats::collect(parsed.iter().flatten());

        let mut costs = VersionCosts {
            major: vec![0; versions.len()],
            minor: vec![0; versions.len()],
            patch: vec![0; versions.len()],
            rest: vec![0; versions.len()],
        };

        for (i, version) in parsed.iter().enumerate() {
            let Some(version) = version else { continue };
            let (min_minor, max_minor) = stats.minor[&version.major];
            let max_patch = stats.patch[&(version.major, version.minor)];
            match mode {
                PricingMode::Update => {
                    costs.major[i] = stats.max_major - version.major;
                    costs.minor[i] = max_minor - version.minor;
                }
                PricingMode::GravityWithPatches => {
                    costs.major[i] = version.major - stats.min_major;
                    costs.minor[i] = version.minor - min_minor;
                }
            }
            costs.patch[i] = max_patch - version.patch;
            // Within a release triple, count how many listed versions
            // outrank this one (newer prereleases first).
            costs.rest[i] = parsed
                .iter()
                .flatten()
                .filter(|other| same_release(other, version) && *other > version)
                .count() as u64;
        }
        costs
    }

    fn price_versions_with_previous(&self, versions: &[String], previous: &str) -> PreviousCosts {
        let mut costs = PreviousCosts {
            incompat: vec![0; versions.len()],
            major: vec![0; versions.len()],
            minor: vec![0; versions.len()],
            patch: vec![0; versions.len()],
            rest: vec![0; versions.len()],
        };
        let Ok(prev) = Version::parse(previous) else {
            return costs;
        };
        let parsed: Vec<Option<Version>> = versions.iter().map(|v| Version::parse(v).ok()).collect();

        // Precedence ranking within the previous version's release triple,
        // used as the distance on the prerelease axis.
        let mut group: Vec<Version> = parsed
            .iter()
            .flatten()
            .filter(|version| same_release(version, &prev))
            .cloned()
            .collect();
        group.push(prev.clone());
        group.sort();
        group.dedup();
        let prev_rank = group.iter().position(|v| *v == prev).unwrap_or(0);

        for (i, version) in parsed.iter().enumerate() {
            let Some(version) = version else { continue };
            costs.incompat[i] = u64::from(version.major != prev.major);
            costs.major[i] = version.major.abs_diff(prev.major);
            costs.minor[i] = if version.major == prev.major {
                version.minor.abs_diff(prev.minor)
            } else {
                version.minor
            };
            costs.patch[i] = if version.major == prev.major && version.minor == prev.minor {
                version.patch.abs_diff(prev.patch)
            } else {
                version.patch
            };
            costs.rest[i] = if same_release(version, &prev) {
                let rank = group
                    .iter()
                    .position(|v| v == version)
                    .unwrap_or(prev_rank);
                rank.abs_diff(prev_rank) as u64
            } else {
                0
            };
        }
        costs
    }

    fn partition_versions(&self, versions: &[String], previous: &str) -> VersionPartition {
        let mut partition = VersionPartition::default();
        let Ok(prev) = Version::parse(previous) else {
            partition.compatible = versions.to_vec();
            return partition;
        };
        for text in versions {
            match Version::parse(text) {
                Ok(version) if version < prev => partition.older.push(text.clone()),
                Ok(version) if version.major == prev.major => {
                    partition.compatible.push(text.clone());
                }
                Ok(_) => partition.higher_major.push(text.clone()),
                Err(_) => partition.compatible.push(text.clone()),
            }
        }
        partition
    }
}
