//! Host compatibility ranges and "best compatible version" selection.
//!
//! Ranges are written in npm syntax (`>=5.9.0 <7.0.0`, `^1.2.0 || 2.x`,
//! `1.0.0 - 2.0.0`) and translated into `semver::VersionReq` alternatives.

use std::cmp::Ordering;

use semver::{Version, VersionReq};

use crate::types::PackageInfo;

/// Host version that is always considered alongside the running host when
/// checking a range. A release whose range admits this floor is accepted
/// even if the running host itself falls outside the range.
pub const FLOOR_HOST_VERSION: &str = "4.7.0";

/// A parsed npm-style range: satisfied when any `||` alternative matches.
#[derive(Debug, Clone, PartialEq)]
pub struct HostRange {
    alternatives: Vec<VersionReq>,
}

impl HostRange {
    /// Parse an npm-style range. Returns `None` for syntactically invalid input.
    pub fn parse(range: &str) -> Option<Self> {
        let mut alternatives = Vec::new();
        for alt in range.split("||") {
            alternatives.push(parse_alternative(alt.trim())?);
        }
        Some(Self { alternatives })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// Lowest of `candidates` inside the range, if any.
    pub fn min_satisfying<'a>(&self, candidates: &'a [Version]) -> Option<&'a Version> {
        candidates
            .iter()
            .filter(|v| self.matches(v))
            .min_by(|a, b| precedence(a, b))
    }
}

fn parse_alternative(alt: &str) -> Option<VersionReq> {
    if alt.is_empty() {
        return Some(VersionReq::STAR);
    }
    if let Some((low, high)) = alt.split_once(" - ") {
        let low = strip_v(low.trim());
        let high = strip_v(high.trim());
        return VersionReq::parse(&format!(">={}, <={}", low, high)).ok();
    }

    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in alt.split_whitespace() {
        // ">= 1.2.3" is legal npm syntax: glue a bare operator to the next token.
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '^' | '~')) {
            pending_op = Some(token);
            continue;
        }
        let token = match pending_op.take() {
            Some(op) => format!("{}{}", op, token),
            None => token.to_string(),
        };
        if let Some(c) = comparator(&token) {
            comparators.push(c);
        }
    }
    if pending_op.is_some() {
        return None;
    }
    if comparators.is_empty() {
        return Some(VersionReq::STAR);
    }
    VersionReq::parse(&comparators.join(", ")).ok()
}

/// Translate one npm comparator into `semver` syntax. `None` means "matches anything".
fn comparator(token: &str) -> Option<String> {
    let split = token
        .find(|c: char| !matches!(c, '<' | '>' | '=' | '^' | '~'))
        .unwrap_or(token.len());
    let (op, version) = token.split_at(split);
    let version = strip_v(version);
    if matches!(version, "*" | "x" | "X" | "") {
        return None;
    }
    let op = match op {
        // A bare npm version is an exact match; in `semver` it would mean `^`.
        "" if is_wildcard(version) => "",
        "" => "=",
        other => other,
    };
    Some(format!("{}{}", op, version))
}

fn is_wildcard(version: &str) -> bool {
    version
        .split('.')
        .any(|part| matches!(part, "*" | "x" | "X"))
}

fn strip_v(version: &str) -> &str {
    version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('='))
        .unwrap_or(version)
}

/// Parse a concrete version, tolerating a leading `v` or `=`.
pub fn parse_version(version: &str) -> Option<Version> {
    Version::parse(strip_v(version.trim())).ok()
}

/// Semver precedence: build metadata does not take part in ordering.
pub fn precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch)
        .cmp(&(b.major, b.minor, b.patch))
        .then_with(|| a.pre.cmp(&b.pre))
}

/// True if `a` has strictly higher precedence than `b`. Invalid input compares as not greater.
pub fn version_gt(a: &str, b: &str) -> bool {
    match (parse_version(a), parse_version(b)) {
        (Some(a), Some(b)) => precedence(&a, &b) == Ordering::Greater,
        _ => false,
    }
}

/// Lenient compatibility check.
///
/// A range is satisfied when some member of `{host_version, FLOOR_HOST_VERSION}`
/// lies inside it. An unparseable host version simply drops out of the pair.
pub fn is_compatible(range: &HostRange, host_version: &str) -> bool {
    let mut candidates = Vec::with_capacity(2);
    if let Some(host) = parse_version(host_version) {
        candidates.push(host);
    }
    if let Ok(floor) = Version::parse(FLOOR_HOST_VERSION) {
        candidates.push(floor);
    }
    range.min_satisfying(&candidates).is_some()
}

/// Check a declared range string: invalid ranges are never compatible.
pub fn range_accepts(range: &str, host_version: &str) -> bool {
    HostRange::parse(range)
        .map(|r| is_compatible(&r, host_version))
        .unwrap_or(false)
}

/// Pick the greatest release of `info` compatible with `host_version`.
///
/// With no known host version the registry's `latest` release is returned as is.
/// Keys that are not valid versions, `null` entries and releases with an invalid
/// host range are skipped. On equal precedence the first key seen wins.
pub fn latest_compatible_version(info: &PackageInfo, host_version: &str) -> Option<String> {
    if host_version.is_empty() {
        return info.latest().map(String::from);
    }

    let mut best: Option<(Version, &str)> = None;
    for (key, entry) in &info.versions {
        let Some(version) = parse_version(key) else {
            continue;
        };
        let Some(release) = entry else {
            continue;
        };
        let Some(range) = HostRange::parse(release.metadata.host_range()) else {
            continue;
        };
        if !is_compatible(&range, host_version) {
            continue;
        }
        match &best {
            Some((current, _)) if precedence(&version, current) != Ordering::Greater => {}
            _ => best = Some((version, key.as_str())),
        }
    }
    best.map(|(_, key)| key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Engines, PackageVersionInfo, Releases};

    fn release(version: &str, range: Option<&str>) -> PackageVersionInfo {
        let mut info = PackageVersionInfo::default();
        info.metadata.name = "math".to_string();
        info.metadata.version = version.to_string();
        info.metadata.engines = range.map(|r| Engines {
            host: Some(r.to_string()),
        });
        info
    }

    fn package(versions: &[(&str, Option<&str>)]) -> PackageInfo {
        let mut info = PackageInfo {
            name: "math".to_string(),
            releases: Releases {
                latest: Some("1.6.1".to_string()),
            },
            ..Default::default()
        };
        for (v, range) in versions {
            info.versions.insert(v.to_string(), Some(release(v, *range)));
        }
        info
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn parses_npm_ranges() {
        let r = HostRange::parse(">=5.9.0 <7.0.0").unwrap();
        assert!(r.matches(&v("5.9.0")));
        assert!(r.matches(&v("6.99.1")));
        assert!(!r.matches(&v("7.0.0")));
        assert!(!r.matches(&v("5.8.9")));

        let exact = HostRange::parse("1.2.3").unwrap();
        assert!(exact.matches(&v("1.2.3")));
        assert!(!exact.matches(&v("1.2.4")));

        let alt = HostRange::parse("^1.0.0 || 3.x").unwrap();
        assert!(alt.matches(&v("1.4.0")));
        assert!(alt.matches(&v("3.2.0")));
        assert!(!alt.matches(&v("2.0.0")));

        let hyphen = HostRange::parse("1.0.0 - 2.0.0").unwrap();
        assert!(hyphen.matches(&v("2.0.0")));
        assert!(!hyphen.matches(&v("2.0.1")));

        let spaced = HostRange::parse(">= 5.0.0").unwrap();
        assert!(spaced.matches(&v("5.1.0")));

        assert!(HostRange::parse("*").unwrap().matches(&v("0.0.1")));
        assert!(HostRange::parse("").unwrap().matches(&v("9.9.9")));
    }

    #[test]
    fn rejects_invalid_ranges() {
        assert!(HostRange::parse("not a range").is_none());
        assert!(HostRange::parse(">=").is_none());
        assert!(HostRange::parse(">=1.0.0 <").is_none());
    }

    #[test]
    fn no_host_version_returns_latest() {
        let info = package(&[("1.0.0", None)]);
        assert_eq!(latest_compatible_version(&info, "").as_deref(), Some("1.6.1"));
    }

    #[test]
    fn no_valid_versions_returns_none() {
        let mut info = package(&[]);
        info.versions.insert("garbage".to_string(), Some(release("garbage", None)));
        info.versions.insert("1.0.0".to_string(), None);
        assert_eq!(latest_compatible_version(&info, "5.9.0"), None);
    }

    #[test]
    fn single_compatible_version_is_returned() {
        let info = package(&[("1.2.0", Some(">=5.0.0"))]);
        assert_eq!(latest_compatible_version(&info, "5.9.0").as_deref(), Some("1.2.0"));
    }

    #[test]
    fn greatest_compatible_version_wins() {
        let info = package(&[("1.0.0", None), ("1.5.0", None)]);
        assert_eq!(latest_compatible_version(&info, "5.9.0").as_deref(), Some("1.5.0"));
    }

    #[test]
    fn prerelease_orders_below_release() {
        let info = package(&[("2.0.0-beta.1", None), ("1.9.0", None), ("2.0.0", None)]);
        assert_eq!(latest_compatible_version(&info, "5.9.0").as_deref(), Some("2.0.0"));
    }

    #[test]
    fn incompatible_and_invalid_ranges_are_skipped() {
        let info = package(&[
            ("1.6.0", Some(">=5.9.0 <7.0.0")),
            ("999.0.0", Some(">=999.0.0 <1000.0.0")),
            ("2.0.0", Some("definitely not a range")),
        ]);
        assert_eq!(latest_compatible_version(&info, "5.9.0").as_deref(), Some("1.6.0"));
    }

    #[test]
    fn floor_version_makes_old_ranges_compatible() {
        // Host 6.0.0 is outside `<5.0.0`, but the 4.7.0 floor is inside it.
        assert!(range_accepts("<5.0.0", "6.0.0"));
        assert!(!range_accepts("<4.0.0", "6.0.0"));
        assert!(!range_accepts(">=999.0.0 <1000.0.0", "5.9.0"));

        let info = package(&[("0.9.0", Some(">=4.0.0 <5.0.0"))]);
        assert_eq!(latest_compatible_version(&info, "6.0.0").as_deref(), Some("0.9.0"));
    }

    #[test]
    fn unparseable_host_only_checks_floor() {
        assert!(range_accepts(">=4.0.0 <5.0.0", "nightly"));
        assert!(!range_accepts(">=5.0.0", "nightly"));
    }

    #[test]
    fn build_metadata_does_not_break_ties() {
        let info = package(&[("1.0.0+a", None), ("1.0.0+b", None)]);
        assert_eq!(latest_compatible_version(&info, "5.9.0").as_deref(), Some("1.0.0+a"));
    }

    #[test]
    fn version_comparison() {
        assert!(version_gt("1.6.1", "1.6.0"));
        assert!(!version_gt("1.6.0", "1.6.0"));
        assert!(!version_gt("garbage", "1.0.0"));
        assert!(version_gt("v2.0.0", "1.9.9"));
    }
}
