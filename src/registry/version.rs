//! Semantic version range matching.
//!
//! Ranges use the npm dialect registrants and callers already speak:
//! exact versions, comparison operators, caret and tilde ranges, wildcards,
//! partial versions, whitespace conjunctions, `||` disjunctions and hyphen
//! ranges. Each comparator set is translated into a `semver::VersionReq`.
//!
//! Note that a bare `1.2.3` is an *exact* match here, whereas `semver` reads
//! it as `^1.2.3`. Bare versions are therefore rewritten with an `=` operator.

use semver::{Version, VersionReq};
use thiserror::Error;

const OPERATOR_CHARS: &[char] = &['<', '>', '=', '~', '^'];

/// A range expression that failed to parse.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid version range '{0}'")]
pub struct RangeError(pub String);

/// A parsed version range: satisfied when any alternative matches.
#[derive(Debug, Clone)]
pub struct VersionRange {
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    pub fn parse(range: &str) -> Result<Self, RangeError> {
        let alternatives = range
            .split("||")
            .map(parse_comparator_set)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| RangeError(range.to_string()))?;
        Ok(Self { alternatives })
    }

    /// Check a version string. Unparseable versions never match.
    pub fn matches(&self, version: &str) -> bool {
        match parse_version(version) {
            Some(v) => self.matches_version(&v),
            None => false,
        }
    }

    pub fn matches_version(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

/// Decide whether `version` satisfies `range`.
///
/// Malformed input on either side yields `false`.
pub fn satisfies(version: &str, range: &str) -> bool {
    match VersionRange::parse(range) {
        Ok(range) => range.matches(version),
        Err(_) => false,
    }
}

/// Parse a version, tolerating a leading `v` or `=`.
pub fn parse_version(version: &str) -> Option<Version> {
    let trimmed = version.trim();
    let trimmed = trimmed.strip_prefix('=').unwrap_or(trimmed);
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(trimmed).ok()
}

fn parse_comparator_set(set: &str) -> Option<VersionReq> {
    let set = set.trim();
    if set.is_empty() {
        return Some(VersionReq::STAR);
    }

    if let Some((low, high)) = set.split_once(" - ") {
        let low = strip_v(low.trim());
        let high = strip_v(high.trim());
        // `<=1.2` already means `<1.3.0` in semver, matching npm's partial upper bound.
        return VersionReq::parse(&format!(">={}, <={}", low, high)).ok();
    }

    let translated = comparator_tokens(set)
        .iter()
        .map(|token| translate(token))
        .collect::<Option<Vec<_>>>()?;
    VersionReq::parse(&translated.join(", ")).ok()
}

/// Split on whitespace, gluing a dangling operator (`>= 1.2.0`) to its version.
fn comparator_tokens(set: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut pending_op = String::new();
    for raw in set.split_whitespace() {
        if raw.chars().all(|c| OPERATOR_CHARS.contains(&c)) {
            pending_op.push_str(raw);
            continue;
        }
        tokens.push(format!("{}{}", pending_op, raw));
        pending_op.clear();
    }
    if !pending_op.is_empty() {
        // Operator with no version; keep it so the parse fails closed.
        tokens.push(pending_op);
    }
    tokens
}

fn translate(token: &str) -> Option<String> {
    let split = token
        .find(|c: char| !OPERATOR_CHARS.contains(&c))
        .unwrap_or(token.len());
    let (op, rest) = token.split_at(split);
    let rest = strip_v(rest);
    if rest.is_empty() {
        return None;
    }

    let has_wildcard = rest
        .split('.')
        .any(|part| matches!(part, "*" | "x" | "X"));

    match op {
        "" | "=" if has_wildcard => Some(rest.to_string()),
        "" => Some(format!("={}", rest)),
        _ => Some(format!("{}{}", op, rest)),
    }
}

fn strip_v(s: &str) -> &str {
    s.strip_prefix('v').unwrap_or(s)
}
