//! Release ordering for repository version strings
//!
//! Versions scraped from the repository are not semver. They are ranked by a single
//! integer weight where every dot-separated component owns four decimal digits and a
//! pre-release tag only ever adjusts the component it is attached to.

use crate::error::UpdateError;
use crate::types::UpdatePolicy;
use anyhow::Result;
use std::cmp::Reverse;

const COMPONENT_BASE: f64 = 10000.0;

/// Compute the rank of a version string. Higher means newer.
///
/// `"2.3"` is read as `"2.3.0"`. Stable releases outrank release candidates, which
/// outrank early access builds of the same numeric prefix.
pub fn version_weight(version: &str) -> i64 {
    let version = version.trim();
    if version.is_empty() {
        return 0;
    }

    let mut components: Vec<&str> = version.split('.').collect();
    if components.len() == 2 {
        components.push("0");
    }

    components
        .iter()
        .rev()
        .enumerate()
        .fold(0i64, |acc, (index, component)| {
            let score = COMPONENT_BASE.powi(index as i32) * (1.0 + patch_weight(component));
            acc.saturating_add(score as i64)
        })
}

fn patch_weight(component: &str) -> f64 {
    if let Ok(n) = component.parse::<i64>() {
        return 1.0 + n as f64;
    }

    let mut parts: Vec<&str> = component.split('-').collect();
    while parts.len() < 3 {
        parts.push("0");
    }

    if component.contains("RC") {
        lenient_number(parts[0])
            + 0.1 * lenient_number(parts[1])
            + 0.01 * lenient_number(parts[2])
            + 0.01
    } else {
        0.001 * lenient_number(parts[0])
            + 0.0001 * lenient_number(parts[1])
            + 0.00001 * lenient_number(parts[2])
    }
}

fn lenient_number(part: &str) -> f64 {
    part.trim_matches(|c: char| c.is_ascii_alphabetic())
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

/// Newest first. Equal weights fall back to the version string, greatest first.
pub fn sort_by_version<S: AsRef<str>>(versions: &[S]) -> Vec<String> {
    let mut sorted: Vec<String> = versions.iter().map(|v| v.as_ref().to_string()).collect();
    sorted.sort_by_cached_key(|v| (Reverse(version_weight(v)), Reverse(v.clone())));
    sorted
}

pub fn latest_version<S: AsRef<str>>(versions: &[S]) -> Option<String> {
    sort_by_version(versions).into_iter().next()
}

/// Pick the newest version allowed by `policy`.
///
/// A `1.x` line that never shipped a stable tag is treated as stable: when every
/// `1.`-prefixed version carries a `-` suffix, only those versions are candidates.
pub fn select_version<S: AsRef<str>>(
    versions: &[S],
    policy: UpdatePolicy,
) -> Result<String, UpdateError> {
    let legacy: Vec<&str> = versions
        .iter()
        .map(|v| v.as_ref())
        .filter(|v| v.starts_with("1."))
        .collect();

    let candidates: Vec<&str> = if !legacy.is_empty() && legacy.iter().all(|v| v.contains('-')) {
        tracing::debug!("Only pre-release 1.x versions published, treating them as stable");
        legacy
    } else {
        match policy {
            UpdatePolicy::Keep | UpdatePolicy::Stable => versions
                .iter()
                .map(|v| v.as_ref())
                .filter(|v| !v.contains('-'))
                .collect(),
            UpdatePolicy::Ea => versions.iter().map(|v| v.as_ref()).collect(),
        }
    };

    tracing::debug!("{} candidate version(s) for policy {}", candidates.len(), policy);

    latest_version(&candidates).ok_or(UpdateError::NoVersionFound { policy })
}

/// Pull version tokens out of a repository directory listing page.
///
/// Entries look like `<a href="2.3.1/" rel="nofollow">2.3.1/</a>`.
pub fn extract_versions(listing: &str) -> Result<Vec<String>> {
    let re = regex::Regex::new(r#"(?i)rel="nofollow">([0-9][0-9]*(?:\.[0-9]*)*[^/<>]*)/<"#)?;

    let mut versions: Vec<String> = Vec::new();
    for cap in re.captures_iter(listing) {
        let version = cap[1].to_string();
        if !versions.contains(&version) {
            versions.push(version);
        }
    }

    tracing::debug!("Found {} version(s) in listing", versions.len());
    Ok(versions)
}
