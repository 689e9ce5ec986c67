//! Shared glob pattern normalization and matching helpers.

use crate::error::{IngestError, Result};
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Prefix that turns a filter entry into an exclusion.
pub const EXCLUDE_PREFIX: char = '!';

/// Normalize a glob pattern for matching against relative paths.
///
/// Rules:
/// - Empty or "*" becomes "**/*" (match all)
/// - Backslashes become forward slashes
/// - Leading slashes and "./" are stripped (relative matching)
/// - Patterns without a path separator get "**/" prefix
pub fn normalize_glob_pattern(raw: &str) -> String {
    let replaced = raw.trim().replace('\\', "/");
    let mut pattern = replaced
        .trim_start_matches("./")
        .trim_start_matches('/')
        .to_string();

    if pattern.is_empty() || pattern == "*" {
        pattern = "**/*".to_string();
    }

    if !pattern.contains('/') && !pattern.starts_with("**/") && pattern != "**/*" {
        pattern = format!("**/{}", pattern);
    }

    pattern
}

/// Compile one normalized pattern: case-insensitive, `*` stops at `/`.
fn build_glob(raw: &str, normalized: &str) -> Result<Glob> {
    GlobBuilder::new(normalized)
        .case_insensitive(true)
        .literal_separator(true)
        .build()
        .map_err(|e| IngestError::Pattern {
            pattern: raw.to_string(),
            reason: e.kind().to_string(),
        })
}

fn build_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(build_glob(pattern, pattern)?);
    }
    builder.build().map_err(|e| IngestError::Pattern {
        pattern: patterns.join(", "),
        reason: e.to_string(),
    })
}

/// Join path components with forward slashes regardless of host platform.
pub fn to_forward_slashes(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Compiled source filters.
///
/// Entries starting with `!` exclude; the rest include. A path matches when
/// any inclusion matches and no exclusion does.
#[derive(Debug, Clone)]
pub struct FilterSet {
    patterns: Vec<String>,
    excludes: Vec<String>,
    include_set: GlobSet,
    exclude_set: GlobSet,
}

impl FilterSet {
    pub fn new<I, S>(raw_patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns = Vec::new();
        let mut excludes = Vec::new();
        for raw in raw_patterns {
            let raw = raw.as_ref().trim();
            match raw.strip_prefix(EXCLUDE_PREFIX) {
                Some(excluded) => {
                    let normalized = normalize_glob_pattern(excluded);
                    build_glob(raw, &normalized)?;
                    excludes.push(normalized);
                }
                None => {
                    let normalized = normalize_glob_pattern(raw);
                    build_glob(raw, &normalized)?;
                    patterns.push(normalized);
                }
            }
        }

        Ok(Self {
            include_set: build_set(&patterns)?,
            exclude_set: build_set(&excludes)?,
            patterns,
            excludes,
        })
    }

    /// Match a path relative to its source root.
    pub fn is_match(&self, relative: &Path) -> bool {
        let candidate = to_forward_slashes(relative);
        self.include_set.is_match(&candidate) && !self.exclude_set.is_match(&candidate)
    }

    /// Normalized inclusion patterns.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Normalized exclusion patterns, without the `!`.
    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    /// No inclusion pattern, so nothing can ever match.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
