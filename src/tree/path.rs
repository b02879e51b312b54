//! Paths inside a directory tree and path filters.
//!
//! Paths are `/`-rooted and compared case-insensitively; the original spelling
//! is kept for display and persistence.

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use unicode_normalization::UnicodeNormalization;

/// Suffix reserved for property records in the stored meta-tree
pub const PROPERTIES_MARKER: &str = ".props.json";

const INVALID_CHARS: &[char] = &['\\', ':', '*', '?', '"', '<', '>', '|'];

/// Validated, case-insensitive tree path
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TreePath {
    value: String,
    key: String,
}

impl TreePath {
    /// The root path `/`
    pub fn root() -> Self {
        TreePath {
            value: "/".to_string(),
            key: "/".to_string(),
        }
    }

    pub fn parse(path: &str) -> Result<Self, SyncError> {
        let value: String = path.nfc().collect();
        if !value.starts_with('/') {
            return Err(SyncError::Validation(format!(
                "Path must start with '/': {:?}",
                path
            )));
        }
        if value == "/" {
            return Ok(Self::root());
        }
        if value.ends_with('/') {
            return Err(SyncError::Validation(format!(
                "Path must not end with a separator: {:?}",
                path
            )));
        }
        for segment in value[1..].split('/') {
            validate_name(segment)?;
        }
        let key = value.to_lowercase();
        Ok(TreePath { value, key })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Lower-cased form used for comparison and record keys
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_root(&self) -> bool {
        self.value == "/"
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.value[1..].split('/').filter(|s| !s.is_empty())
    }

    pub fn name(&self) -> &str {
        self.segments().last().unwrap_or("")
    }

    pub fn parent(&self) -> Option<TreePath> {
        if self.is_root() {
            return None;
        }
        let cut = self.value.rfind('/').unwrap_or(0);
        if cut == 0 {
            Some(Self::root())
        } else {
            let value = self.value[..cut].to_string();
            let key = value.to_lowercase();
            Some(TreePath { value, key })
        }
    }

    pub fn join(&self, name: &str) -> Result<TreePath, SyncError> {
        validate_name(name)?;
        let name: String = name.nfc().collect();
        let value = if self.is_root() {
            format!("/{}", name)
        } else {
            format!("{}/{}", self.value, name)
        };
        let key = value.to_lowercase();
        Ok(TreePath { value, key })
    }

    /// Segment-aware prefix test: `/a` is a prefix of `/a` and `/a/b`, not of `/ab`.
    pub fn starts_with(&self, prefix: &TreePath) -> bool {
        if prefix.is_root() {
            return true;
        }
        self.key == prefix.key
            || (self.key.starts_with(&prefix.key)
                && self.key.as_bytes().get(prefix.key.len()) == Some(&b'/'))
    }
}

/// Validate a single path segment / entry name
pub fn validate_name(name: &str) -> Result<(), SyncError> {
    if name.is_empty() {
        return Err(SyncError::Validation("Empty path segment".to_string()));
    }
    if name == "." || name == ".." {
        return Err(SyncError::Validation(format!(
            "Relative path segment not allowed: {:?}",
            name
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| c.is_control() || INVALID_CHARS.contains(c) || *c == '/')
    {
        return Err(SyncError::Validation(format!(
            "Invalid character {:?} in name {:?}",
            c, name
        )));
    }
    if name.to_lowercase().ends_with(PROPERTIES_MARKER) {
        return Err(SyncError::Validation(format!(
            "Name {:?} uses the reserved suffix {}",
            name, PROPERTIES_MARKER
        )));
    }
    Ok(())
}

impl PartialEq for TreePath {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for TreePath {}

impl Hash for TreePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for TreePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl fmt::Debug for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreePath({:?})", self.value)
    }
}

impl TryFrom<String> for TreePath {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TreePath::parse(&value)
    }
}

impl From<TreePath> for String {
    fn from(path: TreePath) -> Self {
        path.value
    }
}

/// Restricts diffs to paths under any of a set of prefixes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathFilter {
    prefixes: Vec<TreePath>,
}

impl PathFilter {
    pub fn new(prefixes: Vec<TreePath>) -> Self {
        Self { prefixes }
    }

    pub fn parse<'a>(prefixes: impl IntoIterator<Item = &'a str>) -> Result<Self, SyncError> {
        let prefixes = prefixes
            .into_iter()
            .map(TreePath::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { prefixes })
    }

    pub fn prefixes(&self) -> &[TreePath] {
        &self.prefixes
    }

    /// Whether a file path is retained by the filter
    pub fn matches(&self, path: &TreePath) -> bool {
        self.prefixes.iter().any(|prefix| path.starts_with(prefix))
    }

    /// Whether anything below `directory` could match; used to prune walks.
    pub fn may_contain(&self, directory: &TreePath) -> bool {
        self.prefixes
            .iter()
            .any(|prefix| directory.starts_with(prefix) || prefix.starts_with(directory))
    }
}
