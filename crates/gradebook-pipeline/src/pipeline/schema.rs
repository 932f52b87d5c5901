//! Build-time field validation for pipelines
//!
//! A [`FieldSet`] describes which dotted paths a row is known to carry.
//! Each stage maps the set forward so a pipeline can be rejected before any
//! row is processed when it references a field that cannot exist.

use std::collections::BTreeSet;

/// Known field paths of a row shape
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    paths: BTreeSet<String>,
}

impl FieldSet {
    /// Create an empty field set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from paths; parent segments of dotted paths are added too
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for path in paths {
            set.insert(path.as_ref());
        }
        set
    }

    /// Add a path and all of its parents
    pub fn insert(&mut self, path: &str) {
        let mut end = 0;
        for segment in path.split('.') {
            end += segment.len();
            self.paths.insert(path[..end].to_string());
            end += 1;
        }
    }

    /// Returns true if the path is known
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Returns true if the path is a top-level name
    pub fn is_top_level(path: &str) -> bool {
        !path.contains('.')
    }

    /// Iterate known paths
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}
