//! Path exclusion rules shared by packing and directory verification.

use std::collections::BTreeSet;
use std::path::Path;

const ALWAYS_EXCLUDED: [&str; 8] = [
    ".git",
    "node_modules",
    ".venv",
    "venv",
    "__pycache__",
    ".pytest_cache",
    ".turbo",
    ".cache",
];
const BUILD_OUTPUT: [&str; 3] = ["dist", "build", ".next"];
const EXCLUDED_SUFFIXES: [&str; 2] = [".db", ".sqlite"];

/// Set of path-component patterns skipped during traversal.
///
/// A pattern is either an exact component name (`node_modules`) or a suffix
/// glob (`*.db`). A path is excluded when any of its components matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionSet {
    names: BTreeSet<String>,
    suffixes: BTreeSet<String>,
}

impl Default for ExclusionSet {
    fn default() -> Self {
        Self::standard(false)
    }
}

impl ExclusionSet {
    /// Creates an empty set that excludes nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            names: BTreeSet::new(),
            suffixes: BTreeSet::new(),
        }
    }

    /// Built-in exclusions: version control, dependency caches, virtual
    /// environments, local databases and, unless `include_build_output` is
    /// set, build output directories.
    #[must_use]
    pub fn standard(include_build_output: bool) -> Self {
        let mut set = Self::empty();
        for name in ALWAYS_EXCLUDED {
            set.names.insert(name.to_owned());
        }
        if !include_build_output {
            for name in BUILD_OUTPUT {
                set.names.insert(name.to_owned());
            }
        }
        for suffix in EXCLUDED_SUFFIXES {
            set.suffixes.insert(suffix.to_owned());
        }
        set
    }

    /// Adds patterns of the form `name` or `*.suffix`. Blank patterns are
    /// ignored.
    #[must_use]
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let trimmed = pattern.as_ref().trim();
            if trimmed.is_empty() {
                continue;
            }
            match trimmed.strip_prefix('*') {
                Some(suffix) if !suffix.is_empty() => {
                    self.suffixes.insert(suffix.to_owned());
                }
                Some(_) => {}
                None => {
                    self.names.insert(trimmed.trim_end_matches('/').to_owned());
                }
            }
        }
        self
    }

    /// Returns `true` when a single path component matches a pattern.
    #[must_use]
    pub fn excludes_name(&self, name: &str) -> bool {
        self.names.contains(name) || self.suffixes.iter().any(|suffix| name.ends_with(suffix))
    }

    /// Returns `true` when any component of the relative path matches.
    #[must_use]
    pub fn excludes(&self, relative: &Path) -> bool {
        relative
            .components()
            .filter_map(|component| component.as_os_str().to_str())
            .any(|name| self.excludes_name(name))
    }
}
