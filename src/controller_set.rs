//! Comma-separated controller specifications.
//!
//! A controller specification such as `cpu,cpuacct` names the controllers a query or a
//! modification applies to. An empty specification, or one starting with `*`, names all
//! controllers.
//!
//! ```
//! use cgroups_rest::ControllerSet;
//!
//! let set: ControllerSet = "cpu,memory".parse().unwrap();
//! assert!(set.is_member("cpu"));
//! assert!(!set.is_member("cpuacct"));
//! assert_eq!(set.count(), 2);
//!
//! let all = ControllerSet::all();
//! assert!(all.is_member("anything"));
//! ```

use std::{convert::Infallible, fmt, str::FromStr};

use crate::v1::Controller;

/// Marker for "all controllers".
pub const WILDCARD: &str = "*";

/// Ordered set of controller names, or the wildcard.
///
/// Names keep the order they appear in the specification. Duplicated names are kept as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSet {
    names: Vec<String>,
    wildcard: bool,
}

impl ControllerSet {
    /// The wildcard set, matching every controller.
    pub fn all() -> Self {
        Self {
            names: vec![WILDCARD.to_string()],
            wildcard: true,
        }
    }

    /// Parses a comma-separated specification. Empty tokens are skipped; whitespace is kept as
    /// part of a name.
    pub fn parse_spec(spec: &str) -> Self {
        Self {
            names: spec
                .split(',')
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            wildcard: spec.is_empty() || spec.starts_with('*'),
        }
    }

    /// Returns whether this set matches every controller.
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Returns whether `name` is in this set. The wildcard set contains any name. Matching is by
    /// whole comma-delimited token, so `cpu` is not a member of `cpuacct`.
    pub fn is_member(&self, name: &str) -> bool {
        self.wildcard || self.names.iter().any(|n| n == name)
    }

    /// Returns the number of comma-delimited tokens in the specification.
    pub fn count(&self) -> usize {
        self.names.len()
    }

    /// Tokens of the specification, in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Resolves this set against the enumerated controllers. The wildcard resolves to the name of
    /// every controller in enumeration order; otherwise the tokens are returned as they are.
    pub fn resolve(&self, known: &[Controller]) -> Vec<String> {
        if self.wildcard {
            known.iter().map(|c| c.name.clone()).collect()
        } else {
            self.names.clone()
        }
    }
}

impl Default for ControllerSet {
    fn default() -> Self {
        Self::all()
    }
}

impl FromStr for ControllerSet {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_spec(s))
    }
}

impl fmt::Display for ControllerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names.join(","))
    }
}
