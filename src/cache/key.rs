use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one invalidatable partition of cached remote data.
///
/// A key is an ordered list of string segments such as `["categories"]` or
/// `["products", "category", "42"]`. Keys are compared segment by segment;
/// a key *extends* another when the other key's segments are a leading run
/// of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataGroupKey(Vec<String>);

/// How an invalidation key is matched against cached keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Only the identical key matches.
    Exact,
    /// The key itself and every key that extends it match.
    Prefix,
}

impl MatchMode {
    /// Map the `exact` flag used by callers onto a mode.
    pub fn from_exact(exact: bool) -> Self {
        if exact {
            MatchMode::Exact
        } else {
            MatchMode::Prefix
        }
    }
}

impl DataGroupKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Returns a new key with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `prefix`'s segments are the leading segments of this key, in order.
    ///
    /// An empty prefix matches every key.
    pub fn starts_with(&self, prefix: &DataGroupKey) -> bool {
        self.0.len() >= prefix.0.len() && self.0.iter().zip(&prefix.0).all(|(a, b)| a == b)
    }

    /// Whether an invalidation of `group` under `mode` covers this key.
    pub fn matches(&self, group: &DataGroupKey, mode: MatchMode) -> bool {
        match mode {
            MatchMode::Exact => self == group,
            MatchMode::Prefix => self.starts_with(group),
        }
    }
}

impl From<&str> for DataGroupKey {
    fn from(segment: &str) -> Self {
        Self(vec![segment.to_owned()])
    }
}

impl<const N: usize> From<[&str; N]> for DataGroupKey {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}

impl fmt::Display for DataGroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{segment}")?;
        }
        f.write_str("]")
    }
}
