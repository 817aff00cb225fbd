//! Captured route parameters.
//!
//! Captures are stored in pattern order using a small-vector optimization,
//! so the common case of a few parameters never allocates for the table
//! itself.

use std::ops::Index;

use smallvec::SmallVec;

/// Maximum number of parameters stored inline.
const INLINE_PARAMS: usize = 4;

/// Ordered captures of a matched route.
///
/// Named parameters keep their name; unnamed groups (`(\d+)`, `*`) are named
/// `"0"`, `"1"`, ... in the order they appear. An optional parameter that did
/// not match is present with an empty value, so positions never shift.
///
/// # Example
///
/// ```rust
/// use weft_router::Params;
///
/// let mut params = Params::new();
/// params.push("user", "42");
/// params.push("0", "avatar.png");
///
/// assert_eq!(params.get("user"), Some("42"));
/// assert_eq!(params.positional(1), Some("avatar.png"));
/// assert_eq!(&params[0], "42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    inner: SmallVec<[(String, String); INLINE_PARAMS]>,
}

impl Params {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a parameter set with room for `capacity` captures.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: SmallVec::with_capacity(capacity),
        }
    }

    /// Appends a capture.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns the value captured under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the value at `index`, counting every capture in order.
    #[must_use]
    pub fn positional(&self, index: usize) -> Option<&str> {
        self.inner.get(index).map(|(_, v)| v.as_str())
    }

    /// Returns true if there are no captures.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of captures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Iterates over `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.into_iter()
    }

    /// Iterates over the values in order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.inner.iter().map(|(_, v)| v.as_str())
    }
}

impl Index<usize> for Params {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.inner[index].1
    }
}

fn as_pair((name, value): &(String, String)) -> (&str, &str) {
    (name.as_str(), value.as_str())
}

impl<'a> IntoIterator for &'a Params {
    type Item = (&'a str, &'a str);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (String, String)>,
        fn(&'a (String, String)) -> (&'a str, &'a str),
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.inner
            .iter()
            .map(as_pair as fn(&'a (String, String)) -> (&'a str, &'a str))
    }
}

impl FromIterator<(String, String)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Params {
        let mut params = Params::new();
        params.push("user", "7");
        params.push("0", "css/site.css");
        params
    }

    #[test]
    fn test_lookup_by_name_and_position() {
        let params = sample();
        assert_eq!(params.get("user"), Some("7"));
        assert_eq!(params.get("0"), Some("css/site.css"));
        assert_eq!(params.get("missing"), None);
        assert_eq!(params.positional(1), Some("css/site.css"));
        assert_eq!(params.positional(2), None);
        assert_eq!(&params[0], "7");
    }

    #[test]
    fn test_first_duplicate_name_wins() {
        let params: Params = [("id", "1"), ("id", "2")]
            .into_iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
        assert_eq!(params.get("id"), Some("1"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_iteration_keeps_capture_order() {
        let params = sample();
        let names: Vec<&str> = (&params).into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["user", "0"]);
        assert_eq!(params.values().collect::<Vec<_>>(), ["7", "css/site.css"]);
    }

    #[test]
    fn test_spills_past_inline_capacity() {
        let mut params = Params::with_capacity(1);
        for i in 0..INLINE_PARAMS + 2 {
            params.push(i.to_string(), format!("segment-{i}"));
        }
        assert_eq!(params.len(), INLINE_PARAMS + 2);
        assert_eq!(params.get("5"), Some("segment-5"));
        assert!(!params.is_empty());
        assert!(Params::new().is_empty());
    }
}
