//! Typed side-channel storage for data shared between stages.
//!
//! Stages publish data under a [`Key`], a typed token declared once as a
//! `const`. Entries are reference counted so that cloning an [`Extra`] (as
//! mounting does) never duplicates the values themselves.
//!
//! Key names share one namespace per request: two unrelated stages must not
//! declare keys with the same name.
//!
//! # Example
//!
//! ```
//! use weft_core::{Extra, Key};
//!
//! const USER: Key<String> = Key::new("user");
//!
//! let mut extra = Extra::new();
//! extra.set(&USER, "alice".to_string());
//! assert_eq!(extra.get(&USER).map(String::as_str), Some("alice"));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A typed key into an [`Extra`] map.
pub struct Key<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    /// Declares a key with the given name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Returns the key's name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.name).finish()
    }
}

/// Per-request map from [`Key`] names to values.
#[derive(Clone, Default)]
pub struct Extra {
    entries: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
}

impl Extra {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn set<T: Send + Sync + 'static>(&mut self, key: &Key<T>, value: T) {
        self.entries.insert(key.name, Arc::new(value));
    }

    /// Returns the value stored under `key`.
    ///
    /// Returns `None` if nothing is stored, or if the stored value has a
    /// different type (a key collision).
    pub fn get<T: Send + Sync + 'static>(&self, key: &Key<T>) -> Option<&T> {
        let entry = self.entries.get(key.name)?;
        let value = entry.downcast_ref::<T>();
        debug_assert!(
            value.is_some(),
            "extra key `{}` is used with more than one type",
            key.name
        );
        value
    }

    /// Returns true if an entry exists under `key`'s name.
    pub fn contains<T>(&self, key: &Key<T>) -> bool {
        self.entries.contains_key(key.name)
    }

    /// Removes and returns the value stored under `key`.
    ///
    /// The value is only returned when this map held the last reference.
    pub fn remove<T: Send + Sync + 'static>(&mut self, key: &Key<T>) -> Option<T> {
        let entry = self.entries.remove(key.name)?;
        Arc::downcast::<T>(entry)
            .ok()
            .and_then(|arc| Arc::try_unwrap(arc).ok())
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the names of the stored entries.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }
}

impl fmt::Debug for Extra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: Key<String> = Key::new("user");
    const COUNT: Key<u32> = Key::new("count");

    #[test]
    fn test_set_and_get() {
        let mut extra = Extra::new();
        assert!(extra.is_empty());

        extra.set(&USER, "alice".to_string());
        extra.set(&COUNT, 3);

        assert_eq!(extra.get(&USER).map(String::as_str), Some("alice"));
        assert_eq!(extra.get(&COUNT), Some(&3));
        assert_eq!(extra.len(), 2);
    }

    #[test]
    fn test_set_replaces() {
        let mut extra = Extra::new();
        extra.set(&COUNT, 1);
        extra.set(&COUNT, 2);
        assert_eq!(extra.get(&COUNT), Some(&2));
        assert_eq!(extra.len(), 1);
    }

    #[test]
    fn test_clone_shares_values() {
        let mut extra = Extra::new();
        extra.set(&USER, "bob".to_string());

        let mut derived = extra.clone();
        derived.set(&COUNT, 9);

        assert_eq!(derived.get(&USER).map(String::as_str), Some("bob"));
        assert!(!extra.contains(&COUNT));
    }

    #[test]
    fn test_remove() {
        let mut extra = Extra::new();
        extra.set(&COUNT, 5);
        assert_eq!(extra.remove(&COUNT), Some(5));
        assert!(extra.get(&COUNT).is_none());
    }

    #[test]
    fn test_remove_shared_value_drops_entry() {
        let mut extra = Extra::new();
        extra.set(&COUNT, 5);
        let _clone = extra.clone();
        assert_eq!(extra.remove(&COUNT), None);
        assert!(!extra.contains(&COUNT));
    }
}
