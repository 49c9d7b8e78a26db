//! Metadata filters over the catalog.

use std::collections::BTreeMap;

use dynext_sdk::Interface;

use crate::descriptor::{keys, ExtensionDescriptor};

/// Selects descriptors by key/value pairs.
///
/// Values given for the same key are alternatives (OR), different keys must
/// all match (AND). Keys may name extra metadata or any built-in key from
/// [`keys`], such as `interface_name`. An empty filter matches every valid
/// descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    criteria: BTreeMap<String, Vec<String>>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on the interface `I`.
    pub fn interface<I: ?Sized + Interface>() -> Self {
        Self::new().with(keys::INTERFACE_NAME, I::NAME)
    }

    /// Add an accepted value for `key`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let values = self.criteria.entry(key.into()).or_default();
        let value = value.into();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Evaluate the filter against an arbitrary key lookup.
    pub fn matches_with<F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        self.criteria.iter().all(|(key, accepted)| {
            lookup(key).is_some_and(|actual| accepted.iter().any(|value| *value == actual))
        })
    }

    pub fn matches(&self, descriptor: &ExtensionDescriptor) -> bool {
        descriptor.is_valid() && self.matches_with(|key| descriptor.get(key))
    }
}

impl<K, V> FromIterator<(K, V)> for MetadataFilter
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut filter = Self::new();
        for (key, value) in iter {
            filter.insert(key, value);
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_or_within_key() {
        let filter = MetadataFilter::new()
            .with("author", "Alice")
            .with("author", "Bob");

        assert!(filter.matches_with(lookup(&[("author", "Alice")])));
        assert!(filter.matches_with(lookup(&[("author", "Bob")])));
        assert!(!filter.matches_with(lookup(&[("author", "Carol")])));
    }

    #[test]
    fn test_and_across_keys() {
        let filter: MetadataFilter = [("author", "Alice"), ("author", "Bob"), ("company", "MyCorp")]
            .into_iter()
            .collect();

        assert!(filter.matches_with(lookup(&[("author", "Alice"), ("company", "MyCorp")])));
        assert!(!filter.matches_with(lookup(&[("author", "Bob"), ("company", "OtherCorp")])));
        assert!(!filter.matches_with(lookup(&[("author", "Alice")])));
    }

    #[test]
    fn test_empty_filter() {
        let filter = MetadataFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches_with(lookup(&[])));
        assert!(!filter.matches(&ExtensionDescriptor::invalid()));
    }

    #[test]
    fn test_duplicate_values_collapse() {
        let filter = MetadataFilter::new().with("author", "Alice").with("author", "Alice");
        assert_eq!(filter, MetadataFilter::new().with("author", "Alice"));
    }

    #[test]
    fn test_interface_filter() {
        trait Sample {}
        dynext_sdk::declare_interface!(dyn Sample, "tests::Sample");

        let filter = MetadataFilter::interface::<dyn Sample>();
        assert!(filter.matches_with(lookup(&[("interface_name", "tests::Sample")])));
        assert!(!filter.matches_with(lookup(&[("interface_name", "tests::Other")])));
    }
}
