use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identifier::ResourceIdentifier;

/// Well-known metadata predicates.
pub mod vocab {
    pub const CONTENT_TYPE: &str = "http://www.w3.org/ns/ma-ont#format";
    pub const CONTENT_LENGTH: &str = "http://www.w3.org/ns/posix/stat#size";
    pub const MODIFIED: &str = "http://purl.org/dc/terms/modified";
    pub const RESOURCE_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const CONTAINS: &str = "http://www.w3.org/ns/ldp#contains";

    pub const LDP_RESOURCE: &str = "http://www.w3.org/ns/ldp#Resource";
    pub const LDP_CONTAINER: &str = "http://www.w3.org/ns/ldp#Container";
}

/// Descriptive properties of one resource.
///
/// A multimap from predicate to values, bound to the identifier it describes.
/// Metadata is copied or merged when it crosses component boundaries; it is
/// never shared between owners.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepresentationMetadata {
    identifier: ResourceIdentifier,
    #[serde(default)]
    properties: BTreeMap<String, Vec<String>>,
}

impl RepresentationMetadata {
    /// Empty metadata for `identifier`.
    pub fn new(identifier: ResourceIdentifier) -> Self {
        Self {
            identifier,
            properties: BTreeMap::new(),
        }
    }

    /// Metadata for a container, typed as `ldp:Container`.
    pub fn container(identifier: ResourceIdentifier) -> Self {
        let mut metadata = Self::new(identifier);
        metadata.add(vocab::RESOURCE_TYPE, vocab::LDP_CONTAINER);
        metadata
    }

    /// Builder-style content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.set_content_type(content_type);
        self
    }

    /// The identifier this metadata describes.
    pub fn identifier(&self) -> &ResourceIdentifier {
        &self.identifier
    }

    /// A copy of these properties bound to another identifier.
    pub fn rebind(&self, identifier: ResourceIdentifier) -> Self {
        Self {
            identifier,
            properties: self.properties.clone(),
        }
    }

    /// First value of `predicate`.
    pub fn get(&self, predicate: &str) -> Option<&str> {
        self.properties
            .get(predicate)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of `predicate`, in insertion order.
    pub fn get_all(&self, predicate: &str) -> &[String] {
        self.properties
            .get(predicate)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Replace all values of `predicate` with `value`.
    pub fn set(&mut self, predicate: impl Into<String>, value: impl Into<String>) {
        self.properties
            .insert(predicate.into(), vec![value.into()]);
    }

    /// Append `value` to `predicate` unless already present.
    pub fn add(&mut self, predicate: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        let values = self.properties.entry(predicate.into()).or_default();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    /// Remove every value of `predicate`, returning them.
    pub fn remove(&mut self, predicate: &str) -> Vec<String> {
        self.properties.remove(predicate).unwrap_or_default()
    }

    /// Remove one value of `predicate`. Returns `true` if it was present.
    pub fn remove_value(&mut self, predicate: &str, value: &str) -> bool {
        let Some(values) = self.properties.get_mut(predicate) else {
            return false;
        };
        let before = values.len();
        values.retain(|v| v != value);
        let removed = values.len() != before;
        if values.is_empty() {
            self.properties.remove(predicate);
        }
        removed
    }

    /// Returns `true` if `predicate` has at least one value.
    pub fn has(&self, predicate: &str) -> bool {
        !self.get_all(predicate).is_empty()
    }

    /// Returns `true` if `predicate` has exactly this value among its values.
    pub fn has_value(&self, predicate: &str, value: &str) -> bool {
        self.get_all(predicate).iter().any(|v| v == value)
    }

    /// Iterate `(predicate, values)` in predicate order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.properties
            .iter()
            .map(|(p, v)| (p.as_str(), v.as_slice()))
    }

    /// Number of predicates with values.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Returns `true` if no properties are set.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Overlay `other` onto `self`: every predicate present in `other`
    /// replaces the same predicate here. The identifier is kept.
    pub fn merge(&mut self, other: &RepresentationMetadata) {
        for (predicate, values) in &other.properties {
            self.properties.insert(predicate.clone(), values.clone());
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get(vocab::CONTENT_TYPE)
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.set(vocab::CONTENT_TYPE, content_type);
    }

    /// Byte size of the document body, if recorded.
    pub fn content_length(&self) -> Option<u64> {
        self.get(vocab::CONTENT_LENGTH)?.parse().ok()
    }

    pub fn set_content_length(&mut self, length: u64) {
        self.set(vocab::CONTENT_LENGTH, length.to_string());
    }

    /// Returns `true` if the identifier or the resource type mark a container.
    pub fn is_container(&self) -> bool {
        self.identifier.is_container() || self.has_value(vocab::RESOURCE_TYPE, vocab::LDP_CONTAINER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(path: &str) -> RepresentationMetadata {
        RepresentationMetadata::new(ResourceIdentifier::new(path))
    }

    #[test]
    fn set_replaces_and_add_appends() {
        let mut m = meta("/a.txt");
        m.set("p", "1");
        m.set("p", "2");
        assert_eq!(m.get_all("p"), ["2".to_string()]);

        m.add("p", "3");
        m.add("p", "3");
        assert_eq!(m.get_all("p"), ["2".to_string(), "3".to_string()]);
        assert_eq!(m.get("p"), Some("2"));
    }

    #[test]
    fn missing_predicate_is_empty() {
        let m = meta("/a.txt");
        assert!(m.get("nope").is_none());
        assert!(m.get_all("nope").is_empty());
        assert!(!m.has("nope"));
        assert!(m.is_empty());
    }

    #[test]
    fn remove_value_drops_empty_predicate() {
        let mut m = meta("/a.txt");
        m.add("p", "x");
        assert!(m.remove_value("p", "x"));
        assert!(!m.remove_value("p", "x"));
        assert!(!m.has("p"));
        assert_eq!(m.len(), 0);
    }

    #[test]
    fn content_helpers() {
        let mut m = meta("/a.txt").with_content_type("text/plain");
        m.set_content_length(42);
        assert_eq!(m.content_type(), Some("text/plain"));
        assert_eq!(m.content_length(), Some(42));

        m.set(vocab::CONTENT_LENGTH, "not-a-number");
        assert_eq!(m.content_length(), None);
    }

    #[test]
    fn merge_overlays_predicates() {
        let mut base = meta("/a.txt").with_content_type("text/plain");
        base.set("keep", "yes");

        let mut update = meta("/other");
        update.set_content_type("text/markdown");
        update.add("extra", "1");

        base.merge(&update);
        assert_eq!(base.identifier(), &ResourceIdentifier::new("/a.txt"));
        assert_eq!(base.content_type(), Some("text/markdown"));
        assert_eq!(base.get("keep"), Some("yes"));
        assert_eq!(base.get("extra"), Some("1"));
    }

    #[test]
    fn container_detection() {
        assert!(meta("/c/").is_container());
        assert!(!meta("/c").is_container());
        assert!(RepresentationMetadata::container(ResourceIdentifier::new("/c")).is_container());
    }

    #[test]
    fn rebind_copies_properties() {
        let original = meta("/a.txt").with_content_type("text/plain");
        let copy = original.rebind(ResourceIdentifier::new("/b.txt"));
        assert_eq!(copy.identifier().path(), "/b.txt");
        assert_eq!(copy.content_type(), Some("text/plain"));
        assert_eq!(original.identifier().path(), "/a.txt");
    }

    #[test]
    fn json_roundtrip_preserves_everything() {
        let mut m = meta("/a.txt").with_content_type("text/plain");
        m.add(vocab::CONTAINS, "/a/1");
        m.add(vocab::CONTAINS, "/a/2");
        let json = serde_json::to_string(&m).unwrap();
        let back: RepresentationMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
