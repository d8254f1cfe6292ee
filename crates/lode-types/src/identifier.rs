use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Opaque, immutable locator naming exactly one resource.
///
/// Identifiers are URI-like paths such as `/docs/readme.txt`. A trailing `/`
/// marks a container. Equality, ordering and hashing are by value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceIdentifier(String);

impl ResourceIdentifier {
    /// Wrap a path without validation.
    ///
    /// Use [`str::parse`] for identifiers that come from untrusted input.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The root container `/`.
    pub fn root() -> Self {
        Self("/".into())
    }

    /// The underlying path.
    pub fn path(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the identifier names a container.
    pub fn is_container(&self) -> bool {
        self.0.ends_with('/')
    }

    /// The containing container, or `None` for a root.
    pub fn parent(&self) -> Option<Self> {
        let trimmed = self.0.strip_suffix('/').unwrap_or(&self.0);
        let idx = trimmed.rfind('/')?;
        let parent = &trimmed[..=idx];
        // `scheme://` is an authority boundary, not a container.
        if parent.ends_with("//") {
            return None;
        }
        Some(Self(parent.to_string()))
    }

    /// The last path segment, without the container slash.
    pub fn name(&self) -> &str {
        let trimmed = self.0.strip_suffix('/').unwrap_or(&self.0);
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }

    /// The identifier of a direct child of this container.
    pub fn child(&self, name: &str, container: bool) -> Result<Self, TypeError> {
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(TypeError::InvalidChildName(name.to_string()));
        }
        let mut path = self.0.clone();
        if !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(name);
        if container {
            path.push('/');
        }
        Ok(Self(path))
    }

    /// Returns `true` if `other` is a direct child of this identifier.
    pub fn is_parent_of(&self, other: &ResourceIdentifier) -> bool {
        other.parent().as_ref() == Some(self)
    }
}

impl FromStr for ResourceIdentifier {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(TypeError::EmptyIdentifier);
        }
        if s.chars().any(char::is_control) {
            return Err(TypeError::InvalidIdentifier {
                identifier: s.to_string(),
                reason: "contains control characters".into(),
            });
        }
        if s.contains("//") && !s.contains("://") {
            return Err(TypeError::InvalidIdentifier {
                identifier: s.to_string(),
                reason: "contains an empty path segment".into(),
            });
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(s: &str) -> ResourceIdentifier {
        ResourceIdentifier::new(s)
    }

    #[test]
    fn container_detection() {
        assert!(id("/").is_container());
        assert!(id("/a/").is_container());
        assert!(!id("/a/b.txt").is_container());
    }

    #[test]
    fn parent_of_document_and_container() {
        assert_eq!(id("/a/b.txt").parent(), Some(id("/a/")));
        assert_eq!(id("/a/b/").parent(), Some(id("/a/")));
        assert_eq!(id("/a").parent(), Some(id("/")));
        assert_eq!(id("/").parent(), None);
    }

    #[test]
    fn parent_stops_at_authority() {
        assert_eq!(
            id("http://pod.example/a.txt").parent(),
            Some(id("http://pod.example/"))
        );
        assert_eq!(id("http://pod.example/").parent(), None);
    }

    #[test]
    fn name_strips_container_slash() {
        assert_eq!(id("/a/b.txt").name(), "b.txt");
        assert_eq!(id("/a/b/").name(), "b");
        assert_eq!(id("/").name(), "");
    }

    #[test]
    fn child_joins_segments() {
        assert_eq!(id("/a/").child("b.txt", false).unwrap(), id("/a/b.txt"));
        assert_eq!(id("/a/").child("c", true).unwrap(), id("/a/c/"));
        assert!(id("/a/").is_parent_of(&id("/a/b.txt")));
        assert!(!id("/").is_parent_of(&id("/a/b.txt")));
    }

    #[test]
    fn child_rejects_bad_names() {
        for bad in ["", "x/y", ".", ".."] {
            assert_eq!(
                id("/").child(bad, false).unwrap_err(),
                TypeError::InvalidChildName(bad.into())
            );
        }
    }

    #[test]
    fn parse_validates() {
        assert_eq!("".parse::<ResourceIdentifier>(), Err(TypeError::EmptyIdentifier));
        assert!("/a\n".parse::<ResourceIdentifier>().is_err());
        assert!("/a//b".parse::<ResourceIdentifier>().is_err());
        assert_eq!("/doc.txt".parse::<ResourceIdentifier>().unwrap(), id("/doc.txt"));
        assert!("https://pod.example/doc".parse::<ResourceIdentifier>().is_ok());
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&id("/doc.txt")).unwrap();
        assert_eq!(json, "\"/doc.txt\"");
        let back: ResourceIdentifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id("/doc.txt"));
    }

    proptest! {
        #[test]
        fn child_parent_is_self(segments in proptest::collection::vec("[a-z0-9]{1,8}", 0..5), leaf in "[a-z0-9.]{1,8}", container in any::<bool>()) {
            prop_assume!(leaf != "." && leaf != "..");
            let mut base = ResourceIdentifier::root();
            for s in &segments {
                base = base.child(s, true).unwrap();
            }
            let child = base.child(&leaf, container).unwrap();
            prop_assert_eq!(child.parent(), Some(base.clone()));
            prop_assert_eq!(child.name(), leaf.as_str());
            prop_assert_eq!(child.is_container(), container);
        }
    }
}
