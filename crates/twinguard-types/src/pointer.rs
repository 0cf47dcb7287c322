//! JSON pointers addressing locations inside an entity.
//!
//! A [`JsonPointer`] is a sequence of unescaped segments. The textual form
//! follows RFC 6901 (`/features/temp`, `~1` for `/`, `~0` for `~`); the root
//! pointer renders as `/`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A parsed JSON pointer.
///
/// # Example
///
/// ```
/// use twinguard_types::JsonPointer;
///
/// let ptr = JsonPointer::parse("/features/temp/properties");
/// assert_eq!(ptr.root_segment(), Some("features"));
/// assert!(JsonPointer::parse("/features").is_prefix_of(&ptr));
/// assert_eq!(JsonPointer::root().to_string(), "/");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct JsonPointer {
    segments: Vec<String>,
}

impl JsonPointer {
    /// The pointer to the whole document.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a pointer; empty segments (`//`, trailing `/`) are ignored.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let segments = raw
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| s.replace("~1", "/").replace("~0", "~"))
            .collect();
        Self { segments }
    }

    /// Builds a pointer from unescaped segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` for the root pointer.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the first segment, if any.
    #[must_use]
    pub fn root_segment(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// Returns the last segment, if any.
    #[must_use]
    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Returns the unescaped segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` for the root pointer.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns a new pointer with `segment` appended.
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Returns a new pointer with all of `other`'s segments appended.
    #[must_use]
    pub fn join(&self, other: &JsonPointer) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Returns the parent pointer; the root is its own parent.
    #[must_use]
    pub fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }

    /// Returns `true` if `self` equals `other` or is an ancestor of it.
    #[must_use]
    pub fn is_prefix_of(&self, other: &JsonPointer) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Returns `true` if `self` is a strict ancestor of `other`.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &JsonPointer) -> bool {
        self.segments.len() < other.segments.len() && self.is_prefix_of(other)
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

impl FromStr for JsonPointer {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for JsonPointer {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for JsonPointer {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<JsonPointer> for String {
    fn from(ptr: JsonPointer) -> Self {
        ptr.to_string()
    }
}
