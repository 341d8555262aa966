//! Document and section identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque document identifier
///
/// The literal `"new"` is the sentinel for a document that has not been
/// persisted yet. It is replaced by the server-issued identifier on the first
/// successful save and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Sentinel text for an unsaved document
    pub const NEW_SENTINEL: &'static str = "new";

    /// Wrap a server-issued identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The "not yet persisted" sentinel
    #[inline]
    #[must_use]
    pub fn unsaved() -> Self {
        Self(Self::NEW_SENTINEL.to_string())
    }

    /// Check if this is the unsaved sentinel
    #[inline]
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.0 == Self::NEW_SENTINEL
    }

    /// Check if the identifier is empty or whitespace only
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Check if the identifier names a persisted document
    #[inline]
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        !self.is_new() && !self.is_blank()
    }

    /// Borrow the raw identifier
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::unsaved()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Section identifier (`"A"`, `"B"`, ..., `"REVIEW"`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(String);

impl SectionId {
    /// Create a section identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
