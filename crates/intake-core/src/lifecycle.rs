//! Lifecycle phase of a `DocumentStore`
//!
//! Distinct from the document's own workflow status: this tracks what the
//! store is doing, not where the document is in review.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStatus {
    /// Fetching or building a document; also used by `review` and `reopen`
    #[default]
    Loading,
    /// Idle with a usable document
    Loaded,
    /// A save is in flight
    Saving,
    /// A workflow transition is in flight
    Submitting,
    /// The last operation failed
    Error,
}

impl LifecycleStatus {
    /// Wire/display name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Loading => "LOADING",
            LifecycleStatus::Loaded => "LOADED",
            LifecycleStatus::Saving => "SAVING",
            LifecycleStatus::Submitting => "SUBMITTING",
            LifecycleStatus::Error => "ERROR",
        }
    }

    /// Whether the UI must disable mutating controls
    #[inline]
    #[must_use]
    pub fn blocks_mutation(&self) -> bool {
        matches!(self, LifecycleStatus::Saving | LifecycleStatus::Submitting)
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
