//! Section renderer interface
//!
//! The mounted section's form owns field values until they are pulled. The
//! core pulls synchronously on Save and when resolving a blocked navigation.

use intake_model::{Payload, SectionId};

/// Values pulled from the mounted section
#[derive(Debug, Clone, PartialEq)]
pub struct SectionSnapshot {
    /// Section the values belong to
    pub section: SectionId,
    /// Top-level payload keys owned by the section
    pub payload: Payload,
    /// Whether every required field currently satisfies its constraints
    pub valid: bool,
}

impl SectionSnapshot {
    /// Create snapshot
    #[inline]
    #[must_use]
    pub fn new(section: impl Into<SectionId>, payload: Payload, valid: bool) -> Self {
        Self {
            section: section.into(),
            payload,
            valid,
        }
    }
}

/// The mounted section form
pub trait SectionRenderer: Send + Sync {
    /// Pull current values and validity; `None` when nothing editable is mounted
    fn extract(&self) -> Option<SectionSnapshot>;
}
