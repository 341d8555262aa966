//! Unsaved change detection
//!
//! Compares the last-committed document with a candidate rebuilt from the
//! fields on screen. Payloads are compared after normalization, so `null`, a
//! missing key and an empty string are the same value.

use intake_model::payload;
use intake_model::Document;
use std::fmt;

/// Part of a document that differs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyField {
    /// Identifier
    Id,
    /// Workflow status
    Status,
    /// Any section status
    Sections,
    /// History entries
    History,
    /// Server timestamps
    Timestamps,
    /// Program-level approval flag
    ProgramLevelApproval,
    /// Section content
    Payload,
}

impl fmt::Display for DirtyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DirtyField::Id => "id",
            DirtyField::Status => "status",
            DirtyField::Sections => "sections",
            DirtyField::History => "history",
            DirtyField::Timestamps => "timestamps",
            DirtyField::ProgramLevelApproval => "programLevelApproval",
            DirtyField::Payload => "payload",
        };
        f.write_str(name)
    }
}

/// Structural comparison of two documents
#[derive(Debug, Clone, Copy, Default)]
pub struct DirtyDetector;

impl DirtyDetector {
    /// Fields that differ between `committed` and `candidate`
    #[must_use]
    pub fn diff(committed: &Document, candidate: &Document) -> Vec<DirtyField> {
        let mut changed = Vec::new();

        if committed.id() != candidate.id() {
            changed.push(DirtyField::Id);
        }
        if committed.status() != candidate.status() {
            changed.push(DirtyField::Status);
        }
        if committed.sections() != candidate.sections() {
            changed.push(DirtyField::Sections);
        }
        if committed.history() != candidate.history() {
            changed.push(DirtyField::History);
        }
        if committed.created_at() != candidate.created_at()
            || committed.updated_at() != candidate.updated_at()
            || committed.submitted_date() != candidate.submitted_date()
        {
            changed.push(DirtyField::Timestamps);
        }
        if committed.program_level_approval() != candidate.program_level_approval() {
            changed.push(DirtyField::ProgramLevelApproval);
        }
        if !payload::payloads_equal(committed.payload(), candidate.payload()) {
            changed.push(DirtyField::Payload);
        }

        changed
    }

    /// Whether `candidate` holds unsaved changes
    #[must_use]
    pub fn is_dirty(committed: &Document, candidate: &Document) -> bool {
        !Self::diff(committed, candidate).is_empty()
    }
}
