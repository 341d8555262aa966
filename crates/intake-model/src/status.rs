//! Document workflow status and section completion status

use serde::{Deserialize, Serialize};
use std::fmt;

/// Workflow status of a Submission Request
///
/// Owned by the server; the client only reads it and requests transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ApplicationStatus {
    /// Created locally, never saved
    #[default]
    New,
    /// Saved at least once, still being edited
    #[serde(rename = "In Progress")]
    InProgress,
    /// Submitted for review
    Submitted,
    /// A reviewer picked it up
    #[serde(rename = "In Review")]
    InReview,
    /// Reviewer asked the submitter for more information
    Inquired,
    /// Terminal for this document instance
    Approved,
    /// Terminal until explicitly reopened
    Rejected,
}

impl ApplicationStatus {
    /// Every status, in workflow order
    pub const ALL: [ApplicationStatus; 7] = [
        ApplicationStatus::New,
        ApplicationStatus::InProgress,
        ApplicationStatus::Submitted,
        ApplicationStatus::InReview,
        ApplicationStatus::Inquired,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
    ];

    /// Wire/display name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::New => "New",
            ApplicationStatus::InProgress => "In Progress",
            ApplicationStatus::Submitted => "Submitted",
            ApplicationStatus::InReview => "In Review",
            ApplicationStatus::Inquired => "Inquired",
            ApplicationStatus::Approved => "Approved",
            ApplicationStatus::Rejected => "Rejected",
        }
    }

    /// Whether sections may still be edited and saved
    #[inline]
    #[must_use]
    pub fn is_editable(&self) -> bool {
        matches!(self, ApplicationStatus::New | ApplicationStatus::InProgress)
    }

    /// Approved documents never leave their status
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplicationStatus::Approved)
    }

    /// Whether the document has left the editing phase
    #[inline]
    #[must_use]
    pub fn is_past_editing(&self) -> bool {
        !self.is_editable()
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion status of a single section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SectionStatus {
    /// Never visited (also implied by an absent key)
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    /// Visited, some required field unsatisfied
    #[serde(rename = "In Progress")]
    InProgress,
    /// Every required field satisfied at the last save
    Completed,
}

impl SectionStatus {
    /// Wire/display name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionStatus::NotStarted => "Not Started",
            SectionStatus::InProgress => "In Progress",
            SectionStatus::Completed => "Completed",
        }
    }

    /// Check if completed
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, SectionStatus::Completed)
    }

    /// Check if the section was ever visited
    #[inline]
    #[must_use]
    pub fn is_visited(&self) -> bool {
        !matches!(self, SectionStatus::NotStarted)
    }
}

impl fmt::Display for SectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
