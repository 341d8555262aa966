//! Review workflow transition table

use crate::error::TransitionError;
use crate::status::ApplicationStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A status-changing workflow call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// Hand the document over for review
    Submit,
    /// A reviewer picks the document up
    Review,
    /// Accept, optionally for the whole program
    Approve,
    /// Ask the submitter for more information
    Inquire,
    /// Decline
    Reject,
    /// Return a declined or inquired document to editing
    Reopen,
}

impl Transition {
    /// Every transition
    pub const ALL: [Transition; 6] = [
        Transition::Submit,
        Transition::Review,
        Transition::Approve,
        Transition::Inquire,
        Transition::Reject,
        Transition::Reopen,
    ];

    /// Statuses this transition may start from
    #[must_use]
    pub fn allowed_from(&self) -> &'static [ApplicationStatus] {
        use ApplicationStatus::*;
        match self {
            Transition::Submit => &[InProgress],
            Transition::Review => &[Submitted],
            Transition::Approve | Transition::Inquire | Transition::Reject => &[InReview],
            Transition::Reopen => &[Rejected, Inquired],
        }
    }

    /// Status the server is expected to answer with
    ///
    /// `None` for `Inquire`: the server either keeps `In Review` or moves the
    /// document to `Inquired`.
    #[must_use]
    pub fn target(&self) -> Option<ApplicationStatus> {
        match self {
            Transition::Submit => Some(ApplicationStatus::Submitted),
            Transition::Review => Some(ApplicationStatus::InReview),
            Transition::Approve => Some(ApplicationStatus::Approved),
            Transition::Inquire => None,
            Transition::Reject => Some(ApplicationStatus::Rejected),
            Transition::Reopen => Some(ApplicationStatus::InProgress),
        }
    }

    /// Whether a reviewer comment is mandatory
    #[inline]
    #[must_use]
    pub fn requires_comment(&self) -> bool {
        matches!(
            self,
            Transition::Approve | Transition::Inquire | Transition::Reject
        )
    }

    /// Lowercase name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Submit => "submit",
            Transition::Review => "review",
            Transition::Approve => "approve",
            Transition::Inquire => "inquire",
            Transition::Reject => "reject",
            Transition::Reopen => "reopen",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validates a workflow transition from `from`.
///
/// # Errors
/// `TransitionError` if `transition` is not legal from `from`
pub fn validate_transition(
    from: ApplicationStatus,
    transition: Transition,
) -> Result<(), TransitionError> {
    if transition.allowed_from().contains(&from) {
        Ok(())
    } else {
        Err(TransitionError { from, transition })
    }
}

/// Transitions legal from `from`
#[must_use]
pub fn available_transitions(from: ApplicationStatus) -> Vec<Transition> {
    Transition::ALL
        .into_iter()
        .filter(|t| t.allowed_from().contains(&from))
        .collect()
}
