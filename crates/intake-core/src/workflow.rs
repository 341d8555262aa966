//! Review workflow transitions
//!
//! Each transition is validated locally, sent, and only then merged: the
//! document's status never changes before the server confirms it.
//!
//! | Transition | Valid from | Lifecycle while in flight |
//! |---|---|---|
//! | submit | In Progress, all sections Completed | `SUBMITTING` |
//! | review | Submitted | `LOADING` |
//! | approve / inquire / reject | In Review, non-empty comment | `SUBMITTING` |
//! | reopen | Rejected, Inquired | `LOADING` |

use crate::error::{IntakeError, ValidationError, WorkflowError};
use crate::lifecycle::LifecycleStatus;
use crate::store::DocumentStore;
use intake_model::{validate_transition, Document, DocumentId, SectionRegistry, Transition};

/// A workflow call with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRequest {
    /// Transition to perform
    pub transition: Transition,
    /// Reviewer comment, for decisions
    pub comment: Option<String>,
    /// Approval covers the whole program
    pub whole_program: bool,
}

impl WorkflowRequest {
    fn bare(transition: Transition) -> Self {
        Self {
            transition,
            comment: None,
            whole_program: false,
        }
    }

    fn with_comment(transition: Transition, comment: impl Into<String>) -> Self {
        Self {
            transition,
            comment: Some(comment.into()),
            whole_program: false,
        }
    }

    /// Submit request
    #[must_use]
    pub fn submit() -> Self {
        Self::bare(Transition::Submit)
    }

    /// Review request
    #[must_use]
    pub fn review() -> Self {
        Self::bare(Transition::Review)
    }

    /// Approve request
    #[must_use]
    pub fn approve(comment: impl Into<String>, whole_program: bool) -> Self {
        Self {
            whole_program,
            ..Self::with_comment(Transition::Approve, comment)
        }
    }

    /// Inquire request
    #[must_use]
    pub fn inquire(comment: impl Into<String>) -> Self {
        Self::with_comment(Transition::Inquire, comment)
    }

    /// Reject request
    #[must_use]
    pub fn reject(comment: impl Into<String>) -> Self {
        Self::with_comment(Transition::Reject, comment)
    }

    /// Reopen request
    #[must_use]
    pub fn reopen() -> Self {
        Self::bare(Transition::Reopen)
    }
}

/// Lifecycle phase shown while `transition` is in flight
#[must_use]
pub fn lifecycle_phase(transition: Transition) -> LifecycleStatus {
    match transition {
        Transition::Review | Transition::Reopen => LifecycleStatus::Loading,
        Transition::Submit | Transition::Approve | Transition::Inquire | Transition::Reject => {
            LifecycleStatus::Submitting
        }
    }
}

/// Trim a reviewer comment and check it is usable
///
/// # Errors
/// `EmptyComment` for a missing or blank comment, `CommentTooLong` past `max` characters
pub fn normalize_comment(raw: Option<&str>, max: usize) -> Result<String, ValidationError> {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyComment);
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::CommentTooLong { max });
    }
    Ok(trimmed.to_string())
}

/// Check a request against the committed document
///
/// Returns the normalized comment for decisions.
///
/// # Errors
/// The first failing precondition, as a `ValidationError`
pub fn check_request(
    document: &Document,
    registry: &SectionRegistry,
    request: &WorkflowRequest,
    comment_max_len: usize,
) -> Result<Option<String>, ValidationError> {
    if !document.id().is_persisted() {
        return Err(ValidationError::NotPersisted);
    }

    validate_transition(document.status(), request.transition)?;

    if request.transition == Transition::Submit {
        let pending = document.pending_sections(registry);
        if !pending.is_empty() {
            return Err(ValidationError::IncompleteSections { pending });
        }
    }

    if request.transition.requires_comment() {
        normalize_comment(request.comment.as_deref(), comment_max_len).map(Some)
    } else {
        Ok(None)
    }
}

impl DocumentStore {
    /// Submit the document for review
    ///
    /// # Errors
    /// `ValidationError::IncompleteSections` if a section is not `Completed`;
    /// otherwise as [`Self::transition`]
    pub async fn submit(&self) -> Result<DocumentId, WorkflowError> {
        self.transition(WorkflowRequest::submit()).await
    }

    /// Pick the document up for review
    ///
    /// # Errors
    /// As [`Self::transition`]
    pub async fn review(&self) -> Result<DocumentId, WorkflowError> {
        self.transition(WorkflowRequest::review()).await
    }

    /// Approve, optionally for the whole program
    ///
    /// # Errors
    /// `ValidationError::EmptyComment` for a blank comment; otherwise as [`Self::transition`]
    pub async fn approve(
        &self,
        comment: impl Into<String>,
        whole_program: bool,
    ) -> Result<DocumentId, WorkflowError> {
        self.transition(WorkflowRequest::approve(comment, whole_program))
            .await
    }

    /// Ask the submitter for more information
    ///
    /// # Errors
    /// `ValidationError::EmptyComment` for a blank comment; otherwise as [`Self::transition`]
    pub async fn inquire(&self, comment: impl Into<String>) -> Result<DocumentId, WorkflowError> {
        self.transition(WorkflowRequest::inquire(comment)).await
    }

    /// Decline
    ///
    /// # Errors
    /// `ValidationError::EmptyComment` for a blank comment; otherwise as [`Self::transition`]
    pub async fn reject(&self, comment: impl Into<String>) -> Result<DocumentId, WorkflowError> {
        self.transition(WorkflowRequest::reject(comment)).await
    }

    /// Return a rejected or inquired document to editing
    ///
    /// # Errors
    /// As [`Self::transition`]
    pub async fn reopen(&self) -> Result<DocumentId, WorkflowError> {
        self.transition(WorkflowRequest::reopen()).await
    }

    /// Validate, send and merge one workflow call
    ///
    /// # Errors
    /// - `ValidationError` if a precondition fails (nothing sent, lifecycle unchanged)
    /// - `GatewayError` if the call fails (lifecycle `ERROR`, document unchanged)
    /// - `IntakeError::Busy` / `NotLoaded` / `Closed`
    pub async fn transition(&self, request: WorkflowRequest) -> Result<DocumentId, WorkflowError> {
        let op = self.begin()?;
        let base = self.committed().ok_or(IntakeError::NotLoaded)?;

        let comment = check_request(
            &base,
            &self.config().sections,
            &request,
            self.config().comment_max_len,
        )
        .map_err(|e| {
            tracing::warn!("Refusing {} of {}: {}", request.transition, base.id(), e);
            e
        })?
        .unwrap_or_default();

        let id = base.id().clone();
        let gateway = self.gateway();
        tracing::info!("Requesting {} for document {}", request.transition, id);

        let call = match request.transition {
            Transition::Submit => gateway.submit(&id),
            Transition::Review => gateway.review(&id),
            Transition::Approve => gateway.approve(&id, &comment, request.whole_program),
            Transition::Inquire => gateway.inquire(&id, &comment),
            Transition::Reject => gateway.reject(&id, &comment),
            Transition::Reopen => gateway.reopen(&id),
        };

        self.apply_server_call(
            op,
            lifecycle_phase(request.transition),
            request.transition,
            base,
            call,
        )
        .await
    }
}
