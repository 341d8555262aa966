//! Error types for Intake Core
//!
//! Three failure families, kept apart so callers can react to each:
//! - [`ValidationError`]: a client-side precondition failed; nothing was sent
//! - [`GatewayError`]: the remote call failed in transport or was rejected
//! - [`IntakeError`]: what every store operation returns, wrapping the above
//!   plus session-level refusals (busy, closed, not loaded)

use crate::lifecycle::LifecycleStatus;
use intake_model::{ApplicationStatus, SectionId, TransitionError};
use std::fmt;

/// Machine-readable code of a server-side rejection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DomainErrorCode {
    /// Another request already uses this study abbreviation
    DuplicateStudyAbbreviation,
    /// Any other code; opaque to the client
    Unknown(String),
}

impl DomainErrorCode {
    /// Wire code for [`DomainErrorCode::DuplicateStudyAbbreviation`]
    pub const DUPLICATE_STUDY_ABBREVIATION: &'static str = "DUPLICATE_STUDY_ABBREVIATION";

    /// Parse a wire code
    #[must_use]
    pub fn parse(code: &str) -> Self {
        match code {
            Self::DUPLICATE_STUDY_ABBREVIATION => Self::DuplicateStudyAbbreviation,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Wire code
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::DuplicateStudyAbbreviation => Self::DUPLICATE_STUDY_ABBREVIATION,
            Self::Unknown(code) => code,
        }
    }
}

impl fmt::Display for DomainErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The server processed the request and rejected it
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} [{code}]")]
pub struct DomainError {
    /// Machine-readable code
    pub code: DomainErrorCode,
    /// User-facing message
    pub message: String,
}

impl DomainError {
    /// Create domain error
    #[inline]
    #[must_use]
    pub fn new(code: DomainErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Duplicate study abbreviation rejection
    #[inline]
    #[must_use]
    pub fn duplicate_study(message: impl Into<String>) -> Self {
        Self::new(DomainErrorCode::DuplicateStudyAbbreviation, message)
    }

    /// Opaque rejection with a raw code
    #[inline]
    #[must_use]
    pub fn other(code: impl AsRef<str>, message: impl Into<String>) -> Self {
        Self::new(DomainErrorCode::parse(code.as_ref()), message)
    }

    /// Check if this is the duplicate study abbreviation rejection
    #[inline]
    #[must_use]
    pub fn is_duplicate_study(&self) -> bool {
        self.code == DomainErrorCode::DuplicateStudyAbbreviation
    }
}

/// Failure of a `RemoteGateway` call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Network failure, timeout, unreachable server
    #[error("transport error: {0}")]
    Transport(String),

    /// The server rejected the request
    #[error("request rejected: {0}")]
    Domain(#[from] DomainError),

    /// The call completed but the response is unusable
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Client-side precondition failure; never reaches the gateway
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Empty or whitespace-only document identifier
    #[error("Invalid application ID provided")]
    InvalidId,

    /// Review decisions need a comment
    #[error("a review comment is required")]
    EmptyComment,

    /// Review comment over the configured limit
    #[error("review comment exceeds {max} characters")]
    CommentTooLong {
        /// Limit in characters
        max: usize,
    },

    /// Submit with sections that are not `Completed`
    #[error("sections not completed: {}", join_ids(.pending))]
    IncompleteSections {
        /// Pending sections in display order
        pending: Vec<SectionId>,
    },

    /// Transition not legal from the current status
    #[error(transparent)]
    IllegalTransition(#[from] TransitionError),

    /// Workflow call on a document that was never saved
    #[error("document has not been saved yet")]
    NotPersisted,

    /// The Review pseudo-section has no content of its own
    #[error("the review section cannot be edited")]
    ReviewNotEditable,

    /// Section identifier not in the registry
    #[error("unknown section: {0}")]
    UnknownSection(SectionId),

    /// Save on a document past the editing phase
    #[error("document in status '{status}' is read-only")]
    ReadOnly {
        /// Current workflow status
        status: ApplicationStatus,
    },
}

fn join_ids(ids: &[SectionId]) -> String {
    ids.iter()
        .map(SectionId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error returned by every `DocumentStore` operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    /// Client-side precondition failed
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Remote call failed
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Another save or workflow call is in flight
    #[error("another operation is in flight (lifecycle {lifecycle})")]
    Busy {
        /// Lifecycle phase at the time of the attempt
        lifecycle: LifecycleStatus,
    },

    /// No document loaded yet
    #[error("no document loaded")]
    NotLoaded,

    /// The editing session was closed
    #[error("editing session closed")]
    Closed,
}

impl IntakeError {
    /// Check if the remote call failed in transport
    #[inline]
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Gateway(GatewayError::Transport(_)))
    }

    /// Check if the server rejected the request
    #[inline]
    #[must_use]
    pub fn is_domain(&self) -> bool {
        matches!(self, Self::Gateway(GatewayError::Domain(_)))
    }

    /// Domain code, if the server rejected the request
    #[must_use]
    pub fn domain_code(&self) -> Option<&DomainErrorCode> {
        match self {
            Self::Gateway(GatewayError::Domain(err)) => Some(&err.code),
            _ => None,
        }
    }

    /// Check if a client-side precondition failed
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if repeating the same call may succeed
    ///
    /// Nothing is retried automatically; this only informs the caller.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Gateway(GatewayError::Transport(_)) | Self::Busy { .. })
    }
}

/// Error of `DocumentStore::load`
pub type LoadError = IntakeError;

/// Error of `DocumentStore::save`
pub type SaveError = IntakeError;

/// Error of the workflow transitions
pub type WorkflowError = IntakeError;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading the file failed
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML did not parse
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A section reference does not name an editable section
    #[error("{field} refers to unknown section '{id}'")]
    UnknownSection {
        /// Offending field
        field: &'static str,
        /// Referenced identifier
        id: SectionId,
    },

    /// The initial payload is not usable
    #[error("initial payload: {0}")]
    InitialPayload(String),
}
