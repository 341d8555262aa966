//! Error types for the document model

use crate::id::{DocumentId, SectionId};
use crate::status::ApplicationStatus;
use crate::transition::Transition;

/// Errors raised while absorbing server data into a [`crate::Document`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// A persisted document received a different identifier
    #[error("document identity changed: {current} -> {received}")]
    IdentityChanged {
        /// Identifier held locally
        current: DocumentId,
        /// Identifier the server answered with
        received: DocumentId,
    },

    /// The server answered with the "not yet persisted" sentinel or a blank id
    #[error("server returned unusable identifier '{0}'")]
    UnusableIdentifier(DocumentId),
}

/// Errors building a [`crate::SectionRegistry`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No editable sections were configured
    #[error("section registry must contain at least one editable section")]
    Empty,

    /// The same identifier appears twice
    #[error("duplicate section identifier: {0}")]
    DuplicateSection(SectionId),

    /// A section identifier is blank
    #[error("section identifier must not be blank")]
    BlankIdentifier,
}

/// Illegal workflow transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {transition} a document in status '{from}'")]
pub struct TransitionError {
    /// Status the document was in
    pub from: ApplicationStatus,
    /// Transition that was attempted
    pub transition: Transition,
}
