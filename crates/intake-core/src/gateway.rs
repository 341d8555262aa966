//! Remote document store interface
//!
//! The transport behind it (REST, GraphQL, in-process) is the implementor's
//! business. Save and workflow calls answer with the server-authoritative
//! subset of the document as [`ServerFields`].

use crate::error::GatewayError;
use async_trait::async_trait;
use intake_model::{Document, DocumentId, ServerFields};

/// Remote document store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Fetch a document; `None` if the server has no content for `id`
    async fn fetch_by_id(&self, id: &DocumentId) -> Result<Option<Document>, GatewayError>;

    /// The current user's most recent submission, if any
    async fn fetch_most_recent_of_current_user(&self) -> Result<Option<Document>, GatewayError>;

    /// Create or update a document
    async fn save_document(&self, document: &Document) -> Result<ServerFields, GatewayError>;

    /// Hand the document over for review
    async fn submit(&self, id: &DocumentId) -> Result<ServerFields, GatewayError>;

    /// Mark the document as picked up by a reviewer
    async fn review(&self, id: &DocumentId) -> Result<ServerFields, GatewayError>;

    /// Approve, optionally for the whole program
    async fn approve(
        &self,
        id: &DocumentId,
        comment: &str,
        whole_program: bool,
    ) -> Result<ServerFields, GatewayError>;

    /// Ask the submitter for more information
    async fn inquire(&self, id: &DocumentId, comment: &str) -> Result<ServerFields, GatewayError>;

    /// Decline
    async fn reject(&self, id: &DocumentId, comment: &str) -> Result<ServerFields, GatewayError>;

    /// Return to editing
    async fn reopen(&self, id: &DocumentId) -> Result<ServerFields, GatewayError>;
}
