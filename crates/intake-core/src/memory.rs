//! In-process gateway
//!
//! Keeps documents in memory and behaves like the real server where the
//! client can observe it: it assigns identifiers, owns status and history,
//! enforces the transition table and rejects duplicate study abbreviations.
//! Failures can be scripted per call, and calls can be held open to observe
//! the store while a request is in flight.

use crate::error::{DomainError, GatewayError};
use crate::gateway::RemoteGateway;
use async_trait::async_trait;
use chrono::Utc;
use intake_model::{
    validate_transition, ApplicationStatus, Document, DocumentId, HistoryEvent, ServerFields,
    Transition,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use tokio::sync::Notify;
use ulid::Ulid;

/// Gateway operation, for scripting failures and inspecting the call log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayCall {
    /// `fetch_by_id`
    FetchById,
    /// `fetch_most_recent_of_current_user`
    FetchMostRecent,
    /// `save_document`
    Save,
    /// A workflow transition
    Workflow(Transition),
}

impl fmt::Display for GatewayCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayCall::FetchById => f.write_str("fetch_by_id"),
            GatewayCall::FetchMostRecent => f.write_str("fetch_most_recent"),
            GatewayCall::Save => f.write_str("save_document"),
            GatewayCall::Workflow(t) => write!(f, "{t}"),
        }
    }
}

#[derive(Debug, Default)]
struct ServerState {
    documents: HashMap<DocumentId, Document>,
    most_recent: Option<DocumentId>,
    failures: HashMap<GatewayCall, VecDeque<GatewayError>>,
    calls: Vec<GatewayCall>,
    holding: bool,
}

/// In-memory `RemoteGateway`
pub struct InMemoryGateway {
    user_id: String,
    state: Mutex<ServerState>,
    entered: Notify,
    release: Notify,
}

impl fmt::Debug for InMemoryGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryGateway")
            .field("user_id", &self.user_id)
            .field("documents", &state.documents.len())
            .field("calls", &state.calls.len())
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new("user-1")
    }
}

impl InMemoryGateway {
    /// Create gateway acting for `user_id`
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            state: Mutex::new(ServerState::default()),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Store a document as if the server already had it
    pub fn insert(&self, document: Document) {
        let mut state = self.state.lock();
        if document.status().is_past_editing() {
            state.most_recent = Some(document.id().clone());
        }
        state.documents.insert(document.id().clone(), document);
    }

    /// Server copy of a document
    #[must_use]
    pub fn get(&self, id: &DocumentId) -> Option<Document> {
        self.state.lock().documents.get(id).cloned()
    }

    /// Number of stored documents
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().documents.len()
    }

    /// Check if no document is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().documents.is_empty()
    }

    /// Fail the next `call` with `error`; queued per call kind
    pub fn fail_next(&self, call: GatewayCall, error: GatewayError) {
        self.state
            .lock()
            .failures
            .entry(call)
            .or_default()
            .push_back(error);
    }

    /// Every call received, in order
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().calls.clone()
    }

    /// Number of calls of one kind
    #[must_use]
    pub fn call_count(&self, call: GatewayCall) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == call).count()
    }

    /// Hold the next save or workflow call open until [`Self::release`]
    pub fn hold(&self) {
        self.state.lock().holding = true;
    }

    /// Wait until a held call has arrived
    pub async fn wait_held(&self) {
        self.entered.notified().await;
    }

    /// Let the held call complete
    pub fn release(&self) {
        self.release.notify_one();
    }

    /// Record the call; returns a scripted failure if one is queued
    fn enter(&self, call: GatewayCall) -> Result<bool, GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        tracing::trace!("Gateway call {}", call);

        if let Some(err) = state.failures.get_mut(&call).and_then(VecDeque::pop_front) {
            tracing::debug!("Scripted failure for {}: {}", call, err);
            return Err(err);
        }

        let held = state.holding && !matches!(call, GatewayCall::FetchById | GatewayCall::FetchMostRecent);
        if held {
            state.holding = false;
        }
        Ok(held)
    }

    async fn gate(&self, call: GatewayCall) -> Result<(), GatewayError> {
        if self.enter(call)? {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(())
    }

    fn fields(document: &Document) -> ServerFields {
        ServerFields {
            id: Some(document.id().clone()),
            status: Some(document.status()),
            history: Some(document.history().to_vec()),
            created_at: document.created_at(),
            updated_at: document.updated_at(),
            submitted_date: document.submitted_date(),
            program_level_approval: Some(document.program_level_approval()),
        }
    }

    fn study_abbreviation(document: &Document) -> Option<String> {
        document
            .payload()
            .get("study")
            .and_then(|study| study.get("abbreviation"))
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    fn save_locked(&self, document: &Document) -> Result<ServerFields, GatewayError> {
        let mut state = self.state.lock();
        let now = Utc::now();

        let existing = if document.id().is_persisted() {
            let stored = state.documents.get(document.id()).ok_or_else(|| {
                DomainError::other("NOT_FOUND", format!("no document {}", document.id()))
            })?;
            Some(stored.clone())
        } else {
            None
        };

        if let Some(stored) = &existing {
            if !stored.status().is_editable() {
                return Err(DomainError::other(
                    "INVALID_STATE",
                    format!("document in status '{}' cannot be saved", stored.status()),
                )
                .into());
            }
        }

        if let Some(abbreviation) = Self::study_abbreviation(document) {
            let taken = state.documents.values().any(|other| {
                other.id() != document.id()
                    && Self::study_abbreviation(other).as_deref() == Some(abbreviation.as_str())
            });
            if taken {
                return Err(DomainError::duplicate_study(format!(
                    "study abbreviation '{abbreviation}' is already in use"
                ))
                .into());
            }
        }

        let id = existing
            .as_ref()
            .map_or_else(|| DocumentId::new(Ulid::new().to_string()), |d| d.id().clone());
        let history = existing
            .as_ref()
            .map(|d| d.history().to_vec())
            .unwrap_or_default();
        let created_at = existing.as_ref().and_then(Document::created_at).unwrap_or(now);

        let mut stored = document.clone();
        stored
            .absorb(ServerFields {
                id: Some(id.clone()),
                status: Some(ApplicationStatus::InProgress),
                history: Some(history),
                created_at: Some(created_at),
                updated_at: Some(now),
                submitted_date: None,
                program_level_approval: None,
            })
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let fields = Self::fields(&stored);
        state.documents.insert(id, stored);
        Ok(fields)
    }

    fn transition_locked(
        &self,
        id: &DocumentId,
        transition: Transition,
        comment: Option<&str>,
        whole_program: bool,
    ) -> Result<ServerFields, GatewayError> {
        let mut state = self.state.lock();
        let stored = state
            .documents
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::other("NOT_FOUND", format!("no document {id}")))?;

        validate_transition(stored.status(), transition)
            .map_err(|e| DomainError::other("INVALID_TRANSITION", e.to_string()))?;

        let now = Utc::now();
        let target = transition.target().unwrap_or(ApplicationStatus::Inquired);

        let mut event = HistoryEvent::new(target, self.user_id.clone(), now);
        if let Some(comment) = comment {
            event = event.with_comment(comment);
        }
        let mut history = stored.history().to_vec();
        history.push(event);

        let mut next = stored;
        next.absorb(ServerFields {
            status: Some(target),
            history: Some(history),
            updated_at: Some(now),
            submitted_date: (transition == Transition::Submit).then_some(now),
            program_level_approval: (transition == Transition::Approve).then_some(whole_program),
            ..ServerFields::default()
        })
        .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        if transition == Transition::Submit {
            state.most_recent = Some(id.clone());
        }

        let fields = Self::fields(&next);
        state.documents.insert(id.clone(), next);
        Ok(fields)
    }

    async fn workflow(
        &self,
        id: &DocumentId,
        transition: Transition,
        comment: Option<&str>,
        whole_program: bool,
    ) -> Result<ServerFields, GatewayError> {
        self.gate(GatewayCall::Workflow(transition)).await?;
        self.transition_locked(id, transition, comment, whole_program)
    }
}

#[async_trait]
impl RemoteGateway for InMemoryGateway {
    async fn fetch_by_id(&self, id: &DocumentId) -> Result<Option<Document>, GatewayError> {
        self.gate(GatewayCall::FetchById).await?;
        Ok(self.get(id))
    }

    async fn fetch_most_recent_of_current_user(&self) -> Result<Option<Document>, GatewayError> {
        self.gate(GatewayCall::FetchMostRecent).await?;
        let state = self.state.lock();
        Ok(state
            .most_recent
            .as_ref()
            .and_then(|id| state.documents.get(id))
            .cloned())
    }

    async fn save_document(&self, document: &Document) -> Result<ServerFields, GatewayError> {
        self.gate(GatewayCall::Save).await?;
        self.save_locked(document)
    }

    async fn submit(&self, id: &DocumentId) -> Result<ServerFields, GatewayError> {
        self.workflow(id, Transition::Submit, None, false).await
    }

    async fn review(&self, id: &DocumentId) -> Result<ServerFields, GatewayError> {
        self.workflow(id, Transition::Review, None, false).await
    }

    async fn approve(
        &self,
        id: &DocumentId,
        comment: &str,
        whole_program: bool,
    ) -> Result<ServerFields, GatewayError> {
        self.workflow(id, Transition::Approve, Some(comment), whole_program)
            .await
    }

    async fn inquire(&self, id: &DocumentId, comment: &str) -> Result<ServerFields, GatewayError> {
        self.workflow(id, Transition::Inquire, Some(comment), false)
            .await
    }

    async fn reject(&self, id: &DocumentId, comment: &str) -> Result<ServerFields, GatewayError> {
        self.workflow(id, Transition::Reject, Some(comment), false)
            .await
    }

    async fn reopen(&self, id: &DocumentId) -> Result<ServerFields, GatewayError> {
        self.workflow(id, Transition::Reopen, None, false).await
    }
}
