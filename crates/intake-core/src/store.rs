//! Document store
//!
//! Owns the single active document of an editing session. Two copies are
//! kept: the last-committed document (what the server confirmed) and the
//! current one, which may carry a merged-but-unsaved candidate after a failed
//! save.
//!
//! # Concurrency
//! At most one mutating call (load, save, workflow transition) runs at a
//! time. A second attempt fails with [`IntakeError::Busy`]; it is never
//! queued. The session lock is never held across a remote call.

use crate::completion::SectionCompletionEvaluator;
use crate::config::IntakeConfig;
use crate::dirty::DirtyDetector;
use crate::error::{GatewayError, IntakeError, LoadError, SaveError, ValidationError};
use crate::gateway::RemoteGateway;
use crate::lifecycle::LifecycleStatus;
use crate::renderer::SectionSnapshot;
use intake_model::{Document, DocumentId, SectionId, ServerFields, Transition};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Result of [`DocumentStore::save_if_changed`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The document was sent and confirmed
    Saved(DocumentId),
    /// Nothing differed from the committed document; no call was made
    Unchanged(DocumentId),
}

impl SaveOutcome {
    /// Document identifier after the operation
    #[inline]
    #[must_use]
    pub fn id(&self) -> &DocumentId {
        match self {
            SaveOutcome::Saved(id) | SaveOutcome::Unchanged(id) => id,
        }
    }

    /// Check if a remote save happened
    #[inline]
    #[must_use]
    pub fn was_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved(_))
    }
}

#[derive(Debug, Default)]
struct Session {
    committed: Option<Document>,
    current: Option<Document>,
    lifecycle: LifecycleStatus,
    in_flight: bool,
    closed: bool,
    last_error: Option<IntakeError>,
}

/// Marks one mutating call as in flight until dropped
///
/// If the call is abandoned before it settles, the lifecycle returns to
/// where it was.
pub(crate) struct InFlight<'a> {
    session: &'a Mutex<Session>,
    previous: LifecycleStatus,
    entered: bool,
    settled: bool,
}

impl InFlight<'_> {
    /// Move the lifecycle into the call's phase
    pub(crate) fn enter(&mut self, phase: LifecycleStatus) {
        let mut session = self.session.lock();
        tracing::debug!("Lifecycle {} -> {}", session.lifecycle, phase);
        session.lifecycle = phase;
        self.entered = true;
    }

    fn finish(&mut self, session: &mut Session, lifecycle: LifecycleStatus) {
        tracing::debug!("Lifecycle {} -> {}", session.lifecycle, lifecycle);
        session.lifecycle = lifecycle;
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut session = self.session.lock();
        session.in_flight = false;
        if self.entered && !self.settled && !session.closed {
            session.lifecycle = self.previous;
        }
    }
}

/// The document store of one editing session
pub struct DocumentStore {
    config: IntakeConfig,
    gateway: Arc<dyn RemoteGateway>,
    session: Mutex<Session>,
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = self.session.lock();
        f.debug_struct("DocumentStore")
            .field("lifecycle", &session.lifecycle)
            .field("document", &session.current.as_ref().map(Document::id))
            .field("in_flight", &session.in_flight)
            .field("closed", &session.closed)
            .finish_non_exhaustive()
    }
}

impl DocumentStore {
    /// Create a store; nothing is loaded until [`Self::load`] or [`Self::open`]
    #[must_use]
    pub fn new(gateway: Arc<dyn RemoteGateway>, config: IntakeConfig) -> Self {
        Self {
            config,
            gateway,
            session: Mutex::new(Session::default()),
        }
    }

    /// Store with the default configuration
    #[must_use]
    pub fn with_defaults(gateway: Arc<dyn RemoteGateway>) -> Self {
        Self::new(gateway, IntakeConfig::default())
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    pub(crate) fn gateway(&self) -> &dyn RemoteGateway {
        self.gateway.as_ref()
    }

    /// Lifecycle phase
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleStatus {
        self.session.lock().lifecycle
    }

    /// Check if a mutating call is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.session.lock().in_flight
    }

    /// Check if the session was closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.session.lock().closed
    }

    /// Current document, including a candidate kept after a failed save
    #[must_use]
    pub fn document(&self) -> Option<Document> {
        self.session.lock().current.clone()
    }

    /// Last document the server confirmed
    #[must_use]
    pub fn committed(&self) -> Option<Document> {
        self.session.lock().committed.clone()
    }

    /// Identifier of the active document
    #[must_use]
    pub fn id(&self) -> Option<DocumentId> {
        self.session.lock().committed.as_ref().map(|d| d.id().clone())
    }

    /// Error of the last failed operation, cleared by the next success
    #[must_use]
    pub fn last_error(&self) -> Option<IntakeError> {
        self.session.lock().last_error.clone()
    }

    /// Load with the user's most recent submission as prefill source
    ///
    /// The lookup is best-effort: when it fails the document gets defaults.
    /// It runs inside the same in-flight call as the load.
    ///
    /// # Errors
    /// As [`Self::load`]
    pub async fn open(&self, id: impl Into<DocumentId>) -> Result<Document, LoadError> {
        let id = id.into();
        let mut op = self.begin()?;
        op.enter(LifecycleStatus::Loading);

        let prior = if id.is_blank() {
            None
        } else {
            match self.gateway.fetch_most_recent_of_current_user().await {
                Ok(prior) => prior,
                Err(e) => {
                    tracing::warn!("Most recent submission unavailable, using defaults: {}", e);
                    None
                }
            }
        };

        self.load_in(op, id, prior.as_ref()).await
    }

    /// Fetch a document, or build a new one for the `"new"` sentinel
    ///
    /// `prior` is the user's most recent submission; its prefill subsection
    /// is copied into new documents and into fetched ones whose prefill
    /// section was never visited.
    ///
    /// # Errors
    /// - `ValidationError::InvalidId` for a blank id (lifecycle `ERROR`)
    /// - `GatewayError` if the fetch fails or returns nothing (lifecycle `ERROR`)
    /// - `IntakeError::Busy` / `IntakeError::Closed`
    pub async fn load(
        &self,
        id: impl Into<DocumentId>,
        prior: Option<&Document>,
    ) -> Result<Document, LoadError> {
        let mut op = self.begin()?;
        op.enter(LifecycleStatus::Loading);
        self.load_in(op, id.into(), prior).await
    }

    async fn load_in(
        &self,
        mut op: InFlight<'_>,
        id: DocumentId,
        prior: Option<&Document>,
    ) -> Result<Document, LoadError> {
        if id.is_blank() {
            let err = IntakeError::from(ValidationError::InvalidId);
            tracing::warn!("Refusing to load: {}", err);
            let mut session = self.session.lock();
            op.finish(&mut session, LifecycleStatus::Error);
            session.last_error = Some(err.clone());
            return Err(err);
        }

        let loaded = if id.is_new() {
            Ok(self.new_document(prior))
        } else {
            self.fetch_existing(&id, prior).await
        };

        let mut session = self.session.lock();
        if session.closed {
            tracing::info!("Discarding load of {} after close", id);
            return Err(IntakeError::Closed);
        }

        match loaded {
            Ok(document) => {
                tracing::info!(
                    "Loaded document {} (status {})",
                    document.id(),
                    document.status()
                );
                session.committed = Some(document.clone());
                session.current = Some(document.clone());
                session.last_error = None;
                op.finish(&mut session, LifecycleStatus::Loaded);
                Ok(document)
            }
            Err(err) => {
                tracing::error!("Loading document {} failed: {}", id, err);
                session.last_error = Some(err.clone());
                op.finish(&mut session, LifecycleStatus::Error);
                Err(err)
            }
        }
    }

    fn new_document(&self, prior: Option<&Document>) -> Document {
        let mut document = Document::new_default(self.config.initial_payload.clone());
        if let Some(prior) = prior {
            if document.prefill_from(prior, &self.config.prefill.payload_key) {
                tracing::debug!("Prefilled new document from {}", prior.id());
            }
        }
        document
    }

    async fn fetch_existing(
        &self,
        id: &DocumentId,
        prior: Option<&Document>,
    ) -> Result<Document, IntakeError> {
        tracing::debug!("Fetching document {}", id);
        let mut document = self.gateway.fetch_by_id(id).await?.ok_or_else(|| {
            GatewayError::InvalidResponse(format!("document {id} has no content"))
        })?;

        document.fill_defaults(&self.config.initial_payload);

        let prefill = &self.config.prefill;
        if !document.sections().get(&prefill.section).is_visited() {
            if let Some(prior) = prior {
                if document.prefill_from(prior, &prefill.payload_key) {
                    tracing::debug!("Prefilled document {} from {}", id, prior.id());
                }
            }
        }

        Ok(document)
    }

    /// Candidate rebuilt from the on-screen values, without recomputing status
    #[must_use]
    pub fn candidate(&self, snapshot: &SectionSnapshot) -> Option<Document> {
        let session = self.session.lock();
        session
            .committed
            .as_ref()
            .map(|committed| merge_candidate(committed, snapshot))
    }

    /// Whether the mounted section holds unsaved changes
    ///
    /// No snapshot means nothing editable is mounted. A snapshot without a
    /// loaded document counts as unsaved; a document past `In Progress`
    /// never has unsaved changes since it cannot be saved.
    #[must_use]
    pub fn has_unsaved_changes(&self, snapshot: Option<&SectionSnapshot>) -> bool {
        let Some(snapshot) = snapshot else {
            return false;
        };
        if !self.config.sections.is_editable(&snapshot.section) {
            return false;
        }

        let session = self.session.lock();
        match session.committed.as_ref() {
            Some(committed) if !committed.status().is_editable() => false,
            Some(committed) => {
                DirtyDetector::is_dirty(committed, &merge_candidate(committed, snapshot))
            }
            None => true,
        }
    }

    /// Save the mounted section
    ///
    /// Recomputes the section's status from `snapshot.valid`, merges the
    /// values over the committed document and sends it. Returns the
    /// identifier, newly assigned on the first save.
    ///
    /// # Errors
    /// - `ValidationError` for the Review section, an unknown section or a
    ///   read-only document (nothing sent, lifecycle unchanged)
    /// - `GatewayError` on failure (lifecycle `ERROR`, candidate kept as current)
    /// - `IntakeError::Busy` / `NotLoaded` / `Closed`
    pub async fn save(&self, snapshot: &SectionSnapshot) -> Result<DocumentId, SaveError> {
        let op = self.begin()?;
        let candidate = self.prepare(snapshot)?;
        self.persist(op, &snapshot.section, candidate).await
    }

    /// Save only if the recomputed candidate differs from the committed document
    ///
    /// # Errors
    /// As [`Self::save`]
    pub async fn save_if_changed(&self, snapshot: &SectionSnapshot) -> Result<SaveOutcome, SaveError> {
        let mut op = self.begin()?;
        let candidate = self.prepare(snapshot)?;

        let unchanged = {
            let mut session = self.session.lock();
            match session.committed.clone() {
                Some(committed) if !DirtyDetector::is_dirty(&committed, &candidate) => {
                    session.current = Some(committed);
                    session.last_error = None;
                    op.finish(&mut session, LifecycleStatus::Loaded);
                    true
                }
                _ => false,
            }
        };

        if unchanged {
            tracing::debug!("Section {} unchanged, skipping save", snapshot.section);
            return Ok(SaveOutcome::Unchanged(candidate.id().clone()));
        }

        self.persist(op, &snapshot.section, candidate)
            .await
            .map(SaveOutcome::Saved)
    }

    /// Drop the unsaved candidate and return to the committed document
    ///
    /// # Errors
    /// `IntakeError::Busy` / `NotLoaded` / `Closed`
    pub fn revert(&self) -> Result<(), IntakeError> {
        let mut session = self.session.lock();
        if session.closed {
            return Err(IntakeError::Closed);
        }
        if session.in_flight {
            return Err(IntakeError::Busy {
                lifecycle: session.lifecycle,
            });
        }
        let committed = session.committed.clone().ok_or(IntakeError::NotLoaded)?;
        session.current = Some(committed);
        Ok(())
    }

    /// End the editing session
    ///
    /// A response still in flight is discarded when it arrives; every later
    /// call fails with [`IntakeError::Closed`].
    pub fn close(&self) {
        let mut session = self.session.lock();
        if session.closed {
            return;
        }
        session.closed = true;
        if session.in_flight {
            tracing::info!("Closing session with a {} call in flight", session.lifecycle);
        } else {
            tracing::debug!("Closing session");
        }
    }

    pub(crate) fn begin(&self) -> Result<InFlight<'_>, IntakeError> {
        let mut session = self.session.lock();
        if session.closed {
            return Err(IntakeError::Closed);
        }
        if session.in_flight {
            tracing::warn!("Rejecting call while {} is in flight", session.lifecycle);
            return Err(IntakeError::Busy {
                lifecycle: session.lifecycle,
            });
        }
        session.in_flight = true;

        Ok(InFlight {
            session: &self.session,
            previous: session.lifecycle,
            entered: false,
            settled: false,
        })
    }

    fn prepare(&self, snapshot: &SectionSnapshot) -> Result<Document, IntakeError> {
        let registry = &self.config.sections;
        if registry.is_review(&snapshot.section) {
            return Err(ValidationError::ReviewNotEditable.into());
        }
        if !registry.is_editable(&snapshot.section) {
            return Err(ValidationError::UnknownSection(snapshot.section.clone()).into());
        }

        let session = self.session.lock();
        let committed = session.committed.as_ref().ok_or(IntakeError::NotLoaded)?;
        if !committed.status().is_editable() {
            return Err(ValidationError::ReadOnly {
                status: committed.status(),
            }
            .into());
        }

        let mut candidate = merge_candidate(committed, snapshot);
        let status = SectionCompletionEvaluator::evaluate_section(
            &candidate,
            &snapshot.section,
            snapshot.valid,
            true,
        );
        candidate.sections_mut().record(snapshot.section.clone(), status);
        Ok(candidate)
    }

    async fn persist(
        &self,
        mut op: InFlight<'_>,
        section: &SectionId,
        candidate: Document,
    ) -> Result<DocumentId, SaveError> {
        self.session.lock().current = Some(candidate.clone());
        op.enter(LifecycleStatus::Saving);
        tracing::info!("Saving document {} (section {})", candidate.id(), section);

        let result = self.gateway.save_document(&candidate).await;

        let mut session = self.session.lock();
        if session.closed {
            tracing::info!("Discarding save response for {} after close", candidate.id());
            return Err(IntakeError::Closed);
        }

        match result.and_then(|fields| absorb_save(candidate, fields)) {
            Ok(saved) => {
                let id = saved.id().clone();
                tracing::info!("Saved document {}", id);
                session.committed = Some(saved.clone());
                session.current = Some(saved);
                session.last_error = None;
                op.finish(&mut session, LifecycleStatus::Loaded);
                Ok(id)
            }
            Err(err) => {
                if let GatewayError::Domain(domain) = &err {
                    if domain.is_duplicate_study() {
                        let forced = &self.config.duplicate_study_section;
                        let downgraded = session.current.as_mut().is_some_and(|current| {
                            current.sections_mut().downgrade_to_in_progress(forced)
                        });
                        if downgraded {
                            tracing::warn!(
                                "Duplicate study abbreviation; section {} forced back to {}",
                                forced,
                                intake_model::SectionStatus::InProgress
                            );
                        } else {
                            tracing::warn!(
                                "Duplicate study abbreviation; section {} not yet visited",
                                forced
                            );
                        }
                    }
                }

                let err = IntakeError::from(err);
                tracing::error!("Saving section {} failed: {}", section, err);
                session.last_error = Some(err.clone());
                op.finish(&mut session, LifecycleStatus::Error);
                Err(err)
            }
        }
    }

    /// Run a workflow call and merge its response into the committed document
    ///
    /// On failure the document is left as it was.
    pub(crate) async fn apply_server_call<F>(
        &self,
        mut op: InFlight<'_>,
        phase: LifecycleStatus,
        transition: Transition,
        base: Document,
        call: F,
    ) -> Result<DocumentId, IntakeError>
    where
        F: Future<Output = Result<ServerFields, GatewayError>>,
    {
        op.enter(phase);
        let result = call.await;

        let mut session = self.session.lock();
        if session.closed {
            tracing::info!("Discarding {} response for {} after close", transition, base.id());
            return Err(IntakeError::Closed);
        }

        let applied = result.and_then(|fields| {
            let mut next = base.clone();
            let outcome = next
                .absorb(fields.clone())
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
            if outcome.history_ignored {
                tracing::warn!("Ignoring shorter history in {} response", transition);
            }
            Ok((next, fields))
        });

        match applied {
            Ok((next, fields)) => {
                if let Some(current) = session.current.as_mut() {
                    if let Err(e) = current.absorb(fields) {
                        tracing::warn!("Current document rejected {} response: {}", transition, e);
                    }
                }
                if let Some(expected) = transition.target() {
                    if next.status() != expected {
                        tracing::warn!(
                            "Server answered {} with status {} (expected {})",
                            transition,
                            next.status(),
                            expected
                        );
                    }
                }

                let id = next.id().clone();
                tracing::info!("Document {} is now {}", id, next.status());
                session.committed = Some(next);
                session.last_error = None;
                op.finish(&mut session, LifecycleStatus::Loaded);
                Ok(id)
            }
            Err(err) => {
                let err = IntakeError::from(err);
                tracing::error!("{} of document {} failed: {}", transition, base.id(), err);
                session.last_error = Some(err.clone());
                op.finish(&mut session, LifecycleStatus::Error);
                Err(err)
            }
        }
    }
}

fn merge_candidate(committed: &Document, snapshot: &SectionSnapshot) -> Document {
    let mut candidate = committed.clone();
    candidate.merge_payload(snapshot.payload.clone());
    candidate
}

fn absorb_save(mut document: Document, fields: ServerFields) -> Result<Document, GatewayError> {
    if fields.id.is_none() {
        return Err(GatewayError::InvalidResponse(
            "save response carries no document id".to_string(),
        ));
    }

    let outcome = document
        .absorb(fields)
        .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
    if outcome.assigned_id {
        tracing::info!("Server assigned id {}", document.id());
    }
    if outcome.history_ignored {
        tracing::warn!("Ignoring shorter history in save response");
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainError;
    use crate::gateway::MockRemoteGateway;
    use intake_model::{ApplicationStatus, Payload, SectionStatus};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn object(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => Payload::new(),
        }
    }

    fn saved_fields(id: &str) -> ServerFields {
        ServerFields {
            id: Some(DocumentId::from(id)),
            status: Some(ApplicationStatus::InProgress),
            ..ServerFields::default()
        }
    }

    fn store(mock: MockRemoteGateway) -> DocumentStore {
        DocumentStore::with_defaults(Arc::new(mock))
    }

    fn snapshot_a(first_name: &str, valid: bool) -> SectionSnapshot {
        SectionSnapshot::new(
            "A",
            object(json!({ "pi": { "firstName": first_name } })),
            valid,
        )
    }

    #[tokio::test]
    async fn new_document_is_built_locally() {
        let mut mock = MockRemoteGateway::new();
        mock.expect_fetch_by_id().never();

        let store = store(mock);
        let prior = Document::new_default(object(json!({ "pi": { "firstName": "Ada" } })));
        let doc = store.load("new", Some(&prior)).await.unwrap();

        assert!(doc.id().is_new());
        assert_eq!(doc.payload()["pi"]["firstName"], json!("Ada"));
        assert_eq!(doc.payload()["pi"]["lastName"], json!(""));
        assert_eq!(store.lifecycle(), LifecycleStatus::Loaded);
    }

    #[tokio::test]
    async fn blank_id_fails_without_gateway() {
        let mut mock = MockRemoteGateway::new();
        mock.expect_fetch_by_id().never();

        let store = store(mock);
        let err = store.load("  ", None).await.unwrap_err();

        assert_eq!(err, IntakeError::Validation(ValidationError::InvalidId));
        assert_eq!(err.to_string(), "validation failed: Invalid application ID provided");
        assert_eq!(store.lifecycle(), LifecycleStatus::Error);
        assert!(!store.is_busy());
    }

    #[tokio::test]
    async fn fetched_document_gets_defaults() {
        let mut mock = MockRemoteGateway::new();
        mock.expect_fetch_by_id()
            .withf(|id| id.as_str() == "sr-1")
            .returning(|id| {
                Ok(Some(
                    Document::new_default(object(json!({ "study": { "name": "S" } })))
                        .with_id(id.clone())
                        .with_status(ApplicationStatus::InProgress),
                ))
            });

        let store = store(mock);
        let doc = store.load("sr-1", None).await.unwrap();
        assert_eq!(doc.payload()["study"]["name"], json!("S"));
        assert_eq!(doc.payload()["study"]["abbreviation"], json!(""));
        assert!(doc.payload().contains_key("pi"));
    }

    #[tokio::test]
    async fn missing_document_is_a_load_failure() {
        let mut mock = MockRemoteGateway::new();
        mock.expect_fetch_by_id().returning(|_| Ok(None));

        let store = store(mock);
        let err = store.load("sr-404", None).await.unwrap_err();
        assert!(matches!(err, IntakeError::Gateway(GatewayError::InvalidResponse(_))));
        assert_eq!(store.lifecycle(), LifecycleStatus::Error);
    }

    #[tokio::test]
    async fn open_survives_missing_prefill_source() {
        let mut mock = MockRemoteGateway::new();
        mock.expect_fetch_most_recent_of_current_user()
            .returning(|| Err(GatewayError::Transport("offline".into())));

        let store = store(mock);
        let doc = store.open("new").await.unwrap();
        assert_eq!(doc.payload()["pi"]["firstName"], json!(""));
        assert_eq!(store.lifecycle(), LifecycleStatus::Loaded);
    }

    #[tokio::test]
    async fn first_save_assigns_id() {
        let mut mock = MockRemoteGateway::new();
        mock.expect_save_document()
            .times(1)
            .withf(|doc| doc.id().is_new() && doc.sections().get(&SectionId::from("A")).is_completed())
            .returning(|_| Ok(saved_fields("sr-7")));

        let store = store(mock);
        store.load("new", None).await.unwrap();
        let id = store.save(&snapshot_a("Ada", true)).await.unwrap();

        assert_eq!(id.as_str(), "sr-7");
        let committed = store.committed().unwrap();
        assert_eq!(committed.status(), ApplicationStatus::InProgress);
        assert_eq!(committed.sections().get(&SectionId::from("A")), SectionStatus::Completed);
        assert_eq!(store.document(), Some(committed));
        assert_eq!(store.lifecycle(), LifecycleStatus::Loaded);
    }

    #[tokio::test]
    async fn failed_save_keeps_candidate() {
        let mut mock = MockRemoteGateway::new();
        mock.expect_save_document()
            .returning(|_| Err(GatewayError::Transport("timeout".into())));

        let store = store(mock);
        store.load("new", None).await.unwrap();
        let err = store.save(&snapshot_a("Ada", false)).await.unwrap_err();

        assert!(err.is_transport());
        assert_eq!(store.lifecycle(), LifecycleStatus::Error);
        assert_eq!(store.last_error(), Some(err));

        let current = store.document().unwrap();
        assert_eq!(current.payload()["pi"], json!({ "firstName": "Ada" }));
        assert_eq!(current.sections().get(&SectionId::from("A")), SectionStatus::InProgress);

        let committed = store.committed().unwrap();
        assert_eq!(committed.sections().get(&SectionId::from("A")), SectionStatus::NotStarted);
    }

    #[tokio::test]
    async fn save_response_without_id_is_invalid() {
        let mut mock = MockRemoteGateway::new();
        mock.expect_save_document()
            .returning(|_| Ok(ServerFields::default()));

        let store = store(mock);
        store.load("new", None).await.unwrap();
        let err = store.save(&snapshot_a("Ada", true)).await.unwrap_err();

        assert!(matches!(err, IntakeError::Gateway(GatewayError::InvalidResponse(_))));
        assert!(store.committed().unwrap().id().is_new());
    }

    #[tokio::test]
    async fn identity_change_is_rejected() {
        let mut mock = MockRemoteGateway::new();
        let mut calls = 0;
        mock.expect_save_document().times(2).returning(move |_| {
            calls += 1;
            Ok(saved_fields(if calls == 1 { "sr-1" } else { "sr-2" }))
        });

        let store = store(mock);
        store.load("new", None).await.unwrap();
        store.save(&snapshot_a("Ada", true)).await.unwrap();
        let err = store.save(&snapshot_a("Grace", true)).await.unwrap_err();

        assert!(matches!(err, IntakeError::Gateway(GatewayError::InvalidResponse(_))));
        assert_eq!(store.id().unwrap().as_str(), "sr-1");
    }

    #[tokio::test]
    async fn duplicate_study_forces_section_back() {
        let mut mock = MockRemoteGateway::new();
        mock.expect_save_document()
            .returning(|_| Err(DomainError::duplicate_study("abbreviation taken").into()));

        let store = store(mock);
        store.load("new", None).await.unwrap();
        let snapshot = SectionSnapshot::new(
            "B",
            object(json!({ "study": { "abbreviation": "DUP" } })),
            true,
        );
        let err = store.save(&snapshot).await.unwrap_err();

        assert_eq!(err.domain_code(), Some(&crate::error::DomainErrorCode::DuplicateStudyAbbreviation));
        let current = store.document().unwrap();
        assert_eq!(current.sections().get(&SectionId::from("B")), SectionStatus::InProgress);
        assert_eq!(current.payload()["study"]["abbreviation"], json!("DUP"));
    }

    #[tokio::test]
    async fn review_section_is_not_saved() {
        let mut mock = MockRemoteGateway::new();
        mock.expect_save_document().never();

        let store = store(mock);
        store.load("new", None).await.unwrap();
        let err = store
            .save(&SectionSnapshot::new("REVIEW", Payload::new(), true))
            .await
            .unwrap_err();

        assert_eq!(err, IntakeError::Validation(ValidationError::ReviewNotEditable));
        assert_eq!(store.lifecycle(), LifecycleStatus::Loaded);
    }

    #[tokio::test]
    async fn save_before_load_fails() {
        let mut mock = MockRemoteGateway::new();
        mock.expect_save_document().never();

        let store = store(mock);
        let err = store.save(&snapshot_a("Ada", true)).await.unwrap_err();
        assert_eq!(err, IntakeError::NotLoaded);
        assert!(!store.is_busy());
    }

    #[tokio::test]
    async fn unchanged_section_skips_gateway() {
        let mut mock = MockRemoteGateway::new();
        mock.expect_save_document()
            .times(1)
            .returning(|_| Ok(saved_fields("sr-3")));

        let store = store(mock);
        store.load("new", None).await.unwrap();
        let first = store.save_if_changed(&snapshot_a("Ada", true)).await.unwrap();
        assert!(first.was_saved());

        let second = store.save_if_changed(&snapshot_a("Ada", true)).await.unwrap();
        assert_eq!(second, SaveOutcome::Unchanged(DocumentId::from("sr-3")));
    }

    #[tokio::test]
    async fn dirty_tracking() {
        let store = store(MockRemoteGateway::new());
        assert!(!store.has_unsaved_changes(None));
        assert!(store.has_unsaved_changes(Some(&snapshot_a("Ada", true))));

        store.load("new", None).await.unwrap();
        assert!(!store.has_unsaved_changes(Some(&snapshot_a("", false))));
        assert!(store.has_unsaved_changes(Some(&snapshot_a("Ada", false))));
    }

    #[tokio::test]
    async fn closed_store_refuses_calls() {
        let mut mock = MockRemoteGateway::new();
        mock.expect_save_document().never();

        let store = store(mock);
        store.load("new", None).await.unwrap();
        store.close();

        assert_eq!(store.save(&snapshot_a("Ada", true)).await, Err(IntakeError::Closed));
        assert_eq!(store.revert(), Err(IntakeError::Closed));
        assert!(store.is_closed());
    }
}
