//! The Submission Request document
//!
//! Server-assigned fields (identifier, status, timestamps, history) are only
//! changed through [`Document::absorb`], which enforces the identity and
//! append-only history rules.

use crate::error::ModelError;
use crate::id::{DocumentId, SectionId};
use crate::payload::{self, Payload};
use crate::section::{SectionRegistry, Sections};
use crate::status::{ApplicationStatus, SectionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the server-owned workflow history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    /// Status entered
    pub status: ApplicationStatus,
    /// Reviewer comment, if the transition carried one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_comment: Option<String>,
    /// When the transition happened
    pub date_time: DateTime<Utc>,
    /// Who performed it
    #[serde(rename = "userID")]
    pub user_id: String,
}

impl HistoryEvent {
    /// Create history event
    #[inline]
    #[must_use]
    pub fn new(status: ApplicationStatus, user_id: impl Into<String>, date_time: DateTime<Utc>) -> Self {
        Self {
            status,
            review_comment: None,
            date_time,
            user_id: user_id.into(),
        }
    }

    /// With reviewer comment
    #[inline]
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.review_comment = Some(comment.into());
        self
    }
}

/// Server-authoritative subset returned by save and workflow calls
///
/// `None` means "not part of this response"; the local value is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFields {
    /// Identifier (always present on a successful save)
    #[serde(rename = "_id", default)]
    pub id: Option<DocumentId>,
    /// Workflow status
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    /// Full history as the server knows it
    #[serde(default)]
    pub history: Option<Vec<HistoryEvent>>,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Submission timestamp
    #[serde(default)]
    pub submitted_date: Option<DateTime<Utc>>,
    /// Whether the approval covers the whole program
    #[serde(default)]
    pub program_level_approval: Option<bool>,
}

/// What [`Document::absorb`] did with a server response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbsorbOutcome {
    /// The unsaved sentinel was replaced by a server identifier
    pub assigned_id: bool,
    /// The server's history was shorter than ours and was not applied
    pub history_ignored: bool,
}

/// A Submission Request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(rename = "_id")]
    id: DocumentId,
    #[serde(default)]
    status: ApplicationStatus,
    #[serde(default)]
    sections: Sections,
    #[serde(default)]
    history: Vec<HistoryEvent>,
    #[serde(default)]
    payload: Payload,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    submitted_date: Option<DateTime<Utc>>,
    #[serde(default)]
    program_level_approval: bool,
}

impl Document {
    /// Brand-new, unsaved document with default payload
    #[must_use]
    pub fn new_default(initial_payload: Payload) -> Self {
        Self {
            id: DocumentId::unsaved(),
            status: ApplicationStatus::New,
            sections: Sections::new(),
            history: Vec::new(),
            payload: initial_payload,
            created_at: None,
            updated_at: None,
            submitted_date: None,
            program_level_approval: false,
        }
    }

    /// With identifier
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<DocumentId>) -> Self {
        self.id = id.into();
        self
    }

    /// With workflow status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: ApplicationStatus) -> Self {
        self.status = status;
        self
    }

    /// With section statuses
    #[inline]
    #[must_use]
    pub fn with_sections(mut self, sections: Sections) -> Self {
        self.sections = sections;
        self
    }

    /// With history
    #[inline]
    #[must_use]
    pub fn with_history(mut self, history: Vec<HistoryEvent>) -> Self {
        self.history = history;
        self
    }

    /// With payload
    #[inline]
    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Document identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Workflow status
    #[inline]
    #[must_use]
    pub fn status(&self) -> ApplicationStatus {
        self.status
    }

    /// Stored section statuses (Review is never stored)
    #[inline]
    #[must_use]
    pub fn sections(&self) -> &Sections {
        &self.sections
    }

    /// Mutable section statuses
    #[inline]
    pub fn sections_mut(&mut self) -> &mut Sections {
        &mut self.sections
    }

    /// Workflow history, oldest first
    #[inline]
    #[must_use]
    pub fn history(&self) -> &[HistoryEvent] {
        &self.history
    }

    /// Free-form section content
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Creation timestamp
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Last update timestamp
    #[inline]
    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Submission timestamp
    #[inline]
    #[must_use]
    pub fn submitted_date(&self) -> Option<DateTime<Utc>> {
        self.submitted_date
    }

    /// Whether the approval covers the whole program
    #[inline]
    #[must_use]
    pub fn program_level_approval(&self) -> bool {
        self.program_level_approval
    }

    /// Overlay extracted section content, one top-level key at a time
    pub fn merge_payload(&mut self, extracted: Payload) {
        payload::merge_shallow(&mut self.payload, extracted);
    }

    /// Fill keys missing from the payload from `defaults`
    pub fn fill_defaults(&mut self, defaults: &Payload) {
        let mut merged = defaults.clone();
        payload::merge_deep_payload(&mut merged, &self.payload);
        self.payload = merged;
    }

    /// Overlay one payload subsection from a prior submission
    ///
    /// Prior values win over the current ones, member by member. Returns
    /// `false` if the prior document has no object under `key`.
    pub fn prefill_from(&mut self, prior: &Document, key: &str) -> bool {
        let Some(serde_json::Value::Object(source)) = prior.payload.get(key) else {
            return false;
        };

        let target = self
            .payload
            .entry(key.to_string())
            .or_insert_with(|| serde_json::Value::Object(Payload::new()));

        match target {
            serde_json::Value::Object(map) => {
                for (member, value) in source {
                    map.insert(member.clone(), value.clone());
                }
            }
            other => *other = serde_json::Value::Object(source.clone()),
        }
        true
    }

    /// Status of any section, deriving the Review pseudo-section
    #[must_use]
    pub fn section_status(&self, id: &SectionId, registry: &SectionRegistry) -> SectionStatus {
        if registry.is_review(id) {
            self.review_status(registry)
        } else {
            self.sections.get(id)
        }
    }

    /// Derived Review status: `Completed` iff every editable section is
    #[must_use]
    pub fn review_status(&self, registry: &SectionRegistry) -> SectionStatus {
        if self.all_sections_completed(registry) {
            SectionStatus::Completed
        } else if registry.editable_ids().any(|id| self.sections.get(id).is_visited()) {
            SectionStatus::InProgress
        } else {
            SectionStatus::NotStarted
        }
    }

    /// Check if every editable section is `Completed`
    #[must_use]
    pub fn all_sections_completed(&self, registry: &SectionRegistry) -> bool {
        registry
            .editable_ids()
            .all(|id| self.sections.get(id).is_completed())
    }

    /// Editable sections that are not `Completed`, in display order
    #[must_use]
    pub fn pending_sections(&self, registry: &SectionRegistry) -> Vec<SectionId> {
        registry
            .editable_ids()
            .filter(|id| !self.sections.get(id).is_completed())
            .cloned()
            .collect()
    }

    /// Whether the Review pseudo-section may be opened
    #[must_use]
    pub fn can_open_review(&self, registry: &SectionRegistry) -> bool {
        self.status.is_past_editing() || self.all_sections_completed(registry)
    }

    /// Merge the server-authoritative subset of a response
    ///
    /// # Errors
    /// - `ModelError::UnusableIdentifier` if the response id is the sentinel or blank
    /// - `ModelError::IdentityChanged` if a persisted document receives another id
    pub fn absorb(&mut self, fields: ServerFields) -> Result<AbsorbOutcome, ModelError> {
        let mut outcome = AbsorbOutcome::default();

        if let Some(id) = fields.id {
            if !id.is_persisted() {
                return Err(ModelError::UnusableIdentifier(id));
            }
            if self.id.is_persisted() && self.id != id {
                return Err(ModelError::IdentityChanged {
                    current: self.id.clone(),
                    received: id,
                });
            }
            outcome.assigned_id = !self.id.is_persisted();
            self.id = id;
        }

        if let Some(status) = fields.status {
            self.status = status;
        }

        if let Some(history) = fields.history {
            if history.len() >= self.history.len() {
                self.history = history;
            } else {
                outcome.history_ignored = true;
            }
        }

        if fields.created_at.is_some() {
            self.created_at = fields.created_at;
        }
        if fields.updated_at.is_some() {
            self.updated_at = fields.updated_at;
        }
        if fields.submitted_date.is_some() {
            self.submitted_date = fields.submitted_date;
        }
        if let Some(flag) = fields.program_level_approval {
            self.program_level_approval = flag;
        }

        Ok(outcome)
    }
}
