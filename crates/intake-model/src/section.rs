//! Sections: the registry of section identifiers and per-section status
//!
//! The registry is static configuration. Per-document status lives in
//! [`Sections`], which only moves forward: once a section is visited it never
//! returns to [`SectionStatus::NotStarted`].

use crate::error::RegistryError;
use crate::id::SectionId;
use crate::status::SectionStatus;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

/// Wire form of a single section entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Section identifier
    pub name: SectionId,
    /// Completion status
    pub status: SectionStatus,
}

/// Per-document section status map
///
/// Serialized as a list of `{ name, status }`. Keys are unique; an absent key
/// means [`SectionStatus::NotStarted`]. Equality ignores insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Section>", into = "Vec<Section>")]
pub struct Sections(IndexMap<SectionId, SectionStatus>);

impl Sections {
    /// Create an empty map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored status; absent keys are `Not Started`
    #[inline]
    #[must_use]
    pub fn get(&self, id: &SectionId) -> SectionStatus {
        self.0.get(id).copied().unwrap_or_default()
    }

    /// Record a freshly evaluated status
    ///
    /// A visited section is never set back to `Not Started`; such a request
    /// keeps the stored status. Returns the status actually stored.
    pub fn record(&mut self, id: SectionId, status: SectionStatus) -> SectionStatus {
        let current = self.get(&id);
        let effective = if current.is_visited() && !status.is_visited() {
            current
        } else {
            status
        };
        self.0.insert(id, effective);
        effective
    }

    /// Force a visited section back to `In Progress`
    ///
    /// Only the duplicate study identifier recovery path may call this. A
    /// section that was never visited is left alone; returns whether the
    /// status was changed.
    pub fn downgrade_to_in_progress(&mut self, id: &SectionId) -> bool {
        match self.0.get_mut(id) {
            Some(status) if status.is_visited() => {
                *status = SectionStatus::InProgress;
                true
            }
            _ => false,
        }
    }

    /// Iterate stored entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&SectionId, SectionStatus)> {
        self.0.iter().map(|(id, status)| (id, *status))
    }

    /// Number of stored entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if no section was recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Section>> for Sections {
    fn from(value: Vec<Section>) -> Self {
        // later duplicates win, matching how the server overwrites entries
        Self(value.into_iter().map(|s| (s.name, s.status)).collect())
    }
}

impl From<Sections> for Vec<Section> {
    fn from(value: Sections) -> Self {
        value
            .0
            .into_iter()
            .map(|(name, status)| Section { name, status })
            .collect()
    }
}

impl FromIterator<(SectionId, SectionStatus)> for Sections {
    fn from_iter<I: IntoIterator<Item = (SectionId, SectionStatus)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Static description of one section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionMeta {
    /// Identifier stored in the document
    pub id: SectionId,
    /// Human-readable title
    pub title: String,
}

impl SectionMeta {
    /// Create section metadata
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<SectionId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

#[derive(Deserialize)]
struct RawRegistry {
    sections: Vec<SectionMeta>,
    review: SectionMeta,
}

/// Ordered list of editable sections plus the terminal Review pseudo-section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionRegistry {
    sections: Vec<SectionMeta>,
    review: SectionMeta,
}

impl SectionRegistry {
    /// Build a registry, rejecting blank or duplicate identifiers
    ///
    /// # Errors
    /// - `RegistryError::Empty` if `sections` is empty
    /// - `RegistryError::BlankIdentifier` for a blank id
    /// - `RegistryError::DuplicateSection` if an id repeats (including the review id)
    pub fn new(sections: Vec<SectionMeta>, review: SectionMeta) -> Result<Self, RegistryError> {
        if sections.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = HashSet::new();
        for meta in sections.iter().chain(std::iter::once(&review)) {
            if meta.id.as_str().trim().is_empty() {
                return Err(RegistryError::BlankIdentifier);
            }
            if !seen.insert(meta.id.clone()) {
                return Err(RegistryError::DuplicateSection(meta.id.clone()));
            }
        }

        Ok(Self { sections, review })
    }

    /// Editable sections in display order
    pub fn editable(&self) -> impl Iterator<Item = &SectionMeta> {
        self.sections.iter()
    }

    /// Editable section identifiers in display order
    pub fn editable_ids(&self) -> impl Iterator<Item = &SectionId> {
        self.sections.iter().map(|s| &s.id)
    }

    /// All sections including Review, in display order
    pub fn all(&self) -> impl Iterator<Item = &SectionMeta> {
        self.sections.iter().chain(std::iter::once(&self.review))
    }

    /// The Review pseudo-section
    #[inline]
    #[must_use]
    pub fn review(&self) -> &SectionMeta {
        &self.review
    }

    /// Identifier of the Review pseudo-section
    #[inline]
    #[must_use]
    pub fn review_id(&self) -> &SectionId {
        &self.review.id
    }

    /// Check if `id` is the Review pseudo-section
    #[inline]
    #[must_use]
    pub fn is_review(&self, id: &SectionId) -> bool {
        &self.review.id == id
    }

    /// Check if `id` names an editable section
    #[inline]
    #[must_use]
    pub fn is_editable(&self, id: &SectionId) -> bool {
        self.sections.iter().any(|s| &s.id == id)
    }

    /// Check if `id` names any section, Review included
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &SectionId) -> bool {
        self.is_review(id) || self.is_editable(id)
    }

    /// Position in display order (Review is last)
    #[must_use]
    pub fn position(&self, id: &SectionId) -> Option<usize> {
        self.all().position(|s| &s.id == id)
    }

    /// Section after `id` in display order
    #[must_use]
    pub fn next(&self, id: &SectionId) -> Option<&SectionMeta> {
        let index = self.position(id)?;
        self.all().nth(index + 1)
    }

    /// Section before `id` in display order
    #[must_use]
    pub fn previous(&self, id: &SectionId) -> Option<&SectionMeta> {
        let index = self.position(id)?;
        index.checked_sub(1).and_then(|i| self.all().nth(i))
    }

    /// Resolve a requested section, falling back to the first one
    #[must_use]
    pub fn resolve_or_first(&self, requested: Option<&SectionId>) -> &SectionMeta {
        requested
            .and_then(|id| self.all().find(|s| &s.id == id))
            .unwrap_or(&self.sections[0])
    }

    /// Number of editable sections
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Always false; a registry has at least one editable section
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl<'de> Deserialize<'de> for SectionRegistry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawRegistry::deserialize(deserializer)?;
        Self::new(raw.sections, raw.review).map_err(serde::de::Error::custom)
    }
}

impl Default for SectionRegistry {
    fn default() -> Self {
        Self {
            sections: vec![
                SectionMeta::new("A", "Principal Investigator & Contact Information"),
                SectionMeta::new("B", "Program and Study Information"),
                SectionMeta::new("C", "Data Access and Disease Information"),
                SectionMeta::new("D", "Data Types"),
            ],
            review: SectionMeta::new("REVIEW", "Review & Submit"),
        }
    }
}
