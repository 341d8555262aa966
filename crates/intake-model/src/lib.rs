//! Intake Model
//!
//! The data model of a Submission Request:
//! - [`Document`]: the unit of save and workflow
//! - [`Sections`]: per-section completion status, keyed by [`SectionId`]
//! - [`SectionRegistry`]: the ordered section list plus the Review pseudo-section
//! - [`Transition`]: the review workflow transition table
//! - [`payload`]: merge and normalization helpers over the free-form payload
//!
//! Nothing in this crate performs I/O; the workflow state machine lives in
//! `intake-core`.
//!
//! # Example
//!
//! ```rust
//! use intake_model::{Document, SectionRegistry, SectionStatus, Payload};
//!
//! let registry = SectionRegistry::default();
//! let mut doc = Document::new_default(Payload::new());
//!
//! for meta in registry.editable() {
//!     doc.sections_mut().record(meta.id.clone(), SectionStatus::Completed);
//! }
//!
//! assert_eq!(doc.section_status(registry.review_id(), &registry), SectionStatus::Completed);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod document;
pub mod error;
pub mod id;
pub mod payload;
pub mod section;
pub mod status;
pub mod transition;

pub use document::{AbsorbOutcome, Document, HistoryEvent, ServerFields};
pub use error::{ModelError, RegistryError, TransitionError};
pub use id::{DocumentId, SectionId};
pub use payload::Payload;
pub use section::{Section, SectionMeta, SectionRegistry, Sections};
pub use status::{ApplicationStatus, SectionStatus};
pub use transition::{available_transitions, validate_transition, Transition};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
