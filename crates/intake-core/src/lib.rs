//! Intake Core
//!
//! The document workflow and section-completion state machine of a
//! Submission Request editing session:
//! - [`DocumentStore`]: owns the active document and its lifecycle, saves
//!   sections and drives the review workflow
//! - [`SectionCompletionEvaluator`]: validity signal to section status
//! - [`DirtyDetector`]: structural comparison of committed and on-screen state
//! - [`NavigationGuard`]: suspends navigation away from unsaved changes
//!
//! Remote storage, section rendering and routing are collaborators behind
//! [`RemoteGateway`], [`SectionRenderer`] and [`NavigationController`].
//!
//! # Example
//!
//! ```rust
//! use intake_core::{DocumentStore, InMemoryGateway, SectionSnapshot};
//! use intake_model::{Payload, SectionId, SectionStatus};
//! use std::sync::Arc;
//!
//! # tokio_test_block(async {
//! let store = DocumentStore::with_defaults(Arc::new(InMemoryGateway::default()));
//! store.load("new", None).await?;
//!
//! let id = store.save(&SectionSnapshot::new("A", Payload::new(), true)).await?;
//! assert!(id.is_persisted());
//!
//! let doc = store.committed().expect("loaded");
//! assert_eq!(doc.sections().get(&SectionId::from("A")), SectionStatus::Completed);
//! # Ok::<(), intake_core::IntakeError>(())
//! # });
//! # fn tokio_test_block<F: std::future::Future<Output = Result<(), intake_core::IntakeError>>>(f: F) {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f).unwrap();
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod completion;
pub mod config;
pub mod dirty;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod memory;
pub mod navigation;
pub mod renderer;
pub mod store;
pub mod workflow;

pub use completion::SectionCompletionEvaluator;
pub use config::{IntakeConfig, PrefillConfig};
pub use dirty::{DirtyDetector, DirtyField};
pub use error::{
    ConfigError, DomainError, DomainErrorCode, GatewayError, IntakeError, LoadError, SaveError,
    ValidationError, WorkflowError,
};
pub use gateway::RemoteGateway;
pub use lifecycle::LifecycleStatus;
pub use memory::{GatewayCall, InMemoryGateway};
pub use navigation::{
    GuardState, NavigationController, NavigationDecision, NavigationGuard, NavigationTarget,
    UnloadPrompt,
};
pub use renderer::{SectionRenderer, SectionSnapshot};
pub use store::{DocumentStore, SaveOutcome};
pub use workflow::WorkflowRequest;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
