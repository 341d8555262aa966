//! Navigation guard
//!
//! Suspends in-app navigation away from a section with unsaved changes until
//! the user picks Save, Discard or Cancel. The guard only decides; the
//! router behind [`NavigationController`] performs the navigation.
//!
//! Closing the tab or window is weaker: it cannot be suspended, only warned
//! about through [`NavigationGuard::before_unload`].

use crate::error::IntakeError;
use crate::renderer::SectionRenderer;
use crate::store::DocumentStore;
use intake_model::SectionId;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Default text of the close-tab warning
pub const DEFAULT_UNLOAD_MESSAGE: &str =
    "You have unsaved changes. Your changes will be lost if you leave this page.";

/// Where a navigation attempt leads
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NavigationTarget {
    /// Another section of the same document
    Section(SectionId),
    /// Any other in-app route
    Route(String),
}

impl fmt::Display for NavigationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationTarget::Section(id) => write!(f, "section {id}"),
            NavigationTarget::Route(path) => write!(f, "route {path}"),
        }
    }
}

/// Router capability: resume or abort a suspended navigation
pub trait NavigationController: Send + Sync {
    /// Perform the suspended navigation
    fn resume(&self, target: &NavigationTarget);

    /// Drop the suspended navigation
    fn abort(&self, target: &NavigationTarget);
}

/// Guard state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GuardState {
    /// No navigation suspended
    #[default]
    Idle,
    /// A navigation is waiting for the user's decision
    Blocked {
        /// Suspended destination
        target: NavigationTarget,
    },
}

/// Answer to a navigation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    /// Nothing unsaved; the router may navigate
    Proceed,
    /// Suspended until Save, Discard or Cancel
    Blocked,
}

/// Answer to a tab/window close attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnloadPrompt {
    /// Nothing unsaved
    Allow,
    /// Ask the browser to show a confirmation with this text
    Warn(String),
}

/// Intercepts navigation away from unsaved changes
pub struct NavigationGuard {
    store: Arc<DocumentStore>,
    controller: Arc<dyn NavigationController>,
    state: Mutex<GuardState>,
    unload_message: String,
}

impl fmt::Debug for NavigationGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationGuard")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl NavigationGuard {
    /// Create guard in `Idle`
    #[must_use]
    pub fn new(store: Arc<DocumentStore>, controller: Arc<dyn NavigationController>) -> Self {
        Self {
            store,
            controller,
            state: Mutex::new(GuardState::Idle),
            unload_message: DEFAULT_UNLOAD_MESSAGE.to_string(),
        }
    }

    /// With close-tab warning text
    #[inline]
    #[must_use]
    pub fn with_unload_message(mut self, message: impl Into<String>) -> Self {
        self.unload_message = message.into();
        self
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> GuardState {
        self.state.lock().clone()
    }

    /// Check if a navigation is suspended
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(*self.state.lock(), GuardState::Blocked { .. })
    }

    /// Suspended destination, if any
    #[must_use]
    pub fn pending_target(&self) -> Option<NavigationTarget> {
        match &*self.state.lock() {
            GuardState::Blocked { target } => Some(target.clone()),
            GuardState::Idle => None,
        }
    }

    /// Decide an in-app navigation attempt
    ///
    /// While already blocked, further attempts are refused and the first
    /// destination is kept.
    pub fn intercept(
        &self,
        target: NavigationTarget,
        renderer: &dyn SectionRenderer,
    ) -> NavigationDecision {
        if let Some(pending) = self.pending_target() {
            tracing::debug!("Ignoring navigation to {}; {} is pending", target, pending);
            return NavigationDecision::Blocked;
        }

        let snapshot = renderer.extract();
        if !self.store.has_unsaved_changes(snapshot.as_ref()) {
            return NavigationDecision::Proceed;
        }

        let mut state = self.state.lock();
        if let GuardState::Blocked { .. } = &*state {
            return NavigationDecision::Blocked;
        }
        tracing::info!("Unsaved changes; navigation to {} blocked", target);
        *state = GuardState::Blocked { target };
        NavigationDecision::Blocked
    }

    /// Save the mounted section, then resume
    ///
    /// On failure the guard stays blocked and the error is returned.
    ///
    /// # Errors
    /// Whatever [`DocumentStore::save_if_changed`] returns
    pub async fn save(&self, renderer: &dyn SectionRenderer) -> Result<(), IntakeError> {
        let Some(target) = self.pending_target() else {
            return Ok(());
        };

        if let Some(snapshot) = renderer.extract() {
            if let Err(err) = self.store.save_if_changed(&snapshot).await {
                tracing::warn!("Save before navigating to {} failed: {}", target, err);
                return Err(err);
            }
        }

        self.release(&target, true);
        Ok(())
    }

    /// Drop unsaved changes, then resume
    ///
    /// # Errors
    /// `IntakeError::Busy` / `Closed` if the store refuses to revert
    pub fn discard(&self) -> Result<(), IntakeError> {
        let Some(target) = self.pending_target() else {
            return Ok(());
        };

        match self.store.revert() {
            Ok(()) | Err(IntakeError::NotLoaded) => {}
            Err(err) => return Err(err),
        }

        tracing::info!("Changes discarded; resuming navigation to {}", target);
        self.release(&target, true);
        Ok(())
    }

    /// Abandon the suspended navigation
    pub fn cancel(&self) {
        if let Some(target) = self.pending_target() {
            tracing::info!("Navigation to {} cancelled", target);
            self.release(&target, false);
        }
    }

    /// Decide a tab/window close attempt
    #[must_use]
    pub fn before_unload(&self, renderer: &dyn SectionRenderer) -> UnloadPrompt {
        if self.store.has_unsaved_changes(renderer.extract().as_ref()) {
            UnloadPrompt::Warn(self.unload_message.clone())
        } else {
            UnloadPrompt::Allow
        }
    }

    fn release(&self, target: &NavigationTarget, resume: bool) {
        {
            let mut state = self.state.lock();
            match &*state {
                GuardState::Blocked { target: pending } if pending == target => {
                    *state = GuardState::Idle;
                }
                // resolved elsewhere while a save was in flight
                _ => return,
            }
        }

        if resume {
            self.controller.resume(target);
        } else {
            self.controller.abort(target);
        }
    }
}
