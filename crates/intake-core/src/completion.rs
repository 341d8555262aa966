//! Section completion evaluation
//!
//! Aggregates the renderer's validity signal into a tri-state status. Field
//! level validation is the renderer's concern; only the boolean arrives here.

use intake_model::{Document, SectionId, SectionStatus};

/// Decides a section's completion status
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionCompletionEvaluator;

impl SectionCompletionEvaluator {
    /// `Completed` if valid, else `In Progress` if visited, else `Not Started`
    #[inline]
    #[must_use]
    pub fn evaluate(valid: bool, visited: bool) -> SectionStatus {
        if valid {
            SectionStatus::Completed
        } else if visited {
            SectionStatus::InProgress
        } else {
            SectionStatus::NotStarted
        }
    }

    /// Evaluate `section` of `document`
    ///
    /// A section counts as visited if `visiting` is set or the stored status
    /// shows an earlier visit.
    #[must_use]
    pub fn evaluate_section(
        document: &Document,
        section: &SectionId,
        valid: bool,
        visiting: bool,
    ) -> SectionStatus {
        let visited = visiting || document.sections().get(section).is_visited();
        Self::evaluate(valid, visited)
    }
}
