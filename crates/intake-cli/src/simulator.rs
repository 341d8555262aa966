//! Session simulator
//!
//! Drives a `DocumentStore` over an `InMemoryGateway` with a seeded mix of
//! section saves, workflow calls, reverts and injected gateway failures.
//! Every outcome is compared with what the client-side preconditions predict,
//! and the workflow invariants are checked after every step.

use intake_core::workflow::check_request;
use intake_core::{
    DirtyDetector, DocumentStore, DomainError, GatewayCall, GatewayError, InMemoryGateway,
    IntakeConfig, IntakeError, LifecycleStatus, SectionCompletionEvaluator, SectionSnapshot,
    WorkflowRequest,
};
use intake_model::payload::structurally_equal;
use intake_model::{
    available_transitions, validate_transition, ApplicationStatus, Document, Payload,
    SectionRegistry, Transition,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;

const WORDS: [&str; 4] = ["alpha", "beta", "gamma", "delta"];

/// Simulator configuration
#[derive(Debug, Clone)]
pub(crate) struct SimulatorConfig {
    /// Random seed for reproducibility
    pub(crate) seed: u64,
    /// Total operations to execute
    pub(crate) total_operations: u64,
    /// Stop at the first violation
    pub(crate) stop_on_first_violation: bool,
    pub(crate) distribution: OperationDistribution,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            total_operations: 2_000,
            stop_on_first_violation: true,
            distribution: OperationDistribution::default(),
        }
    }
}

/// Share of each operation family; the remainder are invalid requests
#[derive(Debug, Clone)]
pub(crate) struct OperationDistribution {
    pub(crate) edits: f64,
    pub(crate) workflow: f64,
    pub(crate) failures: f64,
}

impl Default for OperationDistribution {
    fn default() -> Self {
        Self {
            edits: 0.50,
            workflow: 0.30,
            failures: 0.10,
        }
    }
}

/// Operations the simulator can generate
#[derive(Debug, Clone)]
pub(crate) enum SimulatedOperation {
    Save(SectionSnapshot),
    SaveIfChanged(SectionSnapshot),
    Revert,
    Workflow(WorkflowRequest),
    InjectFailure(GatewayCall, GatewayError),
    /// Start the next document once the current one is approved
    StartNew,
}

impl SimulatedOperation {
    fn kind(&self) -> String {
        match self {
            SimulatedOperation::Save(_) => "save".to_string(),
            SimulatedOperation::SaveIfChanged(_) => "save_if_changed".to_string(),
            SimulatedOperation::Revert => "revert".to_string(),
            SimulatedOperation::Workflow(request) => request.transition.to_string(),
            SimulatedOperation::InjectFailure(call, _) => format!("fail {call}"),
            SimulatedOperation::StartNew => "start_new".to_string(),
        }
    }
}

/// Outcome predicted from the client-side preconditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExpectedResult {
    ShouldSucceed,
    ShouldFail,
}

#[derive(Debug, Clone, Copy)]
struct Expectation {
    result: ExpectedResult,
    reaches_gateway: bool,
}

/// Invariants checked after every step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InvariantCheck {
    IdentifierIsStable,
    VisitedSectionsStayVisited,
    ReviewMatchesSections,
    HistoryIsAppendOnly,
    StatusChangeIsLegal,
    FailureLeavesDocumentUnchanged,
    LocalRejectionSkipsGateway,
    LifecycleSettles,
    PrefillCarriesContact,
}

#[derive(Debug, Clone)]
pub(crate) struct InvariantViolation {
    pub(crate) check: InvariantCheck,
    pub(crate) details: String,
}

#[derive(Debug, Clone)]
pub(crate) enum Violation {
    /// Outcome did not match the prediction
    UnexpectedOutcome {
        operation_index: u64,
        operation: String,
        expected: ExpectedResult,
        actual: Result<(), String>,
    },
    Invariant {
        operation_index: u64,
        violation: InvariantViolation,
    },
    Setup(String),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::UnexpectedOutcome {
                operation_index,
                operation,
                expected,
                actual,
            } => write!(
                f,
                "#{operation_index} {operation}: expected {expected:?}, got {actual:?}"
            ),
            Violation::Invariant {
                operation_index,
                violation,
            } => write!(
                f,
                "#{operation_index} {:?}: {}",
                violation.check, violation.details
            ),
            Violation::Setup(message) => write!(f, "setup failed: {message}"),
        }
    }
}

/// Statistics collected during simulation
#[derive(Debug, Clone, Default)]
pub(crate) struct OperationStats {
    pub(crate) total_operations: u64,
    pub(crate) successful_operations: u64,
    pub(crate) failed_operations: u64,
    pub(crate) operations_by_type: BTreeMap<String, u64>,
}

impl OperationStats {
    fn record(&mut self, operation: &SimulatedOperation, result: &Result<(), IntakeError>) {
        self.total_operations += 1;
        *self.operations_by_type.entry(operation.kind()).or_insert(0) += 1;
        match result {
            Ok(()) => self.successful_operations += 1,
            Err(_) => self.failed_operations += 1,
        }
    }
}

/// Final report
#[derive(Debug, Clone)]
pub(crate) struct SimulatorReport {
    pub(crate) config: SimulatorConfig,
    pub(crate) stats: OperationStats,
    pub(crate) violations: Vec<Violation>,
    pub(crate) documents_approved: usize,
    pub(crate) final_status: Option<ApplicationStatus>,
}

impl SimulatorReport {
    /// Check if the simulation passed
    pub(crate) fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate a text report
    pub(crate) fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Intake Simulator Report ===\n\n");
        let _ = writeln!(report, "Seed: {}", self.config.seed);
        let _ = writeln!(report, "Total Operations: {}", self.stats.total_operations);
        let _ = writeln!(report, "Successful: {}", self.stats.successful_operations);
        let _ = writeln!(report, "Failed: {}", self.stats.failed_operations);
        let _ = writeln!(report, "Violations: {}", self.violations.len());
        let _ = writeln!(report, "Documents Approved: {}", self.documents_approved);
        if let Some(status) = self.final_status {
            let _ = writeln!(report, "Final Status: {status}");
        }

        report.push_str("\n=== Operations ===\n");
        for (kind, count) in &self.stats.operations_by_type {
            let _ = writeln!(report, "{kind}: {count}");
        }

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                let _ = writeln!(report, "{}. {}", i + 1, v);
            }
        }

        let _ = write!(
            report,
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        );
        report
    }
}

/// Run the simulator
pub(crate) async fn run_simulator(config: SimulatorConfig) -> SimulatorReport {
    let intake_config = IntakeConfig::default();
    let registry = intake_config.sections.clone();
    let comment_max_len = intake_config.comment_max_len;
    let gateway = Arc::new(InMemoryGateway::default());
    let store = DocumentStore::new(gateway.clone(), intake_config);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut stats = OperationStats::default();
    let mut violations = Vec::new();
    let mut armed: Option<GatewayCall> = None;
    let mut generation = 0_usize;
    let mut documents_approved = 0_usize;

    if let Err(e) = store.load("new", None).await {
        violations.push(Violation::Setup(e.to_string()));
    }

    for i in 0..config.total_operations {
        let Some(before) = store.committed() else {
            break;
        };

        let operation = if before.status().is_terminal() {
            SimulatedOperation::StartNew
        } else {
            generate_operation(&mut rng, &config.distribution, &before, armed, generation)
        };

        let expectation = classify_expected_result(
            &before,
            &registry,
            comment_max_len,
            &operation,
            &store,
            &mut armed,
        );
        let calls_before = gateway.calls().len();

        let actual = execute_operation(&store, &gateway, &operation, &before).await;
        if matches!(operation, SimulatedOperation::StartNew) && actual.is_ok() {
            generation += 1;
            documents_approved += 1;
        }

        let outcome_matches = matches!(
            (expectation.result, &actual),
            (ExpectedResult::ShouldSucceed, Ok(())) | (ExpectedResult::ShouldFail, Err(_))
        );
        if !outcome_matches {
            tracing::warn!("Operation {} ({}) gave an unexpected outcome", i, operation.kind());
            violations.push(Violation::UnexpectedOutcome {
                operation_index: i,
                operation: format!("{operation:?}"),
                expected: expectation.result,
                actual: actual.clone().map_err(|e| e.to_string()),
            });
        }

        let step = Step {
            operation: &operation,
            expectation,
            before: &before,
            after: store.committed(),
            lifecycle: store.lifecycle(),
            busy: store.is_busy(),
            result: &actual,
            gateway_calls: gateway.calls().len() - calls_before,
            registry: &registry,
        };
        for violation in SessionInvariants::check_all(&step) {
            violations.push(Violation::Invariant {
                operation_index: i,
                violation,
            });
        }

        stats.record(&operation, &actual);

        if config.stop_on_first_violation && !violations.is_empty() {
            break;
        }
    }

    SimulatorReport {
        config,
        stats,
        violations,
        documents_approved,
        final_status: store.committed().map(|doc| doc.status()),
    }
}

async fn execute_operation(
    store: &DocumentStore,
    gateway: &InMemoryGateway,
    operation: &SimulatedOperation,
    before: &Document,
) -> Result<(), IntakeError> {
    match operation {
        SimulatedOperation::Save(snapshot) => store.save(snapshot).await.map(|_| ()),
        SimulatedOperation::SaveIfChanged(snapshot) => {
            store.save_if_changed(snapshot).await.map(|_| ())
        }
        SimulatedOperation::Revert => store.revert(),
        SimulatedOperation::Workflow(request) => {
            store.transition(request.clone()).await.map(|_| ())
        }
        SimulatedOperation::InjectFailure(call, error) => {
            gateway.fail_next(*call, error.clone());
            Ok(())
        }
        SimulatedOperation::StartNew => store.load("new", Some(before)).await.map(|_| ()),
    }
}

/// Predict an operation's outcome from the committed document
fn classify_expected_result(
    committed: &Document,
    registry: &SectionRegistry,
    comment_max_len: usize,
    operation: &SimulatedOperation,
    store: &DocumentStore,
    armed: &mut Option<GatewayCall>,
) -> Expectation {
    match operation {
        SimulatedOperation::Save(snapshot) => {
            if registry.is_editable(&snapshot.section) && committed.status().is_editable() {
                remote(armed, GatewayCall::Save)
            } else {
                local(ExpectedResult::ShouldFail)
            }
        }
        SimulatedOperation::SaveIfChanged(snapshot) => {
            if !registry.is_editable(&snapshot.section) || !committed.status().is_editable() {
                return local(ExpectedResult::ShouldFail);
            }
            let changed = store.candidate(snapshot).map_or(true, |mut candidate| {
                let status = SectionCompletionEvaluator::evaluate_section(
                    &candidate,
                    &snapshot.section,
                    snapshot.valid,
                    true,
                );
                candidate.sections_mut().record(snapshot.section.clone(), status);
                DirtyDetector::is_dirty(committed, &candidate)
            });
            if changed {
                remote(armed, GatewayCall::Save)
            } else {
                local(ExpectedResult::ShouldSucceed)
            }
        }
        SimulatedOperation::Workflow(request) => {
            match check_request(committed, registry, request, comment_max_len) {
                Ok(_) => remote(armed, GatewayCall::Workflow(request.transition)),
                Err(_) => local(ExpectedResult::ShouldFail),
            }
        }
        SimulatedOperation::Revert | SimulatedOperation::InjectFailure(..) => {
            if let SimulatedOperation::InjectFailure(call, _) = operation {
                *armed = Some(*call);
            }
            local(ExpectedResult::ShouldSucceed)
        }
        SimulatedOperation::StartNew => Expectation {
            result: ExpectedResult::ShouldSucceed,
            reaches_gateway: true,
        },
    }
}

fn local(result: ExpectedResult) -> Expectation {
    Expectation {
        result,
        reaches_gateway: false,
    }
}

/// A call that reaches the gateway fails if a failure is armed for it
fn remote(armed: &mut Option<GatewayCall>, call: GatewayCall) -> Expectation {
    let result = if *armed == Some(call) {
        *armed = None;
        ExpectedResult::ShouldFail
    } else {
        ExpectedResult::ShouldSucceed
    };
    Expectation {
        result,
        reaches_gateway: true,
    }
}

fn generate_operation(
    rng: &mut StdRng,
    distribution: &OperationDistribution,
    committed: &Document,
    armed: Option<GatewayCall>,
    generation: usize,
) -> SimulatedOperation {
    let r: f64 = rng.gen();

    if r < distribution.edits {
        generate_edit(rng, generation)
    } else if r < distribution.edits + distribution.workflow {
        generate_workflow(rng, committed)
    } else if r < distribution.edits + distribution.workflow + distribution.failures
        && armed.is_none()
    {
        generate_failure(rng, committed)
    } else {
        generate_invalid(rng, committed, generation)
    }
}

fn generate_edit(rng: &mut StdRng, generation: usize) -> SimulatedOperation {
    let section = ["A", "B", "C", "D"][rng.gen_range(0..4)];
    let snapshot = SectionSnapshot::new(
        section,
        section_payload(rng, section, generation),
        rng.gen_bool(0.7),
    );

    match rng.gen_range(0..10) {
        0 => SimulatedOperation::Revert,
        1 | 2 => SimulatedOperation::SaveIfChanged(snapshot),
        _ => SimulatedOperation::Save(snapshot),
    }
}

fn section_payload(rng: &mut StdRng, section: &str, generation: usize) -> Payload {
    let word = WORDS[rng.gen_range(0..WORDS.len())];
    let value = match section {
        "A" => json!({ "pi": { "firstName": word, "lastName": "Sim" } }),
        // one abbreviation per document so saves never collide across documents
        "B" => json!({ "study": { "name": word, "abbreviation": format!("SIM{generation}") } }),
        "C" => json!({ "cancerTypes": [word] }),
        _ => json!({ "dataTypes": [word] }),
    };
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

fn generate_workflow(rng: &mut StdRng, committed: &Document) -> SimulatedOperation {
    let legal = available_transitions(committed.status());
    let transition = if !legal.is_empty() && rng.gen_bool(0.8) {
        legal[rng.gen_range(0..legal.len())]
    } else {
        Transition::ALL[rng.gen_range(0..Transition::ALL.len())]
    };

    let comment = if rng.gen_bool(0.9) {
        format!("Reviewer note {}", rng.gen_range(0..100))
    } else {
        String::new()
    };
    SimulatedOperation::Workflow(request_for(transition, comment, rng.gen_bool(0.5)))
}

fn generate_failure(rng: &mut StdRng, committed: &Document) -> SimulatedOperation {
    let call = match available_transitions(committed.status()).first() {
        Some(transition) if rng.gen_bool(0.5) => GatewayCall::Workflow(*transition),
        _ => GatewayCall::Save,
    };

    let error = match rng.gen_range(0..10) {
        0..=5 => GatewayError::Transport("simulated outage".to_string()),
        6 | 7 if call == GatewayCall::Save => {
            DomainError::duplicate_study("simulated duplicate study").into()
        }
        _ => DomainError::other("SIMULATED", "simulated rejection").into(),
    };
    SimulatedOperation::InjectFailure(call, error)
}

fn generate_invalid(rng: &mut StdRng, committed: &Document, generation: usize) -> SimulatedOperation {
    match rng.gen_range(0..4) {
        0 => SimulatedOperation::Save(SectionSnapshot::new(
            "REVIEW",
            section_payload(rng, "A", generation),
            true,
        )),
        1 => SimulatedOperation::Save(SectionSnapshot::new("Z", Payload::new(), true)),
        2 => {
            let legal = available_transitions(committed.status());
            let illegal: Vec<Transition> = Transition::ALL
                .into_iter()
                .filter(|t| !legal.contains(t))
                .collect();
            let transition = illegal
                .get(rng.gen_range(0..illegal.len().max(1)))
                .copied()
                .unwrap_or(Transition::Reopen);
            SimulatedOperation::Workflow(request_for(transition, "note".to_string(), false))
        }
        _ => SimulatedOperation::Workflow(request_for(
            [Transition::Approve, Transition::Inquire, Transition::Reject][rng.gen_range(0..3)],
            "   ".to_string(),
            false,
        )),
    }
}

fn request_for(transition: Transition, comment: String, whole_program: bool) -> WorkflowRequest {
    match transition {
        Transition::Submit => WorkflowRequest::submit(),
        Transition::Review => WorkflowRequest::review(),
        Transition::Approve => WorkflowRequest::approve(comment, whole_program),
        Transition::Inquire => WorkflowRequest::inquire(comment),
        Transition::Reject => WorkflowRequest::reject(comment),
        Transition::Reopen => WorkflowRequest::reopen(),
    }
}

struct Step<'a> {
    operation: &'a SimulatedOperation,
    expectation: Expectation,
    before: &'a Document,
    after: Option<Document>,
    lifecycle: LifecycleStatus,
    busy: bool,
    result: &'a Result<(), IntakeError>,
    gateway_calls: usize,
    registry: &'a SectionRegistry,
}

/// Invariant checks over one simulator step
struct SessionInvariants;

impl SessionInvariants {
    fn check_all(step: &Step<'_>) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        let mut fail = |check, details: String| {
            violations.push(InvariantViolation { check, details });
        };

        if step.busy || step.lifecycle.blocks_mutation() {
            fail(
                InvariantCheck::LifecycleSettles,
                format!("lifecycle {} after the call returned", step.lifecycle),
            );
        }
        if step.expectation.reaches_gateway {
            let expected = if step.result.is_ok() {
                LifecycleStatus::Loaded
            } else {
                LifecycleStatus::Error
            };
            if step.lifecycle != expected {
                fail(
                    InvariantCheck::LifecycleSettles,
                    format!("lifecycle {} instead of {}", step.lifecycle, expected),
                );
            }
        } else if step.gateway_calls > 0 {
            fail(
                InvariantCheck::LocalRejectionSkipsGateway,
                format!("{} gateway calls for a local outcome", step.gateway_calls),
            );
        }

        let Some(after) = step.after.as_ref() else {
            fail(
                InvariantCheck::FailureLeavesDocumentUnchanged,
                "committed document disappeared".to_string(),
            );
            return violations;
        };

        if let SimulatedOperation::StartNew = step.operation {
            let carried = match (after.payload().get("pi"), step.before.payload().get("pi")) {
                (Some(new), Some(prior)) => structurally_equal(new, prior),
                _ => false,
            };
            if step.result.is_ok() && !carried {
                fail(
                    InvariantCheck::PrefillCarriesContact,
                    "new document did not take the prior contact".to_string(),
                );
            }
            return violations;
        }

        let before = step.before;
        if step.result.is_err() && after != before {
            fail(
                InvariantCheck::FailureLeavesDocumentUnchanged,
                format!("committed document changed by a failed {}", step.operation.kind()),
            );
        }

        if before.id().is_persisted() && after.id() != before.id() {
            fail(
                InvariantCheck::IdentifierIsStable,
                format!("id changed from {} to {}", before.id(), after.id()),
            );
        }

        for id in step.registry.editable_ids() {
            if before.sections().get(id).is_visited() && !after.sections().get(id).is_visited() {
                fail(
                    InvariantCheck::VisitedSectionsStayVisited,
                    format!("section {id} returned to not started"),
                );
            }
        }

        let review_completed = after.review_status(step.registry).is_completed();
        if review_completed != after.pending_sections(step.registry).is_empty() {
            fail(
                InvariantCheck::ReviewMatchesSections,
                format!("review completed = {review_completed}"),
            );
        }

        let kept = before.history().len();
        if after.history().len() < kept || after.history()[..kept] != before.history()[..] {
            fail(
                InvariantCheck::HistoryIsAppendOnly,
                format!("history rewritten ({} -> {})", kept, after.history().len()),
            );
        }

        if !status_change_is_legal(before.status(), after.status(), step.operation) {
            fail(
                InvariantCheck::StatusChangeIsLegal,
                format!(
                    "{} moved the document from {} to {}",
                    step.operation.kind(),
                    before.status(),
                    after.status()
                ),
            );
        }

        violations
    }
}

fn status_change_is_legal(
    from: ApplicationStatus,
    to: ApplicationStatus,
    operation: &SimulatedOperation,
) -> bool {
    if from == to {
        return true;
    }
    match operation {
        SimulatedOperation::Save(_) | SimulatedOperation::SaveIfChanged(_) => {
            from == ApplicationStatus::New && to == ApplicationStatus::InProgress
        }
        SimulatedOperation::Workflow(request) => {
            validate_transition(from, request.transition).is_ok()
                && match request.transition.target() {
                    Some(target) => target == to,
                    None => matches!(to, ApplicationStatus::InReview | ApplicationStatus::Inquired),
                }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_run_passes() {
        let report = run_simulator(SimulatorConfig {
            total_operations: 500,
            ..Default::default()
        })
        .await;
        assert!(report.passed(), "{}", report.generate_text());
        assert_eq!(report.stats.total_operations, 500);
    }

    #[tokio::test]
    async fn same_seed_same_run() {
        let config = SimulatorConfig {
            seed: 7,
            total_operations: 200,
            ..Default::default()
        };
        let first = run_simulator(config.clone()).await;
        let second = run_simulator(config).await;
        assert_eq!(first.stats.operations_by_type, second.stats.operations_by_type);
        assert_eq!(first.final_status, second.final_status);
    }

    #[test]
    fn save_only_moves_new_documents() {
        let save = SimulatedOperation::Revert;
        assert!(!status_change_is_legal(
            ApplicationStatus::InProgress,
            ApplicationStatus::Submitted,
            &save
        ));
        let inquire = SimulatedOperation::Workflow(WorkflowRequest::inquire("why"));
        assert!(status_change_is_legal(
            ApplicationStatus::InReview,
            ApplicationStatus::Inquired,
            &inquire
        ));
        assert!(!status_change_is_legal(
            ApplicationStatus::Submitted,
            ApplicationStatus::Inquired,
            &inquire
        ));
    }
}
