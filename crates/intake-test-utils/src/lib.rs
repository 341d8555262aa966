//! Testing utilities for the intake workspace
//!
//! Shared fixtures, fake collaborators and store factories.

#![allow(missing_docs)]

use intake_core::{
    DocumentStore, InMemoryGateway, IntakeConfig, NavigationController, NavigationGuard,
    NavigationTarget, SectionRenderer, SectionSnapshot,
};
use intake_model::{ApplicationStatus, Document, Payload, SectionRegistry, SectionStatus};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        other => panic!("payload fixture must be an object, got {other}"),
    }
}

pub fn pi_payload(first_name: &str, last_name: &str) -> Payload {
    payload(json!({
        "pi": {
            "firstName": first_name,
            "lastName": last_name,
            "position": "Investigator",
            "email": "pi@example.org",
            "institution": "Example Institute",
            "address": "1 Main St"
        }
    }))
}

pub fn study_payload(name: &str, abbreviation: &str) -> Payload {
    payload(json!({
        "program": { "name": "Program", "abbreviation": "PRG", "description": "" },
        "study": { "name": name, "abbreviation": abbreviation, "description": "A study" }
    }))
}

/// Snapshot of a section as the renderer would report it
pub fn snapshot(section: &str, payload: Payload, valid: bool) -> SectionSnapshot {
    SectionSnapshot::new(section, payload, valid)
}

/// Valid snapshot for every editable section of the default registry
pub fn complete_snapshots() -> Vec<SectionSnapshot> {
    vec![
        snapshot("A", pi_payload("Ada", "Lovelace"), true),
        snapshot("B", study_payload("Engines", "ENG"), true),
        snapshot("C", payload(json!({ "accessTypes": ["Open Access"], "cancerTypes": ["Breast"] })), true),
        snapshot("D", payload(json!({ "dataTypes": ["genomics"], "files": [] })), true),
    ]
}

/// Document with every editable section `Completed`
pub fn completed_document(id: &str, status: ApplicationStatus) -> Document {
    let mut doc = Document::new_default(pi_payload("Ada", "Lovelace"))
        .with_id(id)
        .with_status(status);
    for meta in SectionRegistry::default().editable() {
        doc.sections_mut().record(meta.id.clone(), SectionStatus::Completed);
    }
    doc
}

pub fn gateway() -> Arc<InMemoryGateway> {
    Arc::new(InMemoryGateway::default())
}

pub fn store_with(gateway: Arc<InMemoryGateway>) -> Arc<DocumentStore> {
    Arc::new(DocumentStore::new(gateway, IntakeConfig::default()))
}

pub fn setup_test_store() -> (Arc<DocumentStore>, Arc<InMemoryGateway>) {
    let gateway = gateway();
    (store_with(gateway.clone()), gateway)
}

/// Renderer returning whatever was last set
#[derive(Debug, Default)]
pub struct FakeRenderer {
    snapshot: Mutex<Option<SectionSnapshot>>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn showing(snapshot: SectionSnapshot) -> Self {
        let renderer = Self::new();
        renderer.set(snapshot);
        renderer
    }

    pub fn set(&self, snapshot: SectionSnapshot) {
        *self.snapshot.lock() = Some(snapshot);
    }

    pub fn clear(&self) {
        *self.snapshot.lock() = None;
    }
}

impl SectionRenderer for FakeRenderer {
    fn extract(&self) -> Option<SectionSnapshot> {
        self.snapshot.lock().clone()
    }
}

/// Router double recording what the guard asked for
#[derive(Debug, Default)]
pub struct RecordingController {
    resumed: Mutex<Vec<NavigationTarget>>,
    aborted: Mutex<Vec<NavigationTarget>>,
}

impl RecordingController {
    pub fn resumed(&self) -> Vec<NavigationTarget> {
        self.resumed.lock().clone()
    }

    pub fn aborted(&self) -> Vec<NavigationTarget> {
        self.aborted.lock().clone()
    }
}

impl NavigationController for RecordingController {
    fn resume(&self, target: &NavigationTarget) {
        self.resumed.lock().push(target.clone());
    }

    fn abort(&self, target: &NavigationTarget) {
        self.aborted.lock().push(target.clone());
    }
}

pub fn setup_test_guard(store: Arc<DocumentStore>) -> (NavigationGuard, Arc<RecordingController>) {
    let controller = Arc::new(RecordingController::default());
    (NavigationGuard::new(store, controller.clone()), controller)
}
