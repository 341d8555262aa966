//! Scripted editing session against the in-memory gateway

use anyhow::{ensure, Context, Result};
use intake_core::{
    DocumentStore, InMemoryGateway, IntakeConfig, NavigationController, NavigationDecision,
    NavigationGuard, NavigationTarget, SectionRenderer, SectionSnapshot,
};
use intake_model::{ApplicationStatus, Payload};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

/// Form standing in for the mounted section
struct ScriptedForm(Mutex<Option<SectionSnapshot>>);

impl ScriptedForm {
    fn show(&self, section: &str, value: Value, valid: bool) {
        let payload = match value {
            Value::Object(map) => map,
            _ => Payload::new(),
        };
        *self.0.lock() = Some(SectionSnapshot::new(section, payload, valid));
    }
}

impl SectionRenderer for ScriptedForm {
    fn extract(&self) -> Option<SectionSnapshot> {
        self.0.lock().clone()
    }
}

struct PrintingRouter;

impl NavigationController for PrintingRouter {
    fn resume(&self, target: &NavigationTarget) {
        println!("  router: navigating to {target}");
    }

    fn abort(&self, target: &NavigationTarget) {
        println!("  router: staying, navigation to {target} dropped");
    }
}

/// Run the walkthrough, printing each step
pub(crate) async fn run(config: IntakeConfig) -> Result<()> {
    let gateway = Arc::new(InMemoryGateway::new("walkthrough-user"));
    let store = Arc::new(DocumentStore::new(gateway.clone(), config));
    let guard = NavigationGuard::new(store.clone(), Arc::new(PrintingRouter));
    let form = ScriptedForm(Mutex::new(None));

    let doc = store.open("new").await.context("opening a new document")?;
    println!("Opened new document (status {})", doc.status());

    form.show(
        "A",
        json!({ "pi": { "firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.org" } }),
        true,
    );
    println!("Edited section A, trying to leave for B");
    if guard.intercept(NavigationTarget::Section("B".into()), &form) == NavigationDecision::Blocked {
        println!("  guard: unsaved changes, choosing Save");
        guard.save(&form).await.context("saving section A")?;
    }

    let steps = [
        ("B", json!({ "study": { "name": "Engines", "abbreviation": "ENG" } })),
        ("C", json!({ "accessTypes": ["Open Access"], "cancerTypes": ["Breast"] })),
        ("D", json!({ "dataTypes": ["genomics"] })),
    ];
    for (section, value) in steps {
        form.show(section, value, true);
        if let Some(snapshot) = form.extract() {
            store.save(&snapshot).await?;
            println!("Saved section {section}");
        }
    }

    let registry = &store.config().sections;
    let committed = store.committed().context("document not loaded")?;
    println!(
        "Review section: {}",
        committed.section_status(registry.review_id(), registry)
    );

    store.submit().await?;
    store.review().await?;
    store.inquire("Which cohort is covered?").await?;
    store.reopen().await?;
    store.submit().await?;
    store.review().await?;
    store.approve("Looks complete", false).await?;

    let doc = store.committed().context("document not loaded")?;
    ensure!(
        doc.status() == ApplicationStatus::Approved,
        "walkthrough ended in {}",
        doc.status()
    );

    println!("Document {} is {}", doc.id(), doc.status());
    println!("History:");
    for event in doc.history() {
        match &event.review_comment {
            Some(comment) => println!("  {} by {} ({comment})", event.status, event.user_id),
            None => println!("  {} by {}", event.status, event.user_id),
        }
    }
    Ok(())
}
