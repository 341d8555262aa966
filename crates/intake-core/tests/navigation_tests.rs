use intake_core::{
    GatewayCall, GatewayError, GuardState, LifecycleStatus, NavigationDecision, NavigationTarget,
    UnloadPrompt,
};
use intake_model::{SectionId, SectionStatus};
use intake_test_utils::{
    complete_snapshots, payload, pi_payload, setup_test_guard, setup_test_store, snapshot,
    FakeRenderer,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn to_b() -> NavigationTarget {
    NavigationTarget::Section(SectionId::from("B"))
}

/// Section A as first rendered for a brand-new document
fn untouched_a() -> FakeRenderer {
    FakeRenderer::showing(snapshot(
        "A",
        payload(json!({
            "pi": {
                "firstName": "",
                "lastName": "",
                "position": "",
                "email": "",
                "institution": "",
                "address": ""
            }
        })),
        false,
    ))
}

/// One required field filled, the rest still empty
fn partially_edited_a() -> FakeRenderer {
    FakeRenderer::showing(snapshot(
        "A",
        payload(json!({ "pi": { "firstName": "Ada", "lastName": "" } })),
        false,
    ))
}

#[tokio::test]
async fn test_new_document_without_edits_stays_idle() {
    let (store, _gateway) = setup_test_store();
    store.load("new", None).await.unwrap();
    let (guard, controller) = setup_test_guard(store);

    let decision = guard.intercept(to_b(), &untouched_a());

    assert_eq!(decision, NavigationDecision::Proceed);
    assert_eq!(guard.state(), GuardState::Idle);
    assert!(controller.resumed().is_empty());
}

#[tokio::test]
async fn test_discard_resumes_without_saving() {
    let (store, gateway) = setup_test_store();
    store.load("new", None).await.unwrap();
    let before = store.committed().unwrap();
    let (guard, controller) = setup_test_guard(store.clone());

    let decision = guard.intercept(to_b(), &partially_edited_a());
    assert_eq!(decision, NavigationDecision::Blocked);
    assert_eq!(guard.state(), GuardState::Blocked { target: to_b() });

    guard.discard().unwrap();

    assert_eq!(guard.state(), GuardState::Idle);
    assert_eq!(controller.resumed(), vec![to_b()]);
    assert_eq!(store.committed().unwrap(), before);
    assert_eq!(store.document().unwrap(), before);
    assert_eq!(gateway.call_count(GatewayCall::Save), 0);
}

#[tokio::test]
async fn test_save_resumes_after_success() {
    let (store, _gateway) = setup_test_store();
    store.load("new", None).await.unwrap();
    let (guard, controller) = setup_test_guard(store.clone());
    let renderer = partially_edited_a();

    guard.intercept(to_b(), &renderer);
    guard.save(&renderer).await.unwrap();

    assert_eq!(guard.state(), GuardState::Idle);
    assert_eq!(controller.resumed(), vec![to_b()]);

    let doc = store.committed().unwrap();
    assert!(doc.id().is_persisted());
    assert_eq!(doc.sections().get(&SectionId::from("A")), SectionStatus::InProgress);
    assert_eq!(doc.payload()["pi"]["firstName"], json!("Ada"));
    assert!(!store.has_unsaved_changes(renderer_snapshot(&renderer).as_ref()));
}

#[tokio::test]
async fn test_failed_save_stays_blocked() {
    let (store, gateway) = setup_test_store();
    store.load("new", None).await.unwrap();
    let (guard, controller) = setup_test_guard(store.clone());
    let renderer = partially_edited_a();
    gateway.fail_next(GatewayCall::Save, GatewayError::Transport("offline".into()));

    guard.intercept(to_b(), &renderer);
    let err = guard.save(&renderer).await.unwrap_err();

    assert!(err.is_transport());
    assert_eq!(guard.state(), GuardState::Blocked { target: to_b() });
    assert!(controller.resumed().is_empty());
    assert_eq!(store.lifecycle(), LifecycleStatus::Error);

    guard.cancel();
    assert_eq!(guard.state(), GuardState::Idle);
    assert_eq!(controller.aborted(), vec![to_b()]);
}

#[tokio::test]
async fn test_cancel_keeps_edits_on_screen() {
    let (store, gateway) = setup_test_store();
    store.load("new", None).await.unwrap();
    let (guard, controller) = setup_test_guard(store.clone());
    let renderer = partially_edited_a();

    guard.intercept(NavigationTarget::Route("/submissions".into()), &renderer);
    guard.cancel();

    assert!(controller.resumed().is_empty());
    assert_eq!(gateway.call_count(GatewayCall::Save), 0);
    assert!(store.has_unsaved_changes(renderer_snapshot(&renderer).as_ref()));

    // the next attempt prompts again
    assert_eq!(guard.intercept(to_b(), &renderer), NavigationDecision::Blocked);
}

#[tokio::test]
async fn test_close_tab_only_warns() {
    let (store, _gateway) = setup_test_store();
    store.load("new", None).await.unwrap();
    let (guard, _controller) = setup_test_guard(store);

    assert_eq!(guard.before_unload(&untouched_a()), UnloadPrompt::Allow);
    assert!(matches!(guard.before_unload(&partially_edited_a()), UnloadPrompt::Warn(_)));
    assert_eq!(guard.state(), GuardState::Idle);
}

#[tokio::test]
async fn test_after_save_navigation_is_free() {
    let (store, _gateway) = setup_test_store();
    store.load("new", None).await.unwrap();
    let (guard, _controller) = setup_test_guard(store.clone());

    let renderer = FakeRenderer::showing(snapshot("A", pi_payload("Ada", "Lovelace"), true));
    store
        .save(&renderer_snapshot(&renderer).unwrap())
        .await
        .unwrap();

    assert_eq!(guard.intercept(to_b(), &renderer), NavigationDecision::Proceed);

    renderer.clear();
    assert_eq!(guard.intercept(to_b(), &renderer), NavigationDecision::Proceed);
}

fn renderer_snapshot(renderer: &FakeRenderer) -> Option<intake_core::SectionSnapshot> {
    use intake_core::SectionRenderer;
    renderer.extract()
}

#[tokio::test]
async fn test_retry_with_restored_values_resumes_cleanly() {
    let (store, gateway) = setup_test_store();
    store.load("new", None).await.unwrap();
    let saved = snapshot("A", pi_payload("Ada", "Lovelace"), true);
    store.save(&saved).await.unwrap();
    let (guard, controller) = setup_test_guard(store.clone());

    let renderer = FakeRenderer::showing(snapshot("A", pi_payload("Ada", "Byron"), true));
    gateway.fail_next(GatewayCall::Save, GatewayError::Transport("offline".into()));
    guard.intercept(to_b(), &renderer);
    guard.save(&renderer).await.unwrap_err();
    assert_eq!(store.lifecycle(), LifecycleStatus::Error);

    renderer.set(saved);
    guard.save(&renderer).await.unwrap();

    assert_eq!(controller.resumed(), vec![to_b()]);
    assert_eq!(guard.state(), GuardState::Idle);
    assert_eq!(store.lifecycle(), LifecycleStatus::Loaded);
    assert!(store.last_error().is_none());
    assert_eq!(gateway.call_count(GatewayCall::Save), 2);
}

#[tokio::test]
async fn test_submitted_document_never_blocks_navigation() {
    let (store, _gateway) = setup_test_store();
    store.load("new", None).await.unwrap();
    for edit in complete_snapshots() {
        store.save(&edit).await.unwrap();
    }
    store.submit().await.unwrap();
    let (guard, controller) = setup_test_guard(store.clone());

    let renderer = FakeRenderer::showing(snapshot("A", pi_payload("Grace", "Hopper"), true));

    assert!(!store.has_unsaved_changes(renderer_snapshot(&renderer).as_ref()));
    assert_eq!(guard.intercept(to_b(), &renderer), NavigationDecision::Proceed);
    assert_eq!(guard.state(), GuardState::Idle);
    assert_eq!(guard.before_unload(&renderer), UnloadPrompt::Allow);
    assert!(controller.aborted().is_empty());
}
