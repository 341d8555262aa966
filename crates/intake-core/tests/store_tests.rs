use intake_core::{
    DomainErrorCode, GatewayCall, GatewayError, IntakeError, LifecycleStatus, ValidationError,
};
use intake_model::{ApplicationStatus, Document, SectionId, SectionStatus, Transition};
use intake_test_utils::{
    complete_snapshots, completed_document, payload, pi_payload, setup_test_store, snapshot,
    study_payload,
};
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_valid_first_save_completes_section_and_assigns_id() {
    let (store, gateway) = setup_test_store();
    store.load("new", None).await.unwrap();

    let id = store
        .save(&snapshot("A", pi_payload("Ada", "Lovelace"), true))
        .await
        .unwrap();

    assert!(id.is_persisted());
    assert_eq!(store.lifecycle(), LifecycleStatus::Loaded);

    let doc = store.committed().unwrap();
    assert_eq!(doc.id(), &id);
    assert_eq!(doc.status(), ApplicationStatus::InProgress);
    assert_eq!(doc.sections().get(&SectionId::from("A")), SectionStatus::Completed);
    assert_eq!(gateway.get(&id).unwrap().payload()["pi"]["firstName"], json!("Ada"));
}

#[tokio::test]
async fn test_identifier_is_stable_after_first_save() {
    let (store, gateway) = setup_test_store();
    store.load("new", None).await.unwrap();

    let first = store.save(&snapshot("A", pi_payload("Ada", "L"), true)).await.unwrap();
    let second = store
        .save(&snapshot("B", study_payload("Engines", "ENG"), false))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(gateway.len(), 1);
}

#[tokio::test]
async fn test_duplicate_study_forces_section_b_in_progress() {
    let (store, gateway) = setup_test_store();
    gateway.insert(
        Document::new_default(study_payload("Other", "ENG"))
            .with_id("other")
            .with_status(ApplicationStatus::InProgress),
    );

    store.load("new", None).await.unwrap();
    store.save(&snapshot("A", pi_payload("Ada", "L"), true)).await.unwrap();

    let err = store
        .save(&snapshot("B", study_payload("Engines", "ENG"), true))
        .await
        .unwrap_err();

    assert_eq!(err.domain_code(), Some(&DomainErrorCode::DuplicateStudyAbbreviation));
    assert_eq!(store.lifecycle(), LifecycleStatus::Error);

    let current = store.document().unwrap();
    assert_eq!(current.sections().get(&SectionId::from("B")), SectionStatus::InProgress);
    assert_eq!(current.sections().get(&SectionId::from("A")), SectionStatus::Completed);
    assert_eq!(current.payload()["study"]["abbreviation"], json!("ENG"));
    assert_eq!(current.payload()["pi"]["firstName"], json!("Ada"));

    let committed = store.committed().unwrap();
    assert_eq!(committed.sections().get(&SectionId::from("B")), SectionStatus::NotStarted);
}

#[tokio::test]
async fn test_other_domain_errors_do_not_touch_sections() {
    let (store, gateway) = setup_test_store();
    store.load("new", None).await.unwrap();
    gateway.fail_next(
        GatewayCall::Save,
        intake_core::DomainError::other("UNKNOWN_ERROR", "something broke").into(),
    );

    let err = store
        .save(&snapshot("B", study_payload("Engines", "ENG"), true))
        .await
        .unwrap_err();

    assert!(err.is_domain());
    assert_eq!(
        err.domain_code(),
        Some(&DomainErrorCode::Unknown("UNKNOWN_ERROR".to_string()))
    );
    let current = store.document().unwrap();
    assert_eq!(current.sections().get(&SectionId::from("B")), SectionStatus::Completed);
}

#[tokio::test]
async fn test_transport_failure_then_retry() {
    let (store, gateway) = setup_test_store();
    store.load("new", None).await.unwrap();
    gateway.fail_next(GatewayCall::Save, GatewayError::Transport("connection reset".into()));

    let edit = snapshot("A", pi_payload("Ada", "L"), true);
    let err = store.save(&edit).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(store.lifecycle(), LifecycleStatus::Error);
    assert!(store.committed().unwrap().id().is_new());

    store.save(&edit).await.unwrap();
    assert_eq!(store.lifecycle(), LifecycleStatus::Loaded);
    assert!(store.last_error().is_none());
    assert_eq!(gateway.call_count(GatewayCall::Save), 2);
}

#[tokio::test]
async fn test_second_call_rejected_while_saving() {
    let (store, gateway) = setup_test_store();
    store.load("new", None).await.unwrap();
    gateway.hold();

    let background = {
        let store = store.clone();
        tokio::spawn(async move {
            let edit = snapshot("A", pi_payload("Ada", "L"), true);
            store.save(&edit).await
        })
    };
    gateway.wait_held().await;

    assert_eq!(store.lifecycle(), LifecycleStatus::Saving);
    assert!(store.is_busy());

    let err = store
        .save(&snapshot("B", study_payload("Engines", "ENG"), true))
        .await
        .unwrap_err();
    assert_eq!(err, IntakeError::Busy { lifecycle: LifecycleStatus::Saving });

    let err = store.submit().await.unwrap_err();
    assert_eq!(err, IntakeError::Busy { lifecycle: LifecycleStatus::Saving });

    gateway.release();
    let id = background.await.unwrap().unwrap();

    assert!(id.is_persisted());
    assert_eq!(gateway.call_count(GatewayCall::Save), 1);
    assert_eq!(store.lifecycle(), LifecycleStatus::Loaded);
    assert!(!store.is_busy());
}

#[tokio::test]
async fn test_close_discards_late_response() {
    let (store, gateway) = setup_test_store();
    store.load("new", None).await.unwrap();
    gateway.hold();

    let background = {
        let store = store.clone();
        tokio::spawn(async move {
            let edit = snapshot("A", pi_payload("Ada", "L"), true);
            store.save(&edit).await
        })
    };
    gateway.wait_held().await;

    store.close();
    gateway.release();

    assert_eq!(background.await.unwrap(), Err(IntakeError::Closed));
    assert!(store.committed().unwrap().id().is_new());
    assert_eq!(store.load("new", None).await.unwrap_err(), IntakeError::Closed);
}

#[tokio::test]
async fn test_open_prefills_new_document_from_latest_submission() {
    let (store, gateway) = setup_test_store();
    gateway.insert(completed_document("prior", ApplicationStatus::Submitted));

    let doc = store.open("new").await.unwrap();

    assert!(doc.id().is_new());
    assert_eq!(doc.payload()["pi"]["firstName"], json!("Ada"));
    assert_eq!(doc.payload()["study"]["abbreviation"], json!(""));
    assert_eq!(gateway.call_count(GatewayCall::FetchMostRecent), 1);
}

#[tokio::test]
async fn test_open_prefills_fetched_document_only_when_unvisited() {
    let (store, gateway) = setup_test_store();
    gateway.insert(completed_document("prior", ApplicationStatus::Submitted));
    gateway.insert(
        Document::new_default(payload(json!({ "pi": { "firstName": "" } })))
            .with_id("fresh")
            .with_status(ApplicationStatus::InProgress),
    );

    let mut visited = Document::new_default(payload(json!({ "pi": { "firstName": "Grace" } })))
        .with_id("visited")
        .with_status(ApplicationStatus::InProgress);
    visited
        .sections_mut()
        .record(SectionId::from("A"), SectionStatus::InProgress);
    gateway.insert(visited);

    let fresh = store.open("fresh").await.unwrap();
    assert_eq!(fresh.payload()["pi"]["firstName"], json!("Ada"));

    let visited = store.open("visited").await.unwrap();
    assert_eq!(visited.payload()["pi"]["firstName"], json!("Grace"));
}

#[tokio::test]
async fn test_blank_id_never_reaches_gateway() {
    let (store, gateway) = setup_test_store();

    let err = store.open("").await.unwrap_err();

    assert_eq!(err, IntakeError::Validation(ValidationError::InvalidId));
    assert_eq!(store.lifecycle(), LifecycleStatus::Error);
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_fetch_failure_sets_error() {
    let (store, gateway) = setup_test_store();
    gateway.fail_next(GatewayCall::FetchById, GatewayError::Transport("offline".into()));

    let err = store.load("sr-1", None).await.unwrap_err();

    assert!(err.is_transport());
    assert_eq!(store.lifecycle(), LifecycleStatus::Error);
    assert!(store.document().is_none());
}

#[tokio::test]
async fn test_save_if_changed_skips_clean_section() {
    let (store, gateway) = setup_test_store();
    store.load("new", None).await.unwrap();

    let edit = snapshot("A", pi_payload("Ada", "L"), true);
    assert!(store.save_if_changed(&edit).await.unwrap().was_saved());
    assert!(!store.save_if_changed(&edit).await.unwrap().was_saved());

    let revised = snapshot("A", pi_payload("Ada", "Byron"), true);
    assert!(store.save_if_changed(&revised).await.unwrap().was_saved());
    assert_eq!(gateway.call_count(GatewayCall::Save), 2);
}

#[tokio::test]
async fn test_concurrent_saves_in_one_task() {
    let (store, gateway) = setup_test_store();
    store.load("new", None).await.unwrap();
    gateway.hold();
    let edit_a = snapshot("A", pi_payload("Ada", "L"), true);
    let edit_b = snapshot("B", study_payload("Engines", "ENG"), true);

    let first = store.save(&edit_a);
    let second = async {
        gateway.wait_held().await;
        let result = store.save(&edit_b).await;
        gateway.release();
        result
    };
    let (first, second) = futures::join!(first, second);

    assert!(first.unwrap().is_persisted());
    assert_eq!(second, Err(IntakeError::Busy { lifecycle: LifecycleStatus::Saving }));
    assert_eq!(gateway.call_count(GatewayCall::Save), 1);
}

#[tokio::test]
async fn test_second_call_rejected_while_submitting() {
    let (store, gateway) = setup_test_store();
    store.load("new", None).await.unwrap();
    for edit in complete_snapshots() {
        store.save(&edit).await.unwrap();
    }
    let calls_before = gateway.calls().len();
    gateway.hold();

    let background = {
        let store = store.clone();
        tokio::spawn(async move { store.submit().await })
    };
    gateway.wait_held().await;

    assert_eq!(store.lifecycle(), LifecycleStatus::Submitting);
    let busy = IntakeError::Busy { lifecycle: LifecycleStatus::Submitting };
    assert_eq!(
        store.save(&snapshot("A", pi_payload("Grace", "Hopper"), true)).await.unwrap_err(),
        busy
    );
    assert_eq!(store.reject("Incomplete").await.unwrap_err(), busy);
    assert_eq!(store.submit().await.unwrap_err(), busy);
    assert_eq!(store.revert(), Err(busy));

    gateway.release();
    background.await.unwrap().unwrap();

    assert_eq!(gateway.calls().len(), calls_before + 1);
    assert_eq!(gateway.call_count(GatewayCall::Workflow(Transition::Submit)), 1);
    assert_eq!(store.committed().unwrap().status(), ApplicationStatus::Submitted);
    assert_eq!(store.lifecycle(), LifecycleStatus::Loaded);
}

#[tokio::test]
async fn test_second_call_rejected_while_review_loads() {
    let (store, gateway) = setup_test_store();
    store.load("new", None).await.unwrap();
    for edit in complete_snapshots() {
        store.save(&edit).await.unwrap();
    }
    store.submit().await.unwrap();
    let calls_before = gateway.calls().len();
    gateway.hold();

    let background = {
        let store = store.clone();
        tokio::spawn(async move { store.review().await })
    };
    gateway.wait_held().await;

    assert_eq!(store.lifecycle(), LifecycleStatus::Loading);
    let busy = IntakeError::Busy { lifecycle: LifecycleStatus::Loading };
    assert_eq!(store.review().await.unwrap_err(), busy);
    assert_eq!(store.approve("Looks good", false).await.unwrap_err(), busy);
    assert_eq!(store.load("new", None).await.unwrap_err(), busy);

    gateway.release();
    background.await.unwrap().unwrap();

    assert_eq!(gateway.calls().len(), calls_before + 1);
    assert_eq!(store.committed().unwrap().status(), ApplicationStatus::InReview);
    assert_eq!(store.lifecycle(), LifecycleStatus::Loaded);
}

#[tokio::test]
async fn test_open_is_rejected_before_prefill_lookup_while_saving() {
    let (store, gateway) = setup_test_store();
    store.load("new", None).await.unwrap();
    gateway.hold();

    let background = {
        let store = store.clone();
        tokio::spawn(async move {
            let edit = snapshot("A", pi_payload("Ada", "L"), true);
            store.save(&edit).await
        })
    };
    gateway.wait_held().await;

    let err = store.open("new").await.unwrap_err();
    assert_eq!(err, IntakeError::Busy { lifecycle: LifecycleStatus::Saving });
    assert_eq!(gateway.call_count(GatewayCall::FetchMostRecent), 0);

    gateway.release();
    background.await.unwrap().unwrap();
    assert_eq!(gateway.calls(), vec![GatewayCall::Save]);
}

#[tokio::test]
async fn test_duplicate_study_leaves_unvisited_section_alone() {
    let (store, gateway) = setup_test_store();
    store.load("new", None).await.unwrap();
    gateway.fail_next(
        GatewayCall::Save,
        intake_core::DomainError::duplicate_study("abbreviation taken").into(),
    );

    let err = store
        .save(&snapshot("A", pi_payload("Ada", "L"), true))
        .await
        .unwrap_err();

    assert_eq!(err.domain_code(), Some(&DomainErrorCode::DuplicateStudyAbbreviation));
    let current = store.document().unwrap();
    assert_eq!(current.sections().get(&SectionId::from("B")), SectionStatus::NotStarted);
    assert!(current.sections().iter().all(|(id, _)| id.as_str() != "B"));
    assert_eq!(current.sections().get(&SectionId::from("A")), SectionStatus::Completed);
}

#[tokio::test]
async fn test_unchanged_save_after_failure_settles_lifecycle() {
    let (store, gateway) = setup_test_store();
    store.load("new", None).await.unwrap();
    let edit = snapshot("A", pi_payload("Ada", "L"), true);
    store.save(&edit).await.unwrap();

    gateway.fail_next(GatewayCall::Save, GatewayError::Transport("timeout".into()));
    store
        .save(&snapshot("A", pi_payload("Ada", "Byron"), true))
        .await
        .unwrap_err();
    assert_eq!(store.lifecycle(), LifecycleStatus::Error);
    assert!(store.last_error().is_some());

    let outcome = store.save_if_changed(&edit).await.unwrap();

    assert!(!outcome.was_saved());
    assert_eq!(store.lifecycle(), LifecycleStatus::Loaded);
    assert!(store.last_error().is_none());
    assert_eq!(store.document(), store.committed());
    assert_eq!(gateway.call_count(GatewayCall::Save), 2);
}
