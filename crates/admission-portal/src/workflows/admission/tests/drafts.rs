use chrono::{Duration, Utc};

use super::common::{complete_payload, draft_store, owner, server_error};
use crate::workflows::admission::domain::{ApplicationPayload, Draft, DraftId, OwnerId};
use crate::workflows::admission::drafts::{DraftHandle, DraftStoreError, SaveOutcome};

#[tokio::test]
async fn saved_drafts_read_back_unchanged() {
    let (store, _, _) = draft_store();
    let payload = complete_payload();

    let outcome = store.save_draft(&payload, None).await;
    let draft_id = match outcome {
        SaveOutcome::Saved(id) => id,
        other => panic!("expected a saved draft, got {other:?}"),
    };

    let draft = store.get_draft(&draft_id).await.expect("draft exists");
    assert_eq!(draft.payload, payload);
    assert_eq!(draft.owner, owner());
}

#[tokio::test]
async fn resumed_drafts_keep_their_id_on_resave() {
    let (store, service, _) = draft_store();
    let first = store
        .save_draft(&ApplicationPayload::default(), None)
        .await
        .draft_id()
        .cloned()
        .expect("id assigned");

    let mut handle = store.resume(&first).await.expect("resumes");
    handle.payload = complete_payload();
    let outcome = store.autosave(&mut handle).await;

    assert_eq!(outcome.draft_id(), Some(&first));
    assert_eq!(handle.id.as_ref(), Some(&first));
    assert_eq!(service.stored().len(), 1);
    assert_eq!(
        store.get_draft(&first).await.expect("exists").payload,
        complete_payload()
    );
}

#[tokio::test]
async fn deleting_twice_succeeds_both_times() {
    let (store, _, _) = draft_store();
    let draft_id = store
        .save_draft(&complete_payload(), None)
        .await
        .draft_id()
        .cloned()
        .expect("id");

    store.delete_draft(&draft_id).await.expect("first delete");
    store.delete_draft(&draft_id).await.expect("second delete");

    match store.get_draft(&draft_id).await {
        Err(DraftStoreError::NotFound(id)) => assert_eq!(id, draft_id),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[tokio::test]
async fn delete_failures_other_than_not_found_are_raised() {
    let (store, service, _) = draft_store();
    service.set_fail_deletes(true);
    match store.delete_draft(&DraftId("draft-9999".to_string())).await {
        Err(DraftStoreError::Remote(err)) => assert_eq!(err, server_error()),
        other => panic!("expected remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_saves_go_to_the_fallback_slot() {
    let (store, service, _) = draft_store();
    service.set_fail_saves(true);
    let mut handle = DraftHandle::new(complete_payload());
    handle.id = Some(DraftId("draft-0042".to_string()));

    let outcome = store.autosave(&mut handle).await;
    match &outcome {
        SaveOutcome::Degraded(degraded) => {
            assert!(degraded.cached_locally);
            assert_eq!(degraded.draft_id, handle.id);
        }
        other => panic!("expected degraded save, got {other:?}"),
    }

    let entry = store.recover().await.expect("readable").expect("stored");
    assert_eq!(entry.draft_id, Some(DraftId("draft-0042".to_string())));
    assert_eq!(entry.payload, complete_payload());

    store.clear_fallback().await.expect("clears");
    assert!(store.recover().await.expect("readable").is_none());
}

#[tokio::test]
async fn fallback_keeps_only_the_last_payload() {
    let (store, service, _) = draft_store();
    service.set_fail_saves(true);
    let mut older = ApplicationPayload::default();
    older.student_details.student_name = "First attempt".to_string();

    store.save_draft(&older, None).await;
    store.save_draft(&complete_payload(), None).await;

    let entry = store.recover().await.expect("readable").expect("stored");
    assert_eq!(entry.payload.student_details.student_name, "Asha Reddy");
}

#[tokio::test]
async fn listing_is_per_owner_and_newest_first() {
    let (store, service, _) = draft_store();
    let now = Utc::now();
    for (id, age_minutes, who) in [
        ("draft-a", 30, owner()),
        ("draft-b", 5, owner()),
        ("draft-c", 1, OwnerId("someone-else".to_string())),
        ("draft-d", 60, owner()),
    ] {
        service.insert(Draft {
            draft_id: DraftId(id.to_string()),
            owner: who,
            payload: ApplicationPayload::default(),
            saved_at: now - Duration::minutes(age_minutes),
        });
    }

    let listed: Vec<String> = store
        .list_drafts()
        .await
        .expect("lists")
        .into_iter()
        .map(|summary| summary.draft_id.0)
        .collect();
    assert_eq!(listed, vec!["draft-b", "draft-a", "draft-d"]);
}
