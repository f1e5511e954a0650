mod common;

use common::{fast_poll, merge_request, FlakyStore, RecordingNotifier, TestDb};
use intake_api::database::contacts::{self as contacts_db, NewContact};
use intake_api::dedup::{DispositionTracker, MergeWait};
use intake_api::jobs::merge_manager::MergeJobManager;
use intake_api::notifications::{NotificationLevel, TracingNotifier};
use intake_api::store::ContactStore;
use intake_api::IntakeError;
use shared_types::{
    ContactCompany, DuplicateStatus, FieldMode, MergeSelection, NewMergeRequest, CATEGORY_MERGED,
};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn selections(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_combined_tags_have_no_duplicates() {
    let t = TestDb::new();
    let x = t.add_contact(Some("Jon"), Some("Smith"), Some("x@x.com"), None).await;
    let y = t.add_contact(Some("John"), Some("Smith"), Some("y@x.com"), None).await;
    for tag in ["A", "B"] {
        t.add_tag(x, tag).await;
    }
    for tag in ["B", "C"] {
        t.add_tag(y, tag).await;
    }
    let notifier = Arc::new(RecordingNotifier::default());
    let tracker = t.tracker(notifier.clone());
    let manager = MergeJobManager::new(t.dyn_store());

    let pair = tracker
        .submit_merge(x, y, Some(&selections(&[("tags", "combine")])), None, None, Some("ops"))
        .await
        .unwrap();
    assert_eq!(pair.status, DuplicateStatus::Pending);
    assert_eq!(pair.primary_contact_id, y);
    assert_eq!(pair.duplicate_contact_id, x);
    assert_eq!(pair.duplicate_data.as_ref().unwrap().contact.contact_id, y);

    assert_eq!(manager.run_pending().await.unwrap(), 1);
    manager.wait_idle().await;

    match tracker.wait_for_merge(pair.duplicate_id).await {
        MergeWait::Done(status) => assert_eq!(status.status, DuplicateStatus::Completed),
        other => panic!("unexpected wait result {:?}", other),
    }

    let survivor = t.record(y).await;
    let tags: Vec<&str> = survivor.tags.iter().map(|tag| tag.name.as_str()).collect();
    assert_eq!(tags, vec!["A", "B", "C"]);
    assert_eq!(survivor.contact.first_name.as_deref(), Some("Jon"));
    let emails: Vec<(&str, bool)> = survivor
        .emails
        .iter()
        .map(|e| (e.email.as_str(), e.is_primary))
        .collect();
    assert_eq!(emails, vec![("x@x.com", true), ("y@x.com", false)]);
    assert_eq!(survivor.contact.email.as_deref(), Some("x@x.com"));

    let retired = t.record(x).await;
    assert_eq!(retired.contact.category.as_deref(), Some(CATEGORY_MERGED));
    assert_eq!(retired.tags.len(), 2);

    assert!(notifier.levels().contains(&NotificationLevel::Success));
}

#[tokio::test]
async fn test_failed_merge_leaves_both_contacts_untouched() {
    let t = TestDb::new();
    let x = t.add_contact(Some("Jon"), Some("Smith"), Some("x@x.com"), None).await;
    let y = t.add_contact(Some("John"), Some("Smith"), Some("y@x.com"), None).await;
    t.add_tag(x, "A").await;
    let before_x = t.record(x).await;
    let before_y = t.record(y).await;

    let mut snapshot = before_y.clone();
    snapshot.companies.push(ContactCompany {
        company_id: 9999,
        name: "Ghost Inc".to_string(),
        relationship: None,
        is_primary: true,
    });
    let pair = t
        .store
        .upsert_duplicate_pair(&NewMergeRequest {
            primary_contact_id: y,
            duplicate_contact_id: x,
            email: Some("x@x.com".to_string()),
            mobile_number: None,
            match_evidence: None,
            notes: None,
            resolved_by: None,
            duplicate_data: snapshot,
            merge_selections: MergeSelection::default(),
        })
        .await
        .unwrap();

    let manager = MergeJobManager::new(t.dyn_store());
    manager.run_pending().await.unwrap();
    manager.wait_idle().await;

    let tracker = t.tracker(Arc::new(TracingNotifier));
    let status = match tracker.wait_for_merge(pair.duplicate_id).await {
        MergeWait::Done(status) => status,
        other => panic!("unexpected wait result {:?}", other),
    };
    assert_eq!(status.status, DuplicateStatus::Failed);
    assert!(status.error_message.unwrap().contains("constraint"));

    assert_eq!(t.record(x).await, before_x);
    assert_eq!(t.record(y).await, before_y);
}

#[tokio::test]
async fn test_failed_merge_can_be_resubmitted() {
    let t = TestDb::new();
    let x = t.add_contact(Some("Jon"), Some("Smith"), None, None).await;
    let y = t.add_contact(Some("Jon"), Some("Smith"), None, None).await;
    let tracker = t.tracker(Arc::new(TracingNotifier));

    let pair = tracker.submit_merge(x, y, None, None, None, None).await.unwrap();
    t.store
        .finish_duplicate_pair(pair.duplicate_id, DuplicateStatus::Failed, Some("boom"))
        .await
        .unwrap();

    let retry = tracker.submit_merge(x, y, None, None, None, None).await.unwrap();

    assert_eq!(retry.duplicate_id, pair.duplicate_id);
    assert_eq!(retry.status, DuplicateStatus::Pending);
    assert!(retry.error_message.is_none());
    assert!(retry.start_trigger);
}

#[tokio::test]
async fn test_wait_reports_still_running_when_job_is_idle() {
    let t = TestDb::new();
    let x = t.add_contact(Some("Jon"), Some("Smith"), None, None).await;
    let y = t.add_contact(Some("Jon"), Some("Smith"), None, None).await;
    let tracker = t.tracker(Arc::new(TracingNotifier));

    let pair = tracker.submit_merge(x, y, None, None, None, None).await.unwrap();

    assert_eq!(
        tracker.wait_for_merge(pair.duplicate_id).await,
        MergeWait::StillRunning
    );
}

#[tokio::test]
async fn test_wait_times_out_when_status_is_unreadable() {
    let t = TestDb::new();
    let x = t.add_contact(Some("Jon"), Some("Smith"), None, None).await;
    let y = t.add_contact(Some("Jon"), Some("Smith"), None, None).await;
    let flaky = Arc::new(FlakyStore::new(t.dyn_store()));
    let tracker = DispositionTracker::new(flaky.clone(), Arc::new(TracingNotifier), fast_poll(3));

    let pair = tracker.submit_merge(x, y, None, None, None, None).await.unwrap();
    flaky.fail_status.store(true, Ordering::SeqCst);

    assert_eq!(
        tracker.wait_for_merge(pair.duplicate_id).await,
        MergeWait::TimedOut
    );
}

#[tokio::test]
async fn test_submit_merge_rejects_invalid_requests_before_writing() {
    let t = TestDb::new();
    let x = t.add_contact(Some("Jon"), Some("Smith"), None, None).await;
    let y = t.add_contact(Some("Jon"), Some("Smith"), None, None).await;
    let tracker = t.tracker(Arc::new(TracingNotifier));

    assert!(matches!(
        tracker.submit_merge(0, y, None, None, None, None).await,
        Err(IntakeError::Validation(_))
    ));
    assert!(matches!(
        tracker.submit_merge(x, x, None, None, None, None).await,
        Err(IntakeError::Validation(_))
    ));
    assert!(matches!(
        tracker.submit_merge(x, 999, None, None, None, None).await,
        Err(IntakeError::NotFound(_))
    ));
    assert!(matches!(
        tracker
            .submit_merge(x, y, Some(&selections(&[("nickname", "current")])), None, None, None)
            .await,
        Err(IntakeError::InvalidSelection(_))
    ));
    assert!(matches!(
        tracker
            .submit_merge(x, y, Some(&selections(&[("first_name", "combine")])), None, None, None)
            .await,
        Err(IntakeError::InvalidSelection(_))
    ));

    assert!(t.store.find_duplicate_pairs(x, y).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_overrides_are_stored_verbatim() {
    let t = TestDb::new();
    let x = t.add_contact(Some("Jon"), Some("Smith"), Some("j@x.com"), None).await;
    let y = t.add_contact(Some("John"), Some("Smith"), Some("j@x.com"), None).await;
    let tracker = t.tracker(Arc::new(TracingNotifier));

    let pair = tracker
        .submit_merge(
            x,
            y,
            Some(&selections(&[("first_name", "duplicate"), ("emails", "current")])),
            None,
            None,
            None,
        )
        .await
        .unwrap();

    let stored = t
        .store
        .get_duplicate_pair(pair.duplicate_id)
        .await
        .unwrap()
        .unwrap();
    let selection = stored.merge_selections.unwrap();
    assert_eq!(selection.first_name, FieldMode::Duplicate);
    assert_eq!(selection.emails, shared_types::CollectionMode::Current);
    assert_eq!(stored.match_evidence.as_deref(), Some("Email: j@x.com"));
}

#[tokio::test]
async fn test_dispositions_are_final() {
    let t = TestDb::new();
    let x = t.add_contact(Some("Jon"), Some("Smith"), None, None).await;
    let y = t.add_contact(Some("Jon"), Some("Smith"), None, None).await;
    let z = t.add_contact(Some("Jon"), Some("Smith"), None, None).await;
    let tracker = t.tracker(Arc::new(TracingNotifier));
    let manager = MergeJobManager::new(t.dyn_store());

    // Dismissed pairs cannot be merged.
    tracker.mark_false_positive(x, z, None).await.unwrap();
    assert!(matches!(
        tracker.submit_merge(z, x, None, None, None, None).await,
        Err(IntakeError::Conflict(_))
    ));

    // Only one merge per pair in flight.
    tracker.submit_merge(x, y, None, None, None, None).await.unwrap();
    assert!(matches!(
        tracker.submit_merge(x, y, None, None, None, None).await,
        Err(IntakeError::Conflict(_))
    ));

    manager.run_pending().await.unwrap();
    manager.wait_idle().await;

    // Completed merges cannot be dismissed, and the retired contact cannot be merged again.
    assert!(matches!(
        tracker.mark_false_positive(y, x, None).await,
        Err(IntakeError::Conflict(_))
    ));
    assert!(matches!(
        tracker.submit_merge(x, z, None, None, None, None).await,
        Err(IntakeError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_mark_false_positive_validates_and_is_idempotent() {
    let t = TestDb::new();
    let x = t.add_contact(Some("Jon"), None, None, None).await;
    let y = t.add_contact(Some("Jon"), None, None, None).await;
    let tracker = t.tracker(Arc::new(TracingNotifier));

    assert!(matches!(
        tracker.mark_false_positive(x, 0, None).await,
        Err(IntakeError::Validation(_))
    ));
    assert!(matches!(
        tracker.mark_false_positive(x, 555, None).await,
        Err(IntakeError::NotFound(_))
    ));

    let first = tracker.mark_false_positive(x, y, None).await.unwrap();
    let second = tracker.mark_false_positive(x, y, None).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(t.store.list_false_positive_pairs(x).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_restore_interrupted_jobs_resumes_merges() {
    let t = TestDb::new();
    let x = t.add_contact(Some("Jon"), None, None, None).await;
    let y = t.add_contact(Some("Jon"), None, None, None).await;
    let tracker = t.tracker(Arc::new(TracingNotifier));
    let pair = tracker.submit_merge(x, y, None, None, None, None).await.unwrap();

    // Simulate a crash after the job claimed the pair.
    t.store.claim_pending_merges(10).await.unwrap();

    let manager = MergeJobManager::new(t.dyn_store());
    assert_eq!(manager.run_pending().await.unwrap(), 0);
    assert_eq!(manager.restore_interrupted_jobs().await.unwrap(), 1);
    assert_eq!(manager.run_pending().await.unwrap(), 1);
    manager.wait_idle().await;

    let status = tracker.merge_status(pair.duplicate_id).await.unwrap();
    assert_eq!(status.status, DuplicateStatus::Completed);
}

#[tokio::test]
async fn test_contact_row_email_survives_merge() {
    let t = TestDb::new();
    let x = contacts_db::insert_contact(
        t.db.async_connection.clone(),
        &NewContact {
            first_name: Some("Jon".to_string()),
            last_name: Some("Smith".to_string()),
            email: Some("only@row.com".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let y = t.add_contact(Some("John"), Some("Smith"), Some("y@x.com"), None).await;
    let tracker = t.tracker(Arc::new(TracingNotifier));
    let manager = MergeJobManager::new(t.dyn_store());

    let pair = tracker.submit_merge(x, y, None, None, None, None).await.unwrap();
    manager.run_pending().await.unwrap();
    manager.wait_idle().await;

    let status = tracker.merge_status(pair.duplicate_id).await.unwrap();
    assert_eq!(status.status, DuplicateStatus::Completed);
    let survivor = t.record(y).await;
    let emails: Vec<(&str, bool)> = survivor
        .emails
        .iter()
        .map(|e| (e.email.as_str(), e.is_primary))
        .collect();
    assert_eq!(emails, vec![("only@row.com", true), ("y@x.com", false)]);
    assert_eq!(survivor.contact.email.as_deref(), Some("only@row.com"));
}

#[tokio::test]
async fn test_contact_takes_part_in_one_merge_at_a_time() {
    let t = TestDb::new();
    let x = t.add_contact(Some("Jon"), Some("Smith"), None, None).await;
    let y = t.add_contact(Some("Jon"), Some("Smith"), None, None).await;
    let z = t.add_contact(Some("Jon"), Some("Smith"), None, None).await;
    let tracker = t.tracker(Arc::new(TracingNotifier));

    tracker.submit_merge(x, y, None, None, None, None).await.unwrap();

    assert!(matches!(
        tracker.submit_merge(x, z, None, None, None, None).await,
        Err(IntakeError::Conflict(_))
    ));
    assert!(matches!(
        tracker.submit_merge(z, y, None, None, None, None).await,
        Err(IntakeError::Conflict(_))
    ));

    // Written past the tracker: the job still lets only one merge retire x.
    t.store
        .upsert_duplicate_pair(&merge_request(z, x, t.record(z).await))
        .await
        .unwrap();
    let manager = MergeJobManager::new(t.dyn_store());
    assert_eq!(manager.run_pending().await.unwrap(), 2);
    manager.wait_idle().await;

    let mut statuses = Vec::new();
    for pair in [
        t.store.find_duplicate_pairs(x, y).await.unwrap(),
        t.store.find_duplicate_pairs(x, z).await.unwrap(),
    ] {
        statuses.push(pair[0].status);
    }
    statuses.sort_by_key(|s| s.as_str());
    assert_eq!(statuses, vec![DuplicateStatus::Completed, DuplicateStatus::Failed]);
    assert_eq!(
        t.record(x).await.contact.category.as_deref(),
        Some(CATEGORY_MERGED)
    );
}

#[tokio::test]
async fn test_merge_in_flight_cannot_be_dismissed() {
    let t = TestDb::new();
    let x = t.add_contact(Some("Jon"), Some("Smith"), None, None).await;
    let y = t.add_contact(Some("Jon"), Some("Smith"), None, None).await;
    let tracker = t.tracker(Arc::new(TracingNotifier));

    let pair = tracker.submit_merge(x, y, None, None, None, None).await.unwrap();
    assert!(matches!(
        tracker.mark_false_positive(x, y, None).await,
        Err(IntakeError::Conflict(_))
    ));

    let claimed = t.store.claim_pending_merges(10).await.unwrap();
    assert!(matches!(
        tracker.mark_false_positive(y, x, None).await,
        Err(IntakeError::Conflict(_))
    ));

    // A dismissal that lands under a running job wins, and the job cannot complete.
    t.store.mark_false_positive(x, y, None).await.unwrap();
    let merged = t.record(y).await;
    assert!(t.store.apply_merge(&claimed[0], &merged).await.is_err());
    t.store
        .finish_duplicate_pair(pair.duplicate_id, DuplicateStatus::Failed, Some("stale"))
        .await
        .unwrap();

    let stored = t
        .store
        .get_duplicate_pair(pair.duplicate_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, DuplicateStatus::Resolved);
    assert!(stored.false_positive);
    assert_ne!(
        t.record(x).await.contact.category.as_deref(),
        Some(CATEGORY_MERGED)
    );
}

#[tokio::test]
async fn test_dismissal_checks_pairs_in_both_orientations() {
    let t = TestDb::new();
    let x = t.add_contact(Some("Jon"), Some("Smith"), None, None).await;
    let y = t.add_contact(Some("Jon"), Some("Smith"), None, None).await;
    let tracker = t.tracker(Arc::new(TracingNotifier));

    let failed = tracker.submit_merge(x, y, None, None, None, None).await.unwrap();
    t.store
        .finish_duplicate_pair(failed.duplicate_id, DuplicateStatus::Failed, Some("boom"))
        .await
        .unwrap();
    tracker.submit_merge(y, x, None, None, None, None).await.unwrap();

    assert!(matches!(
        tracker.mark_false_positive(x, y, None).await,
        Err(IntakeError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_one_failing_merge_does_not_stop_the_batch() {
    let t = TestDb::new();
    let a = t.add_contact(Some("Ann"), Some("Lee"), None, None).await;
    let b = t.add_contact(Some("Ann"), Some("Lee"), None, None).await;
    let c = t.add_contact(Some("Bo"), Some("Chan"), None, None).await;
    let d = t.add_contact(Some("Bo"), Some("Chan"), None, None).await;

    let mut broken = t.record(b).await;
    broken.companies.push(ContactCompany {
        company_id: 9999,
        name: "Ghost Inc".to_string(),
        relationship: None,
        is_primary: true,
    });
    let first = t
        .store
        .upsert_duplicate_pair(&merge_request(b, a, broken))
        .await
        .unwrap();
    let second = t
        .store
        .upsert_duplicate_pair(&merge_request(d, c, t.record(d).await))
        .await
        .unwrap();

    let manager = MergeJobManager::new(t.dyn_store());
    assert_eq!(manager.run_pending().await.unwrap(), 2);
    manager.wait_idle().await;

    let tracker = t.tracker(Arc::new(TracingNotifier));
    assert_eq!(
        tracker.merge_status(first.duplicate_id).await.unwrap().status,
        DuplicateStatus::Failed
    );
    assert_eq!(
        tracker.merge_status(second.duplicate_id).await.unwrap().status,
        DuplicateStatus::Completed
    );
}
