mod common;

use chrono::Utc;

use arkivdium::error::ServiceError;
use arkivdium::models::ScheduleCadence;
use arkivdium::services::PipelineOutcome;
use common::{harness, standard_request, FakeCrawler};

#[tokio::test]
async fn test_due_schedule_triggers_once_per_tick() {
    let h = harness(FakeCrawler::default()).await;
    let request = standard_request("https://example.com", "example.com")
        .validate()
        .unwrap();
    let schedule = h
        .services
        .schedules
        .create("alice", request, ScheduleCadence::Daily)
        .await
        .unwrap();

    let now = Utc::now();
    let handles = h.services.trigger.tick(now).await.unwrap();
    assert_eq!(handles.len(), 1);
    for handle in handles {
        match handle.await.unwrap() {
            PipelineOutcome::Completed(record) => {
                assert_eq!(record.from_schedule.as_deref(), Some(schedule.id.as_str()));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    let stored = h.services.schedules.get("alice", &schedule.id).await.unwrap();
    assert!(stored.next_run_at > now);
    assert!(stored.last_run_at.is_some());

    // Already advanced, so the same instant triggers nothing.
    assert!(h.services.trigger.tick(now).await.unwrap().is_empty());

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0]
        .html
        .contains(&format!("https://arkiv.example.org/schedules/{}", schedule.id)));
}

#[tokio::test]
async fn test_paused_schedule_does_not_trigger() {
    let h = harness(FakeCrawler::default()).await;
    let request = standard_request("https://example.com", "example.com")
        .validate()
        .unwrap();
    let schedule = h
        .services
        .schedules
        .create("alice", request, ScheduleCadence::Weekly)
        .await
        .unwrap();
    h.services.schedules.pause("alice", &schedule.id).await.unwrap();

    assert!(h.services.trigger.tick(Utc::now()).await.unwrap().is_empty());
    assert!(h.crawler.commands().is_empty());
    assert!(h.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_schedule_deleted_after_lookup_stays_deleted() {
    let h = harness(FakeCrawler::default()).await;
    let request = standard_request("https://example.com", "example.com")
        .validate()
        .unwrap();
    let schedule = h
        .services
        .schedules
        .create("alice", request, ScheduleCadence::Daily)
        .await
        .unwrap();

    // Found due, then deleted before the tick records the trigger.
    let found = h.services.schedules.get("alice", &schedule.id).await.unwrap();
    h.services.schedules.delete("alice", &schedule.id).await.unwrap();

    let handle = h.services.trigger.trigger(found, Utc::now()).await.unwrap();
    assert!(handle.is_none());
    assert!(matches!(
        h.services.schedules.get("alice", &schedule.id).await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(h.crawler.commands().is_empty());
    assert!(h.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_schedule_paused_after_lookup_stays_paused() {
    let h = harness(FakeCrawler::default()).await;
    let request = standard_request("https://example.com", "example.com")
        .validate()
        .unwrap();
    let schedule = h
        .services
        .schedules
        .create("alice", request, ScheduleCadence::Daily)
        .await
        .unwrap();

    let found = h.services.schedules.get("alice", &schedule.id).await.unwrap();
    h.services.schedules.pause("alice", &schedule.id).await.unwrap();

    let handle = h.services.trigger.trigger(found, Utc::now()).await.unwrap();
    assert!(handle.is_none());
    let stored = h.services.schedules.get("alice", &schedule.id).await.unwrap();
    assert!(stored.paused);
    assert!(stored.last_run_at.is_none());
    assert!(h.services.trigger.tick(Utc::now()).await.unwrap().is_empty());
    assert!(h.crawler.commands().is_empty());
}
