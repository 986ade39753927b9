mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use txrelay_client::{
    CycleOutcome, RetryPolicy, StaticCookies, SubmissionWorker, WorkerPhase,
};
use txrelay_infra::{InMemoryStore, PendingRecordRepository, PersistenceError, StoreError};

struct Fixture {
    store: Arc<InMemoryStore>,
    repository: PendingRecordRepository,
    transport: Arc<ScriptedTransport>,
    presenter: Arc<RecordingPresenter>,
    monitor: Arc<CountingMonitor>,
    cookies: Arc<StaticCookies>,
}

impl Fixture {
    fn new(script: Vec<Result<(), txrelay_client::TransportError>>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            repository: PendingRecordRepository::new(store.clone()),
            store,
            transport: Arc::new(ScriptedTransport::new(script)),
            presenter: Arc::new(RecordingPresenter::default()),
            monitor: Arc::new(CountingMonitor::default()),
            cookies: Arc::new(StaticCookies::new().with("pretix_csrftoken", "token-1")),
        }
    }

    fn worker(&self, page_order: &str) -> SubmissionWorker {
        SubmissionWorker::new(
            self.repository.clone(),
            self.transport.clone(),
            page(page_order, self.cookies.clone()),
            self.presenter.clone(),
            self.monitor.clone(),
        )
    }
}

#[tokio::test]
async fn cycle_acts_only_on_this_pages_order() {
    let fx = Fixture::new(vec![]);
    fx.repository.add(order("A"), payload("0xa")).await.unwrap();
    fx.repository.add(order("B"), payload("0xb")).await.unwrap();

    let report = fx.worker("A").run_cycle(1).await;

    assert_eq!(report.outcome, CycleOutcome::Delivered(order("A")));
    let submissions = fx.transport.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].details, payload("0xa"));

    let remaining = fx.repository.list_all().await.unwrap();
    assert!(!remaining.contains(&order("A")));
    assert_eq!(remaining.get(&order("B")).unwrap().payload, payload("0xb"));
}

#[tokio::test]
async fn successful_delivery_removes_record_and_hands_off() {
    let fx = Fixture::new(vec![Ok(())]);
    fx.repository.add(order("order42"), payload("0x42")).await.unwrap();

    let report = fx.worker("order42").run_cycle(1).await;

    assert_eq!(report.outcome, CycleOutcome::Delivered(order("order42")));
    assert_eq!(report.next_attempt, 1);
    assert!(fx.repository.get(&order("order42")).await.unwrap().is_none());
    assert_eq!(fx.presenter.successes(), vec![payload("0x42")]);
    assert!(fx.presenter.errors().is_empty());
    assert_eq!(fx.monitor.starts(), 1);

    let submission = &fx.transport.submissions()[0];
    assert_eq!(submission.url, details_url("order42").to_string());
    assert_eq!(submission.csrf_token.as_deref(), Some("token-1"));
}

#[tokio::test]
async fn failed_delivery_keeps_record_and_retries() {
    let fx = Fixture::new(vec![Err(server_error())]);
    fx.repository.add(order("order42"), payload("0x42")).await.unwrap();
    let worker = fx.worker("order42");

    let first = worker.run_cycle(1).await;
    assert!(matches!(first.outcome, CycleOutcome::Failed { .. }));
    assert_eq!(first.next_attempt, 2);
    assert!(fx.repository.get(&order("order42")).await.unwrap().is_some());
    assert!(fx.presenter.successes().is_empty());
    assert!(fx.presenter.calls().contains(&Shown::HidePay));
    let error = fx.presenter.errors().pop().unwrap();
    assert!(error.contains("0x42"));
    assert!(error.contains("OP Mainnet (chain ID 10)"));
    assert_eq!(fx.monitor.starts(), 0);

    // Session rotated between attempts: the fresh token is used.
    fx.cookies.set("pretix_csrftoken", "token-2");
    let second = worker.run_cycle(first.next_attempt).await;

    assert_eq!(second.outcome, CycleOutcome::Delivered(order("order42")));
    assert_eq!(second.next_attempt, 1);
    assert!(fx.repository.get(&order("order42")).await.unwrap().is_none());
    assert_eq!(fx.presenter.successes(), vec![payload("0x42")]);
    assert_eq!(fx.monitor.starts(), 1);

    let tokens: Vec<_> = fx
        .transport
        .submissions()
        .into_iter()
        .map(|s| s.csrf_token)
        .collect();
    assert_eq!(tokens, vec![Some("token-1".into()), Some("token-2".into())]);
}

#[tokio::test]
async fn consecutive_failures_keep_escalating() {
    let fx = Fixture::new(vec![Err(server_error()), Err(server_error()), Err(server_error())]);
    fx.repository.add(order("A"), payload("0xa")).await.unwrap();
    let worker = fx.worker("A");

    let mut attempt = 1;
    for expected in [2, 3, 4] {
        attempt = worker.run_cycle(attempt).await.next_attempt;
        assert_eq!(attempt, expected);
    }
    let status = worker.subscribe().borrow().clone();
    assert_eq!(status.attempt, 4);
    assert_eq!(status.cycles, 3);
}

#[tokio::test]
async fn nothing_pending_resets_attempt() {
    let fx = Fixture::new(vec![]);
    fx.repository.add(order("B"), payload("0xb")).await.unwrap();

    let report = fx.worker("A").run_cycle(5).await;

    assert_eq!(report.outcome, CycleOutcome::NothingPending);
    assert_eq!(report.next_attempt, 1);
    assert!(fx.transport.submissions().is_empty());
    assert!(fx.presenter.calls().is_empty());
}

#[tokio::test]
async fn unreadable_buffer_is_not_fatal() {
    let fx = Fixture::new(vec![]);
    fx.repository.add(order("A"), payload("0xa")).await.unwrap();
    fx.store.fail_reads(true);

    let report = fx.worker("A").run_cycle(3).await;

    assert!(matches!(report.outcome, CycleOutcome::Unavailable(_)));
    assert_eq!(report.next_attempt, 1);
    assert!(fx.transport.submissions().is_empty());
    assert!(fx.presenter.errors().is_empty());

    fx.store.fail_reads(false);
    assert_eq!(
        fx.worker("A").run_cycle(1).await.outcome,
        CycleOutcome::Delivered(order("A"))
    );
}

#[tokio::test]
async fn failed_removal_after_delivery_is_logged_not_fatal() {
    let fx = Fixture::new(vec![]);
    fx.repository.add(order("A"), payload("0xa")).await.unwrap();
    fx.store.fail_writes(true);

    let report = fx.worker("A").run_cycle(1).await;

    assert_eq!(report.outcome, CycleOutcome::Delivered(order("A")));
    assert_eq!(fx.monitor.starts(), 1);
    assert_eq!(
        fx.repository.remove(&order("A")).await,
        Err(PersistenceError::Store(StoreError::QuotaExceeded))
    );
}

#[tokio::test]
async fn background_loop_retries_until_delivered() {
    let fx = Fixture::new(vec![Err(server_error()), Err(server_error())]);
    fx.repository.add(order("order42"), payload("0x42")).await.unwrap();

    let handle = fx
        .worker("order42")
        .with_policy(RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(8)))
        .start();

    let mut status = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| s.delivered == 1))
        .await
        .expect("record never delivered")
        .unwrap();

    assert_eq!(handle.status().failed, 2);
    assert!(fx.repository.get(&order("order42")).await.unwrap().is_none());
    assert_eq!(fx.transport.submissions().len(), 3);
    assert_eq!(fx.monitor.starts(), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn wake_cuts_the_sleep_short() {
    let fx = Fixture::new(vec![]);
    let handle = fx
        .worker("A")
        .with_policy(RetryPolicy::new(Duration::from_secs(60), Duration::from_secs(60)))
        .start();

    let mut status = handle.subscribe();
    status
        .wait_for(|s| s.phase == WorkerPhase::Scheduled)
        .await
        .unwrap();

    fx.repository.add(order("A"), payload("0xa")).await.unwrap();
    handle.wake();

    tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| s.delivered == 1))
        .await
        .expect("worker was not woken")
        .unwrap();

    handle.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_the_loop() {
    let fx = Fixture::new(vec![]);
    let handle = fx.worker("A").start();
    let status = handle.subscribe();

    handle.shutdown().await;

    assert_eq!(status.borrow().phase, WorkerPhase::Stopped);
}

#[tokio::test]
async fn loop_backs_off_from_the_attempt_that_just_ran() {
    let fx = Fixture::new(vec![Err(server_error()), Err(server_error())]);
    fx.repository.add(order("A"), payload("0xa")).await.unwrap();
    let handle = fx.worker("A").start();
    let mut status = handle.subscribe();

    let after_first = tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| s.failed == 1 && s.phase == WorkerPhase::Scheduled),
    )
    .await
    .expect("first failure never scheduled")
    .unwrap()
    .clone();
    assert_eq!(after_first.next_delay, Some(Duration::from_millis(500)));
    assert_eq!(after_first.attempt, 2);

    let after_second = tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| s.failed == 2 && s.phase == WorkerPhase::Scheduled),
    )
    .await
    .expect("second failure never scheduled")
    .unwrap()
    .clone();
    assert_eq!(after_second.next_delay, Some(Duration::from_secs(1)));
    assert_eq!(after_second.attempt, 3);

    // Third attempt succeeds; its own wait still uses attempt 3.
    let after_delivery = tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| s.delivered == 1 && s.phase == WorkerPhase::Scheduled),
    )
    .await
    .expect("delivery never scheduled")
    .unwrap()
    .clone();
    assert_eq!(after_delivery.next_delay, Some(Duration::from_secs(2)));
    assert_eq!(after_delivery.attempt, 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn delivery_and_idle_cycles_wait_the_base_interval() {
    let fx = Fixture::new(vec![]);
    fx.repository.add(order("A"), payload("0xa")).await.unwrap();
    let handle = fx.worker("A").start();
    let mut status = handle.subscribe();

    let after_delivery = tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| s.delivered == 1 && s.phase == WorkerPhase::Scheduled),
    )
    .await
    .expect("delivery never scheduled")
    .unwrap()
    .clone();
    assert_eq!(after_delivery.next_delay, Some(Duration::from_millis(500)));

    let after_idle = tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| s.cycles == 2 && s.phase == WorkerPhase::Scheduled),
    )
    .await
    .expect("idle cycle never scheduled")
    .unwrap()
    .clone();
    assert_eq!(after_idle.last_outcome, Some(CycleOutcome::NothingPending));
    assert_eq!(after_idle.next_delay, Some(Duration::from_millis(500)));

    handle.shutdown().await;
}
