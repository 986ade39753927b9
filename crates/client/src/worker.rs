//! Background delivery of pending submissions.
//!
//! Each cycle picks the pending record belonging to this page's order (records
//! of other orders are left alone), submits it, and schedules the next cycle:
//! the attempt counter grows after a failed submission and resets to 1 after a
//! success or a cycle with nothing to do. Storage and transport failures never
//! end the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use txrelay_core::{OrderId, PendingRecord, TransactionDetails};
use txrelay_infra::PendingRecordRepository;

use crate::context::PageContext;
use crate::poller::StatusMonitor;
use crate::presenter::Presenter;
use crate::retry::RetryPolicy;
use crate::transport::{SubmissionTransport, TransportError};

/// Where the worker loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Idle,
    Selecting,
    Delivering,
    Scheduled,
    Stopped,
}

/// What a single cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing pending for this page's order.
    NothingPending,
    /// The buffer or the order context could not be read; treated like
    /// `NothingPending`.
    Unavailable(String),
    Delivered(OrderId),
    Failed {
        order_id: OrderId,
        error: TransportError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    /// Attempt number the following cycle runs with.
    pub next_attempt: u32,
}

/// Read-only view of the worker state, published after every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatus {
    pub phase: WorkerPhase,
    pub attempt: u32,
    pub cycles: u64,
    pub delivered: u64,
    pub failed: u64,
    pub next_delay: Option<Duration>,
    pub last_outcome: Option<CycleOutcome>,
}

impl Default for WorkerStatus {
    fn default() -> Self {
        Self {
            phase: WorkerPhase::Idle,
            attempt: 1,
            cycles: 0,
            delivered: 0,
            failed: 0,
            next_delay: None,
            last_outcome: None,
        }
    }
}

/// Wakes a sleeping worker so it runs its next cycle immediately.
#[derive(Debug, Clone)]
pub struct WorkerWaker(Arc<Notify>);

impl WorkerWaker {
    pub fn wake(&self) {
        self.0.notify_one();
    }
}

/// Text shown when a submission failed. Carries everything the user needs to
/// recover the payment by hand.
pub fn failure_message(details: &TransactionDetails) -> String {
    let hash = details.transaction_hash().unwrap_or("(unknown)");
    let chain_id = details.chain_id().unwrap_or("unknown");
    let mut message = format!(
        "Do not close this window yet! There was an error processing your payment. \
         We will re-try shortly. If this error does not go away, please contact support. \
         Save these details: Your payment was sent in transaction {hash} on {} (chain ID {chain_id}).",
        details.chain_name().unwrap_or("an unknown chain"),
    );
    if let Some(receipt) = details.receipt_url() {
        message.push_str(&format!(" Receipt link {receipt}."));
    }
    message
}

pub struct SubmissionWorker {
    repository: PendingRecordRepository,
    transport: Arc<dyn SubmissionTransport>,
    context: PageContext,
    presenter: Arc<dyn Presenter>,
    monitor: Arc<dyn StatusMonitor>,
    policy: RetryPolicy,
    wake: Arc<Notify>,
    status: watch::Sender<WorkerStatus>,
}

impl SubmissionWorker {
    pub fn new(
        repository: PendingRecordRepository,
        transport: Arc<dyn SubmissionTransport>,
        context: PageContext,
        presenter: Arc<dyn Presenter>,
        monitor: Arc<dyn StatusMonitor>,
    ) -> Self {
        let (status, _) = watch::channel(WorkerStatus::default());
        Self {
            repository,
            transport,
            context,
            presenter,
            monitor,
            policy: RetryPolicy::default(),
            wake: Arc::new(Notify::new()),
            status,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn waker(&self) -> WorkerWaker {
        WorkerWaker(self.wake.clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerStatus> {
        self.status.subscribe()
    }

    fn set_phase(&self, phase: WorkerPhase) {
        self.status.send_modify(|s| s.phase = phase);
    }

    /// Run one selection + delivery cycle with the given attempt number.
    pub async fn run_cycle(&self, attempt: u32) -> CycleReport {
        self.set_phase(WorkerPhase::Selecting);

        let outcome = match self.select().await {
            Ok(Some(record)) => {
                self.set_phase(WorkerPhase::Delivering);
                self.deliver(record, attempt).await
            }
            Ok(None) => CycleOutcome::NothingPending,
            Err(reason) => CycleOutcome::Unavailable(reason),
        };

        let next_attempt = match outcome {
            CycleOutcome::Failed { .. } => attempt.saturating_add(1),
            _ => 1,
        };

        self.status.send_modify(|s| {
            s.cycles += 1;
            match outcome {
                CycleOutcome::Delivered(_) => s.delivered += 1,
                CycleOutcome::Failed { .. } => s.failed += 1,
                _ => {}
            }
            s.attempt = next_attempt;
            s.last_outcome = Some(outcome.clone());
        });

        CycleReport {
            outcome,
            next_attempt,
        }
    }

    /// Pending record for this page's order, if any.
    async fn select(&self) -> Result<Option<PendingRecord>, String> {
        let pending = self.repository.list_all().await.map_err(|e| {
            tracing::warn!(error = %e, "pending buffer unreadable");
            e.to_string()
        })?;
        if pending.is_empty() {
            return Ok(None);
        }

        let order_id = self.context.order_id().map_err(|e| {
            tracing::debug!(error = %e, "no order context for this page");
            e.to_string()
        })?;

        let record = pending.record_for(&order_id);
        let others = pending.len() - usize::from(record.is_some());
        if others > 0 {
            tracing::debug!(order_id = %order_id, others, "pending records for other orders left untouched");
        }
        Ok(record)
    }

    async fn deliver(&self, record: PendingRecord, attempt: u32) -> CycleOutcome {
        let PendingRecord {
            order_id, payload, ..
        } = record;
        let token = self.context.csrf_token();
        if token.is_none() {
            tracing::warn!(order_id = %order_id, "no CSRF token available, submitting anyway");
        }

        let result = self
            .transport
            .submit(self.context.transaction_details_url(), &payload, token.as_deref())
            .await;

        match result {
            Ok(()) => {
                tracing::info!(order_id = %order_id, attempt, "pending submission delivered");
                self.presenter.clear_error();
                self.presenter.show_success(&payload);
                if let Err(e) = self.repository.remove(&order_id).await {
                    // Left in place it is submitted again on a later cycle.
                    tracing::error!(order_id = %order_id, error = %e, "delivered record could not be removed");
                }
                self.monitor.start();
                CycleOutcome::Delivered(order_id)
            }
            Err(error) => {
                tracing::warn!(order_id = %order_id, attempt, error = %error, "submission failed, will retry");
                self.presenter.hide_pay_action();
                self.presenter.show_error(&failure_message(&payload));
                CycleOutcome::Failed { order_id, error }
            }
        }
    }

    /// Spawn the perpetual worker loop.
    pub fn start(self) -> WorkerHandle {
        let shutdown = Arc::new(Notify::new());
        let stop = shutdown.clone();
        let wake = self.wake.clone();
        let status = self.status.subscribe();

        let join = tokio::spawn(async move {
            tracing::info!("submission worker started");
            let mut attempt = 1;
            loop {
                let report = self.run_cycle(attempt).await;
                // The wait is sized by the attempt that just ran.
                let delay = self.policy.delay_for_attempt(attempt);
                attempt = report.next_attempt;

                self.status.send_modify(|s| {
                    s.phase = WorkerPhase::Scheduled;
                    s.next_delay = Some(delay);
                });
                tracing::trace!(attempt, ?delay, "next cycle scheduled");

                tokio::select! {
                    _ = stop.notified() => break,
                    _ = self.wake.notified() => {
                        tracing::debug!("worker woken early");
                    }
                    _ = tokio::time::sleep(delay) => {}
                }

                self.status.send_modify(|s| {
                    s.phase = WorkerPhase::Idle;
                    s.next_delay = None;
                });
            }
            self.set_phase(WorkerPhase::Stopped);
            tracing::info!("submission worker stopped");
        });

        WorkerHandle {
            shutdown,
            wake: WorkerWaker(wake),
            status,
            join,
        }
    }
}

/// Handle to a running worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: Arc<Notify>,
    wake: WorkerWaker,
    status: watch::Receiver<WorkerStatus>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn waker(&self) -> WorkerWaker {
        self.wake.clone()
    }

    pub fn wake(&self) {
        self.wake.wake();
    }

    pub fn status(&self) -> WorkerStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerStatus> {
        self.status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop after the cycle in progress, if any, and wait for the task.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        let _ = self.join.await;
    }
}
