//! Polls order status after a successful submission and reloads the page
//! once the order turns paid.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use url::Url;

use crate::context::PageContext;
use crate::presenter::Presenter;
use crate::transport::TransportError;

/// Order status value meaning "paid".
pub const PAID_STATUS: &str = "p";
/// Header carrying the CSRF token on status requests.
pub const STATUS_CSRF_HEADER: &str = "X-CSRF-TOKEN";

/// Source of the order's current status code.
#[async_trait]
pub trait OrderStatusSource: Send + Sync {
    async fn fetch_status(&self, csrf_token: Option<&str>) -> Result<String, TransportError>;
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
}

/// `GET {order_detail_url}` returning `{"status": "..."}`.
#[derive(Debug, Clone)]
pub struct HttpStatusSource {
    client: reqwest::Client,
    url: Url,
}

impl HttpStatusSource {
    pub fn new(url: Url) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl OrderStatusSource for HttpStatusSource {
    async fn fetch_status(&self, csrf_token: Option<&str>) -> Result<String, TransportError> {
        let mut request = self.client.get(self.url.clone());
        if let Some(token) = csrf_token {
            request = request.header(STATUS_CSRF_HEADER, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(
                status.as_u16(),
                response.text().await.unwrap_or_default(),
            ));
        }

        let body: StatusBody = response
            .json()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(body.status)
    }
}

/// Hand-off target started once a submission was accepted.
pub trait StatusMonitor: Send + Sync {
    /// Begin monitoring. Calling it again while monitoring is a no-op.
    fn start(&self);
}

impl<M: StatusMonitor + ?Sized> StatusMonitor for Arc<M> {
    fn start(&self) {
        (**self).start()
    }
}

/// Monitor used when no order detail URL is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMonitor;

impl StatusMonitor for DisabledMonitor {
    fn start(&self) {
        tracing::debug!("status polling not configured");
    }
}

/// Result of a single status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// First status seen; remembered as the baseline.
    Baseline(String),
    /// Status is unchanged, or changed to something other than paid.
    Waiting,
    /// Status changed to paid; the page was asked to reload.
    Reloaded,
}

/// Fixed-interval status poller.
///
/// At most one polling task runs per poller; it ends after requesting a
/// reload or on shutdown. Individual poll failures are logged and ignored.
#[derive(Clone)]
pub struct StatusPoller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    source: Arc<dyn OrderStatusSource>,
    context: PageContext,
    presenter: Arc<dyn Presenter>,
    interval: Duration,
    baseline: Mutex<Option<String>>,
    started: AtomicBool,
    shutdown: Notify,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StatusPoller {
    pub fn new(
        source: Arc<dyn OrderStatusSource>,
        context: PageContext,
        presenter: Arc<dyn Presenter>,
        interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                source,
                context,
                presenter,
                interval,
                baseline: Mutex::new(None),
                started: AtomicBool::new(false),
                shutdown: Notify::new(),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Status remembered from the first successful poll.
    pub fn baseline(&self) -> Option<String> {
        self.inner
            .baseline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fetch the status once and act on it.
    pub async fn poll_once(&self) -> Result<PollOutcome, TransportError> {
        let token = self.inner.context.csrf_token();
        let status = self.inner.source.fetch_status(token.as_deref()).await?;

        let previous = {
            let mut baseline = self
                .inner
                .baseline
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let previous = baseline.clone();
            if previous.is_none() {
                *baseline = Some(status.clone());
            }
            previous
        };

        match previous {
            None => {
                tracing::debug!(status = %status, "order status baseline");
                Ok(PollOutcome::Baseline(status))
            }
            Some(previous) if previous != status && status == PAID_STATUS => {
                tracing::info!(status = %status, "order paid, reloading page");
                self.inner.presenter.reload_page();
                Ok(PollOutcome::Reloaded)
            }
            Some(_) => Ok(PollOutcome::Waiting),
        }
    }

    /// Stop the polling task, if any, and wait for it.
    pub async fn shutdown(&self) {
        self.inner.shutdown.notify_one();
        let task = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    async fn run(self) {
        tracing::info!(interval = ?self.inner.interval, "status poller started");
        loop {
            match self.poll_once().await {
                Ok(PollOutcome::Reloaded) => break,
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "status poll failed"),
            }

            tokio::select! {
                _ = self.inner.shutdown.notified() => break,
                _ = tokio::time::sleep(self.inner.interval) => {}
            }
        }
        tracing::info!("status poller stopped");
    }
}

impl StatusMonitor for StatusPoller {
    fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let handle = tokio::spawn(self.clone().run());
        *self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }
}
