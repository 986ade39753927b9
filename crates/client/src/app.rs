//! Wires the relay components together for one page.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use txrelay_events::{
    BridgeHandle, IframeEventBridge, InMemoryMessageBus, MessageBus, TrustedOrigin, WindowMessage,
};
use txrelay_infra::{DurableStore, PendingRecordRepository};

use crate::checkout::{CheckoutFlow, PaymentDetailsClient, PaymentDetailsSource};
use crate::config::ClientConfig;
use crate::context::{CookieSource, PageContext};
use crate::poller::{DisabledMonitor, HttpStatusSource, OrderStatusSource, StatusMonitor, StatusPoller};
use crate::presenter::{GuardedPresenter, Presenter};
use crate::transport::{HttpTransport, SubmissionTransport};
use crate::worker::{SubmissionWorker, WorkerHandle, WorkerStatus};

/// External collaborators the app is assembled from.
pub struct Components {
    pub store: Arc<dyn DurableStore>,
    pub transport: Arc<dyn SubmissionTransport>,
    pub status_source: Option<Arc<dyn OrderStatusSource>>,
    pub payment_details: Arc<dyn PaymentDetailsSource>,
    pub cookies: Arc<dyn CookieSource>,
    pub presenter: Arc<dyn Presenter>,
}

impl Components {
    /// HTTP-backed collaborators sharing one `reqwest` client.
    pub fn http(
        config: &ClientConfig,
        store: Arc<dyn DurableStore>,
        cookies: Arc<dyn CookieSource>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        let client = reqwest::Client::new();
        let status_source = config.order_detail_url.clone().map(|url| {
            Arc::new(HttpStatusSource::with_client(client.clone(), url)) as Arc<dyn OrderStatusSource>
        });

        Self {
            store,
            transport: Arc::new(HttpTransport::with_client(client.clone())),
            status_source,
            payment_details: Arc::new(PaymentDetailsClient::with_client(client)),
            cookies,
            presenter,
        }
    }
}

/// A running relay: worker, bridge and (optionally) status poller.
pub struct App {
    bus: Arc<InMemoryMessageBus<WindowMessage>>,
    checkout: Arc<CheckoutFlow>,
    repository: PendingRecordRepository,
    poller: Option<StatusPoller>,
    worker: WorkerHandle,
    bridge: BridgeHandle,
}

impl App {
    /// Assemble and spawn everything. Must be called inside a Tokio runtime.
    pub fn start(config: &ClientConfig, components: Components) -> anyhow::Result<Self> {
        let trusted = TrustedOrigin::from_base_url(&config.trusted_origin)
            .context("invalid trusted origin")?;

        let mut context = PageContext::new(config.transaction_details_url.clone(), components.cookies);
        if let Some(url) = &config.order_detail_url {
            context = context.with_order_detail_url(url.clone());
        }
        context
            .order_id()
            .context("transaction details URL carries no order id")?;

        let presenter: Arc<dyn Presenter> = Arc::new(GuardedPresenter::new(components.presenter));
        let repository =
            PendingRecordRepository::with_key(components.store, config.storage_key.clone());

        let poller = components.status_source.map(|source| {
            StatusPoller::new(source, context.clone(), presenter.clone(), config.poll_interval)
        });
        let monitor: Arc<dyn StatusMonitor> = match &poller {
            Some(poller) => Arc::new(poller.clone()),
            None => Arc::new(DisabledMonitor),
        };
        if config.payment_submitted {
            tracing::info!("payment already submitted, resuming status polling");
            monitor.start();
        }

        let worker = SubmissionWorker::new(
            repository.clone(),
            components.transport,
            context.clone(),
            presenter.clone(),
            monitor,
        )
        .with_policy(config.retry);
        let waker = worker.waker();
        let worker = worker.start();

        let checkout = Arc::new(CheckoutFlow::new(
            repository.clone(),
            context,
            presenter,
            components.payment_details,
            waker,
        ));

        let bus = Arc::new(InMemoryMessageBus::new());
        let bridge = IframeEventBridge::new(trusted).spawn(bus.subscribe(), checkout.clone());

        Ok(Self {
            bus,
            checkout,
            repository,
            poller,
            worker,
            bridge,
        })
    }

    /// Deliver a window message to the bridge.
    pub fn post_message(&self, message: WindowMessage) -> anyhow::Result<()> {
        self.bus.publish(message).context("message bus unavailable")
    }

    pub fn checkout(&self) -> &CheckoutFlow {
        &self.checkout
    }

    pub fn repository(&self) -> &PendingRecordRepository {
        &self.repository
    }

    pub fn worker_status(&self) -> WorkerStatus {
        self.worker.status()
    }

    pub fn subscribe_worker(&self) -> watch::Receiver<WorkerStatus> {
        self.worker.subscribe()
    }

    /// Stop the bridge, the worker and the poller, in that order.
    pub async fn shutdown(self) {
        self.bridge.shutdown().await;
        self.worker.shutdown().await;
        if let Some(poller) = &self.poller {
            poller.shutdown().await;
        }
        tracing::info!("relay stopped");
    }
}
