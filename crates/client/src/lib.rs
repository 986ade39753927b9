//! `txrelay-client`
//!
//! **Responsibility:** deliver payment proofs queued on this device to the
//! order's transaction details endpoint.
//!
//! This crate provides:
//! - The submission worker (select, deliver, back off, repeat)
//! - The status poller started after a successful delivery
//! - The checkout flow fed by the payment UI bridge
//! - HTTP boundaries, page context, presentation, configuration

pub mod app;
pub mod checkout;
pub mod config;
pub mod context;
pub mod poller;
pub mod presenter;
pub mod retry;
pub mod transport;
pub mod worker;

pub use app::{App, Components};
pub use checkout::{CheckoutError, CheckoutFlow, PaymentDetails, PaymentDetailsClient, PaymentStart};
pub use config::{ClientConfig, ConfigError};
pub use context::{CookieSource, PageContext, StaticCookies};
pub use poller::{DisabledMonitor, HttpStatusSource, OrderStatusSource, StatusMonitor, StatusPoller};
pub use presenter::{GuardedPresenter, Presenter, TracingPresenter};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, SubmissionTransport, TransportError};
pub use worker::{CycleOutcome, CycleReport, SubmissionWorker, WorkerHandle, WorkerPhase, WorkerStatus};
