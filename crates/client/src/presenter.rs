//! Boundary to the page's visual success/error presentation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use txrelay_core::TransactionDetails;

/// Generic error text used when no better message is available.
pub const GENERIC_ERROR: &str = "There was an error, please try again, or contact support if you have already confirmed a payment in your wallet provider.";

/// Page-level presentation the relay drives.
///
/// Calls are fire-and-forget; a presenter never fails back into the relay.
pub trait Presenter: Send + Sync {
    /// A submission was accepted by the server.
    fn show_success(&self, details: &TransactionDetails);

    /// Show a persistent error. An empty message means "generic error".
    fn show_error(&self, message: &str);

    fn clear_error(&self);

    /// Stop the user from starting a second payment for this order.
    fn hide_pay_action(&self);

    /// Dismiss the embedded payment UI.
    fn close_checkout(&self);

    /// Reload the whole page so it renders fresh order state.
    fn reload_page(&self);
}

impl<P: Presenter + ?Sized> Presenter for Arc<P> {
    fn show_success(&self, details: &TransactionDetails) {
        (**self).show_success(details)
    }

    fn show_error(&self, message: &str) {
        (**self).show_error(message)
    }

    fn clear_error(&self) {
        (**self).clear_error()
    }

    fn hide_pay_action(&self) {
        (**self).hide_pay_action()
    }

    fn close_checkout(&self) {
        (**self).close_checkout()
    }

    fn reload_page(&self) {
        (**self).reload_page()
    }
}

/// Presenter for headless runs: every call becomes a log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn show_success(&self, details: &TransactionDetails) {
        tracing::info!(
            transaction_hash = details.transaction_hash().unwrap_or_default(),
            chain_id = details.chain_id().unwrap_or_default(),
            "payment submitted"
        );
    }

    fn show_error(&self, message: &str) {
        tracing::warn!(error_message = message, "payment error shown");
    }

    fn clear_error(&self) {
        tracing::debug!("payment error cleared");
    }

    fn hide_pay_action(&self) {
        tracing::info!("pay action hidden");
    }

    fn close_checkout(&self) {
        tracing::info!("checkout UI closed");
    }

    fn reload_page(&self) {
        tracing::info!("page reload requested");
    }
}

/// Applies the page's error display rules on top of another presenter:
///
/// - once a submission succeeded, errors are no longer shown
/// - an empty error message is replaced by [`GENERIC_ERROR`]
#[derive(Debug)]
pub struct GuardedPresenter<P> {
    inner: P,
    submitted: AtomicBool,
}

impl<P: Presenter> GuardedPresenter<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            submitted: AtomicBool::new(false),
        }
    }

    /// Whether a successful submission has been shown on this page.
    pub fn is_submitted(&self) -> bool {
        self.submitted.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: Presenter> Presenter for GuardedPresenter<P> {
    fn show_success(&self, details: &TransactionDetails) {
        self.submitted.store(true, Ordering::SeqCst);
        self.inner.show_success(details);
    }

    fn show_error(&self, message: &str) {
        if self.is_submitted() {
            tracing::debug!(error_message = message, "error suppressed after successful submission");
            return;
        }
        let message = if message.trim().is_empty() {
            GENERIC_ERROR
        } else {
            message
        };
        self.inner.show_error(message);
    }

    fn clear_error(&self) {
        self.inner.clear_error();
    }

    fn hide_pay_action(&self) {
        self.inner.hide_pay_action();
    }

    fn close_checkout(&self) {
        self.inner.close_checkout();
    }

    fn reload_page(&self) {
        self.inner.reload_page();
    }
}
