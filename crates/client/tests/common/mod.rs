#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use txrelay_client::{
    PageContext, Presenter, StaticCookies, StatusMonitor, SubmissionTransport, TransportError,
};
use txrelay_core::{OrderId, TransactionDetails};
use url::Url;

pub fn details_url(order: &str) -> Url {
    Url::parse(&format!(
        "https://tickets.example/org/event/order/{order}/s3cr3t/transaction_details/"
    ))
    .unwrap()
}

pub fn page(order: &str, cookies: Arc<StaticCookies>) -> PageContext {
    PageContext::new(details_url(order), cookies)
}

pub fn order(id: &str) -> OrderId {
    OrderId::new(id).unwrap()
}

pub fn payload(tx: &str) -> TransactionDetails {
    TransactionDetails::new()
        .with("senderAddress", "0x1111111111111111111111111111111111111111")
        .with("signature", "0xsig")
        .with("message", r#"{"senderAddress":"0x1111111111111111111111111111111111111111"}"#)
        .with("transactionHash", tx)
        .with("chainId", "10")
        .with("chainName", "OP Mainnet")
        .with("receiptUrl", format!("https://3cities.xyz/#/receipt?tx={tx}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shown {
    Success(TransactionDetails),
    Error(String),
    ClearError,
    HidePay,
    CloseCheckout,
    Reload,
}

/// Records every presentation call in order.
#[derive(Default)]
pub struct RecordingPresenter {
    calls: Mutex<Vec<Shown>>,
}

impl RecordingPresenter {
    pub fn calls(&self) -> Vec<Shown> {
        self.calls.lock().unwrap().clone()
    }

    pub fn successes(&self) -> Vec<TransactionDetails> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Shown::Success(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Shown::Error(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    fn push(&self, shown: Shown) {
        self.calls.lock().unwrap().push(shown);
    }
}

impl Presenter for RecordingPresenter {
    fn show_success(&self, details: &TransactionDetails) {
        self.push(Shown::Success(details.clone()));
    }
    fn show_error(&self, message: &str) {
        self.push(Shown::Error(message.to_string()));
    }
    fn clear_error(&self) {
        self.push(Shown::ClearError);
    }
    fn hide_pay_action(&self) {
        self.push(Shown::HidePay);
    }
    fn close_checkout(&self) {
        self.push(Shown::CloseCheckout);
    }
    fn reload_page(&self) {
        self.push(Shown::Reload);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub url: String,
    pub details: TransactionDetails,
    pub csrf_token: Option<String>,
}

/// Transport answering from a script; once the script is exhausted every
/// submission succeeds.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<(), TransportError>>>,
    submissions: Mutex<Vec<Submission>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<(), TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, result: Result<(), TransportError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubmissionTransport for ScriptedTransport {
    async fn submit(
        &self,
        url: &Url,
        details: &TransactionDetails,
        csrf_token: Option<&str>,
    ) -> Result<(), TransportError> {
        self.submissions.lock().unwrap().push(Submission {
            url: url.to_string(),
            details: details.clone(),
            csrf_token: csrf_token.map(String::from),
        });
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

/// Counts hand-offs to the status monitor.
#[derive(Default)]
pub struct CountingMonitor(AtomicUsize);

impl CountingMonitor {
    pub fn starts(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl StatusMonitor for CountingMonitor {
    fn start(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn server_error() -> TransportError {
    TransportError::Status(500, "Internal Server Error".into())
}
