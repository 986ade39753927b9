//! Headless relay: window messages arrive as JSON lines on stdin.
//!
//! Each line is either `{"origin": "...", "data": {...}}` or the word `pay`,
//! which runs the payment start check.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use txrelay_client::context::CSRF_COOKIE_NAMES;
use txrelay_client::{App, ClientConfig, Components, PaymentStart, StaticCookies, TracingPresenter};
use txrelay_events::WindowMessage;
use txrelay_infra::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    txrelay_observability::init();

    let config = ClientConfig::from_env().context("failed to load configuration")?;
    tracing::info!(
        store = %config.store_path.display(),
        endpoint = %config.transaction_details_url,
        "starting relay"
    );

    let store = Arc::new(
        SqliteStore::open(&config.store_path)
            .await
            .with_context(|| format!("failed to open store at {:?}", config.store_path))?,
    );

    let cookies = StaticCookies::new();
    if let Some(token) = &config.csrf_token {
        cookies.set(CSRF_COOKIE_NAMES[0], token.clone());
    }

    let components = Components::http(
        &config,
        store.clone(),
        Arc::new(cookies),
        Arc::new(TracingPresenter),
    );
    let app = App::start(&config, components)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line(), if stdin_open => match line.context("failed to read stdin")? {
                Some(line) => handle_line(&app, line.trim()).await,
                None => {
                    tracing::info!("stdin closed, relay keeps running until interrupted");
                    stdin_open = false;
                }
            },
        }
    }

    app.shutdown().await;
    store.close().await;
    Ok(())
}

async fn handle_line(app: &App, line: &str) {
    if line.is_empty() {
        return;
    }
    if line == "pay" {
        match app.checkout().begin_payment().await {
            Ok(PaymentStart::Ready(details)) => {
                tracing::info!(amount = %details.amount, recipient = %details.recipient_address, "payment may start")
            }
            Ok(PaymentStart::AlreadyPaid) => tracing::info!("order already paid"),
            Err(e) => tracing::warn!(error = %e, "payment cannot start"),
        }
        return;
    }

    match serde_json::from_str::<WindowMessage>(line) {
        Ok(message) => {
            if let Err(e) = app.post_message(message) {
                tracing::error!(error = %e, "failed to post message");
            }
        }
        Err(e) => tracing::warn!(error = %e, "ignoring malformed input line"),
    }
}
