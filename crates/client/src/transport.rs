//! Submission of transaction details to the server.

use async_trait::async_trait;
use thiserror::Error;
use txrelay_core::TransactionDetails;
use url::Url;

/// Form field carrying the CSRF token in the request body.
pub const CSRF_FORM_FIELD: &str = "csrfmiddlewaretoken";
/// Header carrying the CSRF token on submissions.
pub const CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server answered with a non-2xx status.
    #[error("server returned {0}: {1}")]
    Status(u16, String),

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),
}

/// Delivers one submission; `Ok` only for a 2xx response.
#[async_trait]
pub trait SubmissionTransport: Send + Sync {
    async fn submit(
        &self,
        url: &Url,
        details: &TransactionDetails,
        csrf_token: Option<&str>,
    ) -> Result<(), TransportError>;
}

/// Form-encoded POST over `reqwest`.
///
/// No request timeout is configured: a hung request delays the worker's next
/// cycle rather than being reported as a failure.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Request body: every payload field plus the CSRF token field.
pub fn form_fields(details: &TransactionDetails, csrf_token: Option<&str>) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = details
        .iter()
        .filter(|(key, _)| *key != CSRF_FORM_FIELD)
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    fields.push((
        CSRF_FORM_FIELD.to_string(),
        csrf_token.unwrap_or_default().to_string(),
    ));
    fields
}

#[async_trait]
impl SubmissionTransport for HttpTransport {
    async fn submit(
        &self,
        url: &Url,
        details: &TransactionDetails,
        csrf_token: Option<&str>,
    ) -> Result<(), TransportError> {
        let mut request = self
            .client
            .post(url.clone())
            .form(&form_fields(details, csrf_token));
        if let Some(token) = csrf_token {
            request = request.header(CSRF_HEADER, token);
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
        Ok(())
    }
}
