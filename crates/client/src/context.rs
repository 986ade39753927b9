//! Page-scoped context threaded through the worker and the checkout flow.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use txrelay_core::{DomainResult, OrderId};
use url::Url;

/// Cookie names the CSRF token may be stored under, in lookup order.
///
/// Development servers issue the plain name; production prefixes it with
/// `__Host-`.
pub const CSRF_COOKIE_NAMES: [&str; 2] = ["pretix_csrftoken", "__Host-pretix_csrftoken"];

/// Read access to the session's cookies.
///
/// Looked up at submission time, never cached: sessions rotate tokens.
pub trait CookieSource: Send + Sync {
    fn cookie(&self, name: &str) -> Option<String>;
}

/// Mutable in-process cookie jar.
#[derive(Debug, Default)]
pub struct StaticCookies {
    values: RwLock<HashMap<String, String>>,
}

impl StaticCookies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut values) = self.values.write() {
            values.insert(name.into(), value.into());
        }
    }

    pub fn clear(&self, name: &str) {
        if let Ok(mut values) = self.values.write() {
            values.remove(name);
        }
    }
}

impl CookieSource for StaticCookies {
    fn cookie(&self, name: &str) -> Option<String> {
        self.values.read().ok()?.get(name).cloned()
    }
}

/// Everything the relay knows about the page it serves.
#[derive(Clone)]
pub struct PageContext {
    transaction_details_url: Url,
    order_detail_url: Option<Url>,
    cookies: Arc<dyn CookieSource>,
}

impl std::fmt::Debug for PageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageContext")
            .field("transaction_details_url", &self.transaction_details_url.as_str())
            .field("order_detail_url", &self.order_detail_url.as_ref().map(Url::as_str))
            .finish_non_exhaustive()
    }
}

impl PageContext {
    pub fn new(transaction_details_url: Url, cookies: Arc<dyn CookieSource>) -> Self {
        Self {
            transaction_details_url,
            order_detail_url: None,
            cookies,
        }
    }

    pub fn with_order_detail_url(mut self, url: Url) -> Self {
        self.order_detail_url = Some(url);
        self
    }

    /// Endpoint both for fetching payment details and submitting proofs.
    pub fn transaction_details_url(&self) -> &Url {
        &self.transaction_details_url
    }

    pub fn order_detail_url(&self) -> Option<&Url> {
        self.order_detail_url.as_ref()
    }

    /// Order this page belongs to, derived from the transaction details URL.
    pub fn order_id(&self) -> DomainResult<OrderId> {
        OrderId::require_from_context_url(self.transaction_details_url.as_str())
    }

    /// Current CSRF token, read fresh from the cookie source.
    pub fn csrf_token(&self) -> Option<String> {
        CSRF_COOKIE_NAMES
            .iter()
            .find_map(|name| self.cookies.cookie(name).filter(|v| !v.is_empty()))
    }
}
