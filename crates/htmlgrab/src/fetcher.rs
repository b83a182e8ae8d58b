//! HTTP fetcher
//!
//! Performs a single GET with browser-like headers and a hard timeout over
//! the whole request. There are no retries: every failure is returned to
//! the caller as a classified [`FetchError`].

use crate::address::Address;
use crate::error::FetchError;
use crate::types::FetchResult;
use crate::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
use async_trait::async_trait;
use hyper::ext::ReasonPhrase;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, UPGRADE_INSECURE_REQUESTS,
    USER_AGENT,
};
use std::time::Duration;
use tracing::{debug, info};

/// Accept header of a desktop browser navigation
const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

const BROWSER_ACCEPT_LANGUAGE: &str = "pt-BR,pt;q=0.9,en;q=0.8";

/// Trait for the transport behind the pipeline
///
/// [`HttpFetcher`] is the network implementation; tests and embedders can
/// supply their own.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Identifier for logging
    fn name(&self) -> &'static str;

    /// Retrieve the document at `address`
    async fn fetch(&self, address: &Address) -> Result<FetchResult, FetchError>;
}

/// Fetch options
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Custom User-Agent
    pub user_agent: Option<String>,
    /// Bound on the entire request, body included
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Network fetcher backed by reqwest
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    options: FetchOptions,
}

impl HttpFetcher {
    pub fn new(options: FetchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let user_agent = self
            .options
            .user_agent
            .as_deref()
            .unwrap_or(DEFAULT_USER_AGENT);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
        );
        headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE),
        );
        // Accept-Encoding is left to reqwest: a manual value turns off
        // transparent decompression.
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
        headers
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, address: &Address) -> Result<FetchResult, FetchError> {
        let timeout = self.options.timeout;

        let client = reqwest::Client::builder()
            .default_headers(self.headers())
            .timeout(timeout)
            .build()
            .map_err(FetchError::ClientBuildError)?;

        debug!(url = %address, ?timeout, "Sending request");
        let response = client
            .get(address.as_str())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, timeout))?;

        let status = response.status();
        // hyper keeps a non-canonical phrase from the status line in the
        // extensions; canonical ones are only implied by the code.
        let reason = response
            .extensions()
            .get::<ReasonPhrase>()
            .map(|phrase| String::from_utf8_lossy(phrase.as_bytes()).into_owned())
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_default();
        let final_url = response.url().to_string();

        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::Http {
                status_code: status.as_u16(),
                reason,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(e, timeout))?;

        info!(
            url = %final_url,
            status = status.as_u16(),
            bytes = body.len(),
            "Response received"
        );

        let result = FetchResult::new(body, status.as_u16(), reason).with_final_url(final_url);
        Ok(match content_type {
            Some(content_type) => result.with_content_type(content_type),
            None => result,
        })
    }
}

/// Fetch `address` with the default header set and the given timeout
pub async fn fetch(address: &Address, timeout: Duration) -> Result<FetchResult, FetchError> {
    let fetcher = HttpFetcher::new(FetchOptions {
        timeout,
        ..Default::default()
    });
    fetcher.fetch(address).await
}
