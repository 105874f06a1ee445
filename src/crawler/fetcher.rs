//! HTTP fetcher implementation
//!
//! This module is the fetch collaborator of the crawl. It handles:
//! - Building HTTP clients with the configured user agent and timeouts
//! - Following HTTP and `<meta http-equiv="refresh">` redirects manually so
//!   the full chain can be reported
//! - Capturing status, headers and body of the final response
//! - Mapping transport errors onto the closed [`FetchFailure`] set
//! - Retrying transient failures
//!
//! However many requests it takes, one call to [`Fetch::fetch`] is reported
//! as a single [`FetchResult`].

use crate::config::FetcherConfig;
use crate::crawler::parser::{is_queryable, meta_refresh_target};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE, LOCATION};
use reqwest::{redirect::Policy, Client};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Statuses that are retried before the attempt is reported
pub const RETRY_HTTP_CODES: [u16; 8] = [500, 502, 503, 504, 522, 524, 408, 429];

/// Redirect reason recorded for `<meta http-equiv="refresh">` hops
pub const META_REFRESH_REASON: &str = "meta refresh";

/// One redirect hop taken before the final response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectHop {
    /// The URL that answered with a redirect
    pub url: String,
    /// Why the hop happened: the redirect status code (e.g. "301") or
    /// [`META_REFRESH_REASON`]
    pub reason: String,
}

/// A response that reached the crawler, whatever its status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// URL originally requested
    pub request_url: String,
    /// URL of the final response after redirects
    pub response_url: String,
    pub status: u16,
    /// Lowercased header names; values in the order received
    pub headers: BTreeMap<String, Vec<String>>,
    /// Decoded body (empty when the content type is not parseable)
    pub body: String,
    /// Redirect chain, oldest hop first
    pub redirects: Vec<RedirectHop>,
}

impl FetchedPage {
    /// First Content-Type header value, if any
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE.as_str())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns true if the final status is neither 2xx nor 3xx
    pub fn is_http_error(&self) -> bool {
        !(200..400).contains(&self.status)
    }
}

/// Why a fetch attempt did not produce a successful response
#[derive(Debug, Clone, Error)]
pub enum FetchFailure {
    #[error("HTTP status {}", .0.status)]
    HttpError(Box<FetchedPage>),

    #[error("DNS lookup failed")]
    DnsLookup,

    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("{0}")]
    Other(String),
}

/// Outcome of one fetch attempt
#[derive(Debug, Clone)]
pub enum FetchResult {
    /// The page was fetched with a 2xx/3xx final status
    Success(FetchedPage),

    /// The attempt failed; HTTP errors still carry the response
    Failure {
        request_url: String,
        failure: FetchFailure,
    },
}

impl FetchResult {
    /// Wraps a received page, routing 4xx/5xx statuses to `HttpError`
    pub fn from_page(page: FetchedPage) -> Self {
        if page.is_http_error() {
            Self::Failure {
                request_url: page.request_url.clone(),
                failure: FetchFailure::HttpError(Box::new(page)),
            }
        } else {
            Self::Success(page)
        }
    }

    pub fn request_url(&self) -> &str {
        match self {
            Self::Success(page) => &page.request_url,
            Self::Failure { request_url, .. } => request_url,
        }
    }

    /// The response, if the server was reached at all
    pub fn page(&self) -> Option<&FetchedPage> {
        match self {
            Self::Success(page) => Some(page),
            Self::Failure {
                failure: FetchFailure::HttpError(page),
                ..
            } => Some(page),
            Self::Failure { .. } => None,
        }
    }

    /// Returns true if the outcome may be transient and worth another request
    ///
    /// DNS, timeout and connection failures are retried, as are responses
    /// whose status is in [`RETRY_HTTP_CODES`]. TLS errors, redirect loops
    /// and everything else are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Success(_) => false,
            Self::Failure { failure, .. } => match failure {
                FetchFailure::HttpError(page) => RETRY_HTTP_CODES.contains(&page.status),
                FetchFailure::DnsLookup | FetchFailure::Timeout | FetchFailure::Connection(_) => {
                    true
                }
                FetchFailure::Tls(_) | FetchFailure::TooManyRedirects | FetchFailure::Other(_) => {
                    false
                }
            },
        }
    }
}

/// The fetch capability consumed by the crawl
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchResult;
}

/// Builds an HTTP client with proper configuration
///
/// Automatic redirects are disabled; [`HttpFetcher`] follows them itself.
///
/// # Example
///
/// ```no_run
/// use site2graph::config::FetcherConfig;
/// use site2graph::crawler::build_http_client;
///
/// let client = build_http_client(&FetcherConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.request_timeout))
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .redirect(Policy::none()) // Handle redirects manually
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed implementation of [`Fetch`]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_redirects: u32,
    retry_times: u32,
}

impl HttpFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            max_redirects: config.max_redirects,
            retry_times: config.retry_times,
        })
    }

    /// Fetches a URL, retrying transient failures up to `retry_times` times
    ///
    /// Only the last outcome is returned; earlier tries leave no trace beyond
    /// a debug log line.
    pub async fn fetch_url(&self, url: &str) -> FetchResult {
        let mut retries = 0;

        loop {
            let result = self.fetch_once(url).await;
            if !result.is_retryable() {
                return result;
            }

            if retries >= self.retry_times {
                if self.retry_times > 0 {
                    tracing::debug!("Gave up retrying {} (failed {} times)", url, retries + 1);
                }
                return result;
            }

            retries += 1;
            tracing::debug!(
                "Retrying {} (failed {} times): {}",
                url,
                retries,
                describe(&result)
            );
        }
    }

    /// One try at a URL, following up to `max_redirects` redirects
    ///
    /// # Request Flow
    ///
    /// 1. Send GET request
    /// 2. On 301/302/303/307/308 with a usable Location header, record the
    ///    hop and request the new location
    /// 3. Capture headers; read the body only for parseable content types
    /// 4. An HTML body with a meta refresh under 100 seconds is another hop
    /// 5. Final status 4xx/5xx → `HttpError`, otherwise `Success`
    ///
    /// Transport errors at any hop end the try.
    async fn fetch_once(&self, url: &str) -> FetchResult {
        let failure = |failure: FetchFailure| FetchResult::Failure {
            request_url: url.to_string(),
            failure,
        };

        let mut current = match Url::parse(url) {
            Ok(u) => u,
            Err(e) => return failure(FetchFailure::Other(format!("Invalid URL: {}", e))),
        };
        let mut redirects = Vec::new();

        loop {
            let response = match self.client.get(current.clone()).send().await {
                Ok(response) => response,
                Err(e) => return failure(classify_transport_error(&e)),
            };

            let status = response.status();

            if is_followed_redirect(status.as_u16()) {
                if let Some(next) = redirect_target(&current, response.headers()) {
                    if redirects.len() as u32 >= self.max_redirects {
                        tracing::debug!("Redirect limit reached at {}", current);
                        return failure(FetchFailure::TooManyRedirects);
                    }

                    tracing::trace!("{} redirected ({}) to {}", current, status.as_u16(), next);
                    redirects.push(RedirectHop {
                        url: current.to_string(),
                        reason: status.as_u16().to_string(),
                    });
                    current = next;
                    continue;
                }
            }

            let headers = collect_headers(response.headers());
            let response_url = response.url().to_string();
            let content_type = headers
                .get(CONTENT_TYPE.as_str())
                .and_then(|values| values.first())
                .map(String::as_str);

            let body = if is_queryable(content_type) {
                match response.text().await {
                    Ok(body) => body,
                    Err(e) => return failure(classify_transport_error(&e)),
                }
            } else {
                String::new()
            };

            let is_html = content_type.map_or(true, |ct| ct.to_ascii_lowercase().contains("html"));
            if is_html {
                if let Some(next) = meta_refresh_target(&body, &current) {
                    if redirects.len() as u32 >= self.max_redirects {
                        tracing::debug!("Redirect limit reached at {}", current);
                        return failure(FetchFailure::TooManyRedirects);
                    }

                    tracing::trace!("{} refreshed to {}", current, next);
                    redirects.push(RedirectHop {
                        url: current.to_string(),
                        reason: META_REFRESH_REASON.to_string(),
                    });
                    current = next;
                    continue;
                }
            }

            return FetchResult::from_page(FetchedPage {
                request_url: url.to_string(),
                response_url,
                status: status.as_u16(),
                headers,
                body,
                redirects,
            });
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult {
        self.fetch_url(url).await
    }
}

fn describe(result: &FetchResult) -> String {
    match result {
        FetchResult::Success(page) => format!("HTTP status {}", page.status),
        FetchResult::Failure { failure, .. } => failure.to_string(),
    }
}

fn is_followed_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

fn redirect_target(current: &Url, headers: &HeaderMap) -> Option<Url> {
    let location = headers.get(LOCATION)?.to_str().ok()?;
    let next = current.join(location.trim()).ok()?;
    matches!(next.scheme(), "http" | "https").then_some(next)
}

/// Flattens a header map into lowercased names and ordered value lists
pub fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut collected: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (name, value) in headers {
        let value = match value.to_str() {
            Ok(v) => v.to_string(),
            Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
        };
        collected
            .entry(name.as_str().to_ascii_lowercase())
            .or_default()
            .push(value);
    }

    collected
}

/// Maps a reqwest error onto the closed failure set
///
/// | Condition | Failure |
/// |-----------|---------|
/// | Connect or read deadline exceeded | `Timeout` |
/// | Host name did not resolve | `DnsLookup` |
/// | Certificate / handshake problem | `Tls` |
/// | Any other connect error | `Connection` |
/// | Redirect policy error | `TooManyRedirects` |
/// | Anything else | `Other` |
pub fn classify_transport_error(err: &reqwest::Error) -> FetchFailure {
    let source: &(dyn StdError + 'static) = err;

    if err.is_timeout() || chain_has_timeout(source) {
        FetchFailure::Timeout
    } else if is_dns_failure(source) {
        FetchFailure::DnsLookup
    } else if chain_mentions(source, &["certificate", "tls", "handshake"]) {
        FetchFailure::Tls(err.to_string())
    } else if err.is_connect() {
        FetchFailure::Connection(err.to_string())
    } else if err.is_redirect() {
        FetchFailure::TooManyRedirects
    } else {
        FetchFailure::Other(err.to_string())
    }
}

/// Returns true if any error in the chain reports a name-resolution failure
pub fn is_dns_failure(err: &(dyn StdError + 'static)) -> bool {
    chain_mentions(
        err,
        &[
            "dns error",
            "failed to lookup address",
            "name or service not known",
            "no such host",
            "nodename nor servname",
        ],
    )
}

fn chain_has_timeout(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return true;
            }
        }
        current = e.source();
    }
    false
}

fn chain_mentions(err: &(dyn StdError + 'static), needles: &[&str]) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        let message = e.to_string().to_ascii_lowercase();
        if needles.iter().any(|needle| message.contains(needle)) {
            return true;
        }
        current = e.source();
    }
    false
}
