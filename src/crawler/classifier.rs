//! Fetch failure classification
//!
//! Maps a [`FetchFailure`] onto the four outcomes the crawl distinguishes.
//! Checked in order: HTTP error, DNS lookup failure, timeout, anything else.

use crate::crawler::fetcher::{FetchFailure, FetchedPage};
use crate::events::{CrawlEvent, FetchErrorEvent};
use std::fmt;

/// Closed taxonomy of fetch failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The server answered with an error status; the page is still mined
    HttpError,
    DnsLookupError,
    TimeoutError,
    /// Any other transport failure; dropped without an event
    UnclassifiedFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HttpError => "http_error",
            Self::DnsLookupError => "dns_lookup_error",
            Self::TimeoutError => "timeout_error",
            Self::UnclassifiedFailure => "unclassified_failure",
        };
        f.write_str(name)
    }
}

/// Result of classifying one failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification<'a> {
    /// The page was reached; events are built from this response
    HttpError(&'a FetchedPage),
    DnsLookupError,
    TimeoutError,
    Unclassified,
}

impl Classification<'_> {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::HttpError(_) => ErrorKind::HttpError,
            Self::DnsLookupError => ErrorKind::DnsLookupError,
            Self::TimeoutError => ErrorKind::TimeoutError,
            Self::Unclassified => ErrorKind::UnclassifiedFailure,
        }
    }

    /// The error event for a transport failure
    ///
    /// Returns `None` for HTTP errors (they produce page events instead) and
    /// for unclassified failures (they produce nothing).
    pub fn error_event(&self, id: &str, request_url: &str) -> Option<CrawlEvent> {
        let payload = || FetchErrorEvent {
            id: id.to_string(),
            request_url: request_url.to_string(),
        };

        match self {
            Self::DnsLookupError => Some(CrawlEvent::DnsLookupError(payload())),
            Self::TimeoutError => Some(CrawlEvent::TimeoutError(payload())),
            Self::HttpError(_) | Self::Unclassified => None,
        }
    }
}

/// Classifies a fetch failure
pub fn classify(failure: &FetchFailure) -> Classification<'_> {
    match failure {
        FetchFailure::HttpError(page) => Classification::HttpError(page),
        FetchFailure::DnsLookup => Classification::DnsLookupError,
        FetchFailure::Timeout => Classification::TimeoutError,
        FetchFailure::Connection(_)
        | FetchFailure::Tls(_)
        | FetchFailure::TooManyRedirects
        | FetchFailure::Other(_) => Classification::Unclassified,
    }
}
