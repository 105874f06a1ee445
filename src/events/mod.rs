//! Crawl event model
//!
//! Every observable result of a crawl is a [`CrawlEvent`]. Events derived from
//! one fetch attempt share a correlation id so consumers can join them back
//! together; the synthetic root link carries the literal id [`ROOT_ID`].

mod ids;

pub use ids::{CounterIdGenerator, IdGenerator, UuidIdGenerator};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Correlation id, `url` and status of the synthetic root link
pub const ROOT_ID: &str = "ROOT";
pub const ROOT_STATUS: &str = "200";

/// A single entry of the output stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrawlEvent {
    Response(ResponseEvent),
    Headers(HeadersEvent),
    Data(DataEvent),
    Link(LinkEvent),
    DnsLookupError(FetchErrorEvent),
    TimeoutError(FetchErrorEvent),
}

/// Final response of a fetch attempt, with the redirect chain that led to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEvent {
    pub id: String,
    pub request_url: String,
    pub response_url: String,
    pub status: String,
    /// URLs requested before landing on `response_url`, oldest first
    pub redirect_urls: Vec<String>,
    /// Reason for each hop, index-aligned with `redirect_urls`
    pub redirect_reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadersEvent {
    pub id: String,
    pub url: String,
    pub status: String,
    pub headers: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEvent {
    pub id: String,
    pub url: String,
    pub status: String,
    pub data: PageData,
}

/// Metadata mined from a page body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageData {
    pub title: Option<String>,
    pub meta_description: Option<String>,
}

/// An outbound link discovered on `url`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEvent {
    pub id: String,
    pub url: String,
    pub status: String,
    pub target: String,
    pub nofollow: bool,
}

/// Payload shared by the transport error events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchErrorEvent {
    pub id: String,
    pub request_url: String,
}

impl CrawlEvent {
    /// Builds the synthetic link that introduces the seed URL
    pub fn root_link(seed_url: &str) -> Self {
        Self::Link(LinkEvent {
            id: ROOT_ID.to_string(),
            url: ROOT_ID.to_string(),
            status: ROOT_STATUS.to_string(),
            target: seed_url.to_string(),
            nofollow: false,
        })
    }

    /// Correlation id of this event
    pub fn id(&self) -> &str {
        match self {
            Self::Response(e) => &e.id,
            Self::Headers(e) => &e.id,
            Self::Data(e) => &e.id,
            Self::Link(e) => &e.id,
            Self::DnsLookupError(e) | Self::TimeoutError(e) => &e.id,
        }
    }

    /// The `type` tag used in serialized output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Response(_) => "response",
            Self::Headers(_) => "headers",
            Self::Data(_) => "data",
            Self::Link(_) => "link",
            Self::DnsLookupError(_) => "dns_lookup_error",
            Self::TimeoutError(_) => "timeout_error",
        }
    }

    /// The page URL the event describes (the request URL for errors)
    pub fn url(&self) -> &str {
        match self {
            Self::Response(e) => &e.response_url,
            Self::Headers(e) => &e.url,
            Self::Data(e) => &e.url,
            Self::Link(e) => &e.url,
            Self::DnsLookupError(e) | Self::TimeoutError(e) => &e.request_url,
        }
    }

    /// Textual HTTP status; error events carry none
    pub fn status(&self) -> Option<&str> {
        match self {
            Self::Response(e) => Some(&e.status),
            Self::Headers(e) => Some(&e.status),
            Self::Data(e) => Some(&e.status),
            Self::Link(e) => Some(&e.status),
            Self::DnsLookupError(_) | Self::TimeoutError(_) => None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.id() == ROOT_ID
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::DnsLookupError(_) | Self::TimeoutError(_))
    }
}
