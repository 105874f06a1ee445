//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - Link normalization and page metadata extraction
//! - Classification of failed fetch attempts
//! - Correlation of one attempt's events under a shared id
//! - The crawl engine that decides what to emit and what to follow
//! - HTTP fetching with manual redirect handling and retries
//! - Request scheduling and overall crawl coordination

mod classifier;
mod coordinator;
mod correlator;
mod engine;
mod fetcher;
mod parser;
mod scheduler;

pub use classifier::{classify, Classification, ErrorKind};
pub use coordinator::{run_crawl, Coordinator};
pub use correlator::{CorrelatedPage, PageCorrelator};
pub use engine::{CrawlEngine, CrawlStep};
pub use fetcher::{
    build_http_client, classify_transport_error, collect_headers, is_dns_failure, Fetch,
    FetchFailure, FetchResult, FetchedPage, HttpFetcher, RedirectHop, META_REFRESH_REASON,
    RETRY_HTTP_CODES,
};
pub use parser::{
    extract_links, extract_metadata, filter_link_value, is_queryable, meta_refresh_target,
    parse_page, ExtractedLink, ParsedPage,
};
pub use scheduler::{QueuedUrl, Rejection, ScheduledFetch, Scheduler};
