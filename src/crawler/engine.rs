//! Crawl decision logic
//!
//! The engine turns fetch outcomes into events and decides which discovered
//! links are worth fetching. It performs no I/O and keeps no per-crawl state,
//! so one engine can be shared by any number of concurrent fetch tasks.

use crate::config::Config;
use crate::crawler::classifier::{classify, Classification};
use crate::crawler::correlator::PageCorrelator;
use crate::crawler::fetcher::{FetchResult, FetchedPage};
use crate::crawler::parser::ExtractedLink;
use crate::events::{CrawlEvent, IdGenerator};
use crate::url::ScopeFilter;
use crate::ConfigError;
use std::sync::Arc;

/// What one engine step produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStep {
    /// Events to emit, in order
    pub events: Vec<CrawlEvent>,
    /// URLs to hand to the scheduler
    pub follow: Vec<String>,
}

/// Drives traversal decisions for one site
#[derive(Clone)]
pub struct CrawlEngine {
    seed_url: String,
    scope: ScopeFilter,
    ids: Arc<dyn IdGenerator>,
    correlator: PageCorrelator,
}

impl CrawlEngine {
    pub fn new(seed_url: &str, scope: ScopeFilter, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            seed_url: seed_url.to_string(),
            scope,
            correlator: PageCorrelator::new(Arc::clone(&ids)),
            ids,
        }
    }

    /// Builds an engine from the scope section of a configuration
    pub fn from_config(config: &Config, ids: Arc<dyn IdGenerator>) -> Result<Self, ConfigError> {
        let scope = config.scope_filter()?;
        let seed = config
            .start_url()
            .ok_or_else(|| ConfigError::Validation("start-url is required".to_string()))?;
        Ok(Self::new(seed, scope, ids))
    }

    pub fn seed_url(&self) -> &str {
        &self.seed_url
    }

    /// Opening step: the synthetic root link, then a request for the seed
    ///
    /// The seed is requested unconditionally; the scope only applies to
    /// discovered links.
    pub fn start(&self) -> CrawlStep {
        CrawlStep {
            events: vec![CrawlEvent::root_link(&self.seed_url)],
            follow: vec![self.seed_url.clone()],
        }
    }

    /// Returns true if a discovered link should be fetched
    pub fn should_follow(&self, link: &ExtractedLink) -> bool {
        !link.nofollow && self.scope.should_follow(&link.url)
    }

    /// Turns the outcome of one fetch attempt into events and follow-ups
    ///
    /// | Outcome | Events | Follow-ups |
    /// |---------|--------|------------|
    /// | Success | data, headers, response, links | in-scope followable links |
    /// | HTTP error | same as success | same as success |
    /// | DNS failure | `dns_lookup_error` | none |
    /// | Timeout | `timeout_error` | none |
    /// | Other failure | none | none |
    pub fn handle(&self, result: &FetchResult) -> CrawlStep {
        match result {
            FetchResult::Success(page) => self.page_step(page),
            FetchResult::Failure {
                request_url,
                failure,
            } => match classify(failure) {
                Classification::HttpError(page) => {
                    tracing::debug!("HTTP {} for {}", page.status, request_url);
                    self.page_step(page)
                }
                classification => {
                    let id = self.ids.next_id();
                    match classification.error_event(&id, request_url) {
                        Some(event) => {
                            tracing::debug!("{} for {}", classification.kind(), request_url);
                            CrawlStep {
                                events: vec![event],
                                follow: Vec::new(),
                            }
                        }
                        None => {
                            tracing::warn!(
                                "Dropping unclassified fetch failure for {}: {}",
                                request_url,
                                failure
                            );
                            CrawlStep::default()
                        }
                    }
                }
            },
        }
    }

    fn page_step(&self, page: &FetchedPage) -> CrawlStep {
        let correlated = self.correlator.correlate(page);

        let follow = correlated
            .links
            .iter()
            .filter(|link| {
                let follow = self.should_follow(link);
                tracing::trace!(
                    "Link {} -> {} (nofollow: {}, follow: {})",
                    page.response_url,
                    link.url,
                    link.nofollow,
                    follow
                );
                follow
            })
            .map(|link| link.url.clone())
            .collect();

        CrawlStep {
            events: correlated.events,
            follow,
        }
    }
}

impl std::fmt::Debug for CrawlEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlEngine")
            .field("seed_url", &self.seed_url)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
