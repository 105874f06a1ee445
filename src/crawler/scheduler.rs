//! Scheduler for managing the crawl frontier and dispatch pacing
//!
//! This module handles:
//! - FIFO frontier management for URLs to crawl
//! - Duplicate filtering by canonical URL
//! - Depth and URL-length limits
//! - Global concurrency limiting via a semaphore
//! - Spacing dispatches by the configured download delay
//! - Per-URL page state tracking

use crate::config::SchedulerConfig;
use crate::state::PageState;
use crate::url::canonicalize_url;
use crate::{Result, Site2GraphError};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A URL queued for fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUrl {
    /// The URL exactly as it will be requested
    pub url: String,

    /// Link distance from the seed (seed is 0)
    pub depth: u32,
}

/// A scheduled fetch holding a concurrency permit
///
/// The permit is released when this value (or the permit moved out of it)
/// is dropped.
#[derive(Debug)]
pub struct ScheduledFetch {
    pub url: QueuedUrl,
    pub permit: OwnedSemaphorePermit,
}

/// Why an offered URL was not queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Already queued, requested or visited
    Duplicate,
    /// Deeper than `max-depth`
    TooDeep,
    /// Longer than `max-url-length`
    TooLong,
    /// Not an absolute http(s) URL
    Unschedulable,
}

/// Scheduler owns the frontier queue, the visited set and dispatch limits
pub struct Scheduler {
    /// Global semaphore for limiting concurrent fetches
    semaphore: Arc<Semaphore>,

    /// URLs waiting to be fetched, in discovery order
    frontier: VecDeque<QueuedUrl>,

    /// Page state keyed by canonical URL
    states: HashMap<String, PageState>,

    /// Time of the most recent dispatch
    last_dispatch: Option<Instant>,

    config: SchedulerConfig,
}

impl Scheduler {
    /// Creates a new scheduler with an empty frontier
    ///
    /// # Arguments
    ///
    /// * `config` - The scheduler configuration
    pub fn new(config: SchedulerConfig) -> Self {
        let permits = config.max_concurrent_requests.max(1) as usize;

        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            frontier: VecDeque::new(),
            states: HashMap::new(),
            last_dispatch: None,
            config,
        }
    }

    /// Offers a URL to the frontier
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to fetch
    /// * `depth` - Link distance from the seed
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The URL was queued in state `Discovered`
    /// * `Err(Rejection)` - The URL was filtered out
    pub fn offer(&mut self, url: &str, depth: u32) -> std::result::Result<(), Rejection> {
        if self.config.max_url_length > 0 && url.len() > self.config.max_url_length {
            tracing::debug!("Ignoring link (url length > {}): {}", self.config.max_url_length, url);
            return Err(Rejection::TooLong);
        }

        if self.config.max_depth > 0 && depth > self.config.max_depth {
            tracing::debug!("Ignoring link (depth > {}): {}", self.config.max_depth, url);
            return Err(Rejection::TooDeep);
        }

        let key = match canonicalize_url(url) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!("Cannot schedule {}: {}", url, e);
                return Err(Rejection::Unschedulable);
            }
        };

        if self.states.contains_key(&key) {
            tracing::trace!("Filtered duplicate request: {}", url);
            return Err(Rejection::Duplicate);
        }

        self.states.insert(key, PageState::Discovered);
        self.frontier.push_back(QueuedUrl {
            url: url.to_string(),
            depth,
        });
        Ok(())
    }

    /// Queues the seed URL ahead of everything else
    ///
    /// The seed bypasses the depth and length limits and starts directly in
    /// `Requested`.
    pub fn seed(&mut self, url: &str) -> Result<()> {
        let key = canonicalize_url(url)?;
        self.states.insert(key, PageState::Requested);
        self.frontier.push_front(QueuedUrl {
            url: url.to_string(),
            depth: 0,
        });
        Ok(())
    }

    /// Takes the next URL if one can be dispatched right now
    ///
    /// Returns `None` when the frontier is empty, every permit is in use,
    /// or the download delay since the last dispatch has not yet elapsed.
    /// The returned URL has moved to `Requested`.
    pub fn try_next(&mut self) -> Result<Option<ScheduledFetch>> {
        if self.frontier.is_empty() || self.delay_remaining(Instant::now()).is_some() {
            return Ok(None);
        }

        let permit = match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => return Ok(None),
        };

        let Some(queued) = self.frontier.pop_front() else {
            return Ok(None);
        };

        if self.state_of(&queued.url) != Some(PageState::Requested) {
            self.transition(&queued.url, PageState::Requested)?;
        }
        self.last_dispatch = Some(Instant::now());

        tracing::debug!("Dispatching {} (depth {})", queued.url, queued.depth);
        Ok(Some(ScheduledFetch {
            url: queued,
            permit,
        }))
    }

    /// Sleeps until the download delay allows another dispatch
    pub async fn wait_for_dispatch(&self) {
        if let Some(wait) = self.delay_remaining(Instant::now()) {
            tokio::time::sleep(wait).await;
        }
    }

    /// Time until the next queued URL may be dispatched
    ///
    /// `None` when nothing is held back by the download delay: the frontier is
    /// empty, every permit is taken, or a URL can go out right now.
    pub fn dispatch_delay(&self) -> Option<Duration> {
        if self.frontier.is_empty() || self.semaphore.available_permits() == 0 {
            return None;
        }
        self.delay_remaining(Instant::now())
    }

    /// Records the outcome of a requested URL
    ///
    /// # Arguments
    ///
    /// * `url` - The URL as it was dispatched
    /// * `state` - `Succeeded` or `Failed`
    /// * `response_url` - Final URL after redirects, marked visited as well
    pub fn complete(&mut self, url: &str, state: PageState, response_url: Option<&str>) -> Result<()> {
        self.transition(url, state)?;

        if let Some(key) = response_url.and_then(|u| canonicalize_url(u).ok()) {
            self.states.entry(key).or_insert(state);
        }
        Ok(())
    }

    /// Returns the tracked state of a URL, if it was ever offered
    pub fn state_of(&self, url: &str) -> Option<PageState> {
        let key = canonicalize_url(url).ok()?;
        self.states.get(&key).copied()
    }

    /// Returns the number of tracked URLs in the given state
    pub fn count_in_state(&self, state: PageState) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }

    /// Returns the number of URLs in the frontier
    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }

    /// Returns whether the frontier is empty
    pub fn is_empty(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Returns the concurrency limit
    pub fn max_concurrent(&self) -> usize {
        self.config.max_concurrent_requests.max(1) as usize
    }

    /// Returns the number of fetches currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.max_concurrent() - self.semaphore.available_permits()
    }

    fn transition(&mut self, url: &str, to: PageState) -> Result<()> {
        let key = canonicalize_url(url)?;
        let state = self.states.get_mut(&key).ok_or_else(|| Site2GraphError::InvalidTransition {
            url: url.to_string(),
            from: PageState::Discovered,
            to,
        })?;

        if !state.can_transition_to(to) {
            return Err(Site2GraphError::InvalidTransition {
                url: url.to_string(),
                from: *state,
                to,
            });
        }

        *state = to;
        Ok(())
    }

    fn delay_remaining(&self, now: Instant) -> Option<Duration> {
        let delay = Duration::from_millis(self.config.download_delay);
        let last = self.last_dispatch?;
        let ready_at = last + delay;
        (ready_at > now).then(|| ready_at - now)
    }
}
