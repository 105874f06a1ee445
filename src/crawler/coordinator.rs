//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Seeding the frontier and emitting the root link
//! - Dispatching fetches concurrently, bounded by the scheduler
//! - Running the engine step for each completed fetch
//! - Writing events to the sink and feeding follow-ups back to the scheduler

use crate::config::Config;
use crate::crawler::engine::{CrawlEngine, CrawlStep};
use crate::crawler::fetcher::{Fetch, FetchResult, HttpFetcher};
use crate::crawler::scheduler::{QueuedUrl, Scheduler};
use crate::events::{CrawlEvent, IdGenerator, UuidIdGenerator};
use crate::output::{open_sink, CrawlStatistics, EventSink};
use crate::state::PageState;
use crate::{ConfigError, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Outcome of one fetch task
struct Attempt {
    queued: QueuedUrl,
    result: FetchResult,
    step: CrawlStep,
}

/// Main crawler coordinator structure
pub struct Coordinator<F, S> {
    engine: Arc<CrawlEngine>,
    fetcher: Arc<F>,
    scheduler: Scheduler,
    sink: S,
    stats: CrawlStatistics,
}

impl<F, S> Coordinator<F, S>
where
    F: Fetch + 'static,
    S: EventSink,
{
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `engine` - Traversal decisions and event construction
    /// * `fetcher` - Performs the HTTP requests
    /// * `scheduler` - Frontier, visited set and concurrency limits
    /// * `sink` - Receives every emitted event
    pub fn new(engine: CrawlEngine, fetcher: F, scheduler: Scheduler, sink: S) -> Self {
        Self {
            engine: Arc::new(engine),
            fetcher: Arc::new(fetcher),
            scheduler,
            sink,
            stats: CrawlStatistics::new(),
        }
    }

    /// Runs the main crawl loop until the frontier is exhausted
    ///
    /// This is the core crawling logic that:
    /// 1. Emits the root link and seeds the frontier
    /// 2. Dispatches as many fetches as the scheduler allows
    /// 3. Waits for any fetch to complete
    /// 4. Writes that attempt's events and queues its follow-ups
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlStatistics)` - Counts of everything emitted
    /// * `Err(Site2GraphError)` - The sink failed or a task panicked
    pub async fn run(&mut self) -> Result<CrawlStatistics> {
        tracing::info!("Starting crawl at {}", self.engine.seed_url());

        let start = self.engine.start();
        for event in &start.events {
            self.emit(event)?;
        }
        for url in &start.follow {
            self.scheduler.seed(url)?;
        }

        let mut tasks: JoinSet<Attempt> = JoinSet::new();
        let mut pages_crawled: u64 = 0;
        let start_time = Instant::now();

        loop {
            while let Some(scheduled) = self.scheduler.try_next()? {
                let engine = Arc::clone(&self.engine);
                let fetcher = Arc::clone(&self.fetcher);
                let permit = scheduled.permit;
                let queued = scheduled.url;

                tasks.spawn(async move {
                    let result = fetcher.fetch(&queued.url).await;
                    let step = engine.handle(&result);
                    drop(permit);
                    Attempt {
                        queued,
                        result,
                        step,
                    }
                });
            }

            if tasks.is_empty() {
                if self.scheduler.is_empty() {
                    tracing::info!("Frontier is empty, crawl complete");
                    break;
                }
                // Only the download delay can hold back an idle scheduler
                self.scheduler.wait_for_dispatch().await;
                continue;
            }

            // Wake for whichever comes first: a finished fetch or the end of
            // the download delay holding back the frontier
            let joined = match self.scheduler.dispatch_delay() {
                Some(wait) => tokio::select! {
                    joined = tasks.join_next() => joined,
                    _ = tokio::time::sleep(wait) => continue,
                },
                None => tasks.join_next().await,
            };
            let Some(joined) = joined else {
                continue;
            };
            let attempt = joined?;
            self.complete(attempt)?;

            pages_crawled += 1;
            if pages_crawled % 10 == 0 {
                let elapsed = start_time.elapsed();
                let rate = pages_crawled as f64 / elapsed.as_secs_f64();
                tracing::info!(
                    "Progress: {} pages crawled, {} in frontier, {} in flight, {:.2} pages/sec",
                    pages_crawled,
                    self.scheduler.frontier_size(),
                    self.scheduler.in_flight(),
                    rate
                );
            }
        }

        self.sink.finish()?;

        tracing::info!(
            "Crawl completed: {} fetch attempts in {:?}",
            pages_crawled,
            start_time.elapsed()
        );
        self.stats.log_summary();

        Ok(self.stats.clone())
    }

    /// Returns the scheduler, e.g. to inspect page states after a run
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Consumes the coordinator and returns its sink
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn complete(&mut self, attempt: Attempt) -> Result<()> {
        let Attempt {
            queued,
            result,
            step,
        } = attempt;

        let (state, response_url) = match result.page() {
            Some(page) => (PageState::Succeeded, Some(page.response_url.as_str())),
            None => (PageState::Failed, None),
        };
        tracing::debug!("{} -> {}", queued.url, state);
        self.scheduler.complete(&queued.url, state, response_url)?;

        self.apply(step, queued.depth + 1)
    }

    /// Writes a step's events and offers its follow-ups at `depth`
    fn apply(&mut self, step: CrawlStep, depth: u32) -> Result<()> {
        for event in &step.events {
            self.emit(event)?;
        }

        for url in &step.follow {
            if let Err(reason) = self.scheduler.offer(url, depth) {
                tracing::trace!("Not scheduling {}: {:?}", url, reason);
            }
        }
        Ok(())
    }

    fn emit(&mut self, event: &CrawlEvent) -> Result<()> {
        self.sink.emit(event)?;
        self.stats.record(event);
        Ok(())
    }
}

/// Runs a complete crawl described by `config`
///
/// Builds the HTTP fetcher, scheduler and output sink from the configuration
/// and drives the crawl to completion.
///
/// # Arguments
///
/// * `config` - A validated configuration
/// * `config_hash` - Hash of the configuration file, recorded by the SQLite sink
pub async fn run_crawl(config: &Config, config_hash: Option<&str>) -> Result<CrawlStatistics> {
    let ids: Arc<dyn IdGenerator> = Arc::new(UuidIdGenerator);
    let engine = CrawlEngine::from_config(config, ids)?;
    let fetcher = HttpFetcher::new(&config.fetcher)?;
    let scheduler = Scheduler::new(config.scheduler.clone());

    let start_url = config
        .start_url()
        .ok_or_else(|| ConfigError::Validation("start-url is required".to_string()))?;
    let sink = open_sink(&config.output, start_url, config_hash)?;

    let mut coordinator = Coordinator::new(engine, fetcher, scheduler, sink);
    coordinator.run().await
}
