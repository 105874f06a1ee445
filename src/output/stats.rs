//! Crawl statistics
//!
//! Statistics are accumulated live from the event stream during a crawl and
//! can be read back from a SQLite output file afterwards.

use crate::events::CrawlEvent;
use std::collections::BTreeMap;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// Count of events by `type` tag
    pub events_by_type: BTreeMap<String, u64>,

    /// Pages that produced a response (including HTTP error statuses)
    pub pages: u64,

    /// Pages whose final status was 4xx or 5xx
    pub http_errors: u64,

    /// Links reported, excluding the root link
    pub links: u64,

    /// DNS and timeout failures
    pub errors: u64,
}

impl CrawlStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts for one emitted event
    pub fn record(&mut self, event: &CrawlEvent) {
        *self
            .events_by_type
            .entry(event.kind().to_string())
            .or_insert(0) += 1;

        match event {
            CrawlEvent::Response(response) => {
                self.pages += 1;
                if is_error_status(&response.status) {
                    self.http_errors += 1;
                }
            }
            CrawlEvent::Link(_) if !event.is_root() => self.links += 1,
            CrawlEvent::DnsLookupError(_) | CrawlEvent::TimeoutError(_) => self.errors += 1,
            _ => {}
        }
    }

    /// Total number of events recorded
    pub fn total_events(&self) -> u64 {
        self.events_by_type.values().sum()
    }

    /// Count for a single `type` tag
    pub fn count(&self, kind: &str) -> u64 {
        self.events_by_type.get(kind).copied().unwrap_or(0)
    }

    /// Logs a one-line summary
    pub fn log_summary(&self) {
        tracing::info!(
            "Crawl finished: {} pages, {} links, {} HTTP errors, {} fetch errors, {} events",
            self.pages,
            self.links,
            self.http_errors,
            self.errors,
            self.total_events()
        );
    }
}

fn is_error_status(status: &str) -> bool {
    status.parse::<u16>().map(|s| s >= 400).unwrap_or(false)
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Pages fetched: {}", stats.pages);
    println!("  Links found: {}", stats.links);
    println!("  HTTP error pages: {}", stats.http_errors);
    println!("  Fetch errors: {}", stats.errors);
    println!();

    println!("Events by Type:");
    let total = stats.total_events();
    let mut counts: Vec<_> = stats.events_by_type.iter().collect();
    counts.sort_by(|a, b| b.1.cmp(a.1));

    for (kind, count) in counts {
        let percentage = if total > 0 {
            (*count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", kind, count, percentage);
    }
    println!();

    let attempts = stats.pages + stats.errors;
    let success_rate = if attempts > 0 {
        (stats.pages as f64 / attempts as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Response Rate: {:.1}% ({} / {} attempts answered)",
        success_rate, stats.pages, attempts
    );
}
