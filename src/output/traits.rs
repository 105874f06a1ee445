//! Event sink trait and output errors
//!
//! Every crawl writes its event stream through an [`EventSink`]. Sinks see
//! the events of one fetch attempt contiguously and in emission order.

use crate::events::CrawlEvent;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize event: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("No crawl runs found in {0}")]
    NoRuns(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for crawl events
pub trait EventSink {
    /// Records one event
    ///
    /// # Arguments
    ///
    /// * `event` - The event to record
    fn emit(&mut self, event: &CrawlEvent) -> OutputResult<()>;

    /// Flushes buffered output and closes the run
    fn finish(&mut self) -> OutputResult<()>;
}

/// In-memory sink, mostly useful for tests and embedding
impl EventSink for Vec<CrawlEvent> {
    fn emit(&mut self, event: &CrawlEvent) -> OutputResult<()> {
        self.push(event.clone());
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        Ok(())
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn emit(&mut self, event: &CrawlEvent) -> OutputResult<()> {
        (**self).emit(event)
    }

    fn finish(&mut self) -> OutputResult<()> {
        (**self).finish()
    }
}
