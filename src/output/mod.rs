//! Output module for recording crawl events
//!
//! This module handles:
//! - The [`EventSink`] trait every destination implements
//! - Newline-delimited JSON output (stdout or file)
//! - SQLite output with per-run bookkeeping
//! - Crawl statistics, live and read back from SQLite

mod jsonl;
mod sqlite_output;
pub mod stats;
mod traits;

pub use jsonl::JsonLinesSink;
pub use sqlite_output::{latest_run, load_statistics, RunRecord, RunStatus, SqliteSink, SCHEMA_SQL};
pub use stats::{print_statistics, CrawlStatistics};
pub use traits::{EventSink, OutputError, OutputResult};

use crate::config::{OutputConfig, OutputFormat};
use std::path::Path;

/// Opens the sink selected by the output configuration
///
/// # Arguments
///
/// * `config` - Output format and path (`-` means stdout)
/// * `start_url` - Seed URL, recorded by sinks that keep run metadata
/// * `config_hash` - Hash of the configuration file, if any
pub fn open_sink(
    config: &OutputConfig,
    start_url: &str,
    config_hash: Option<&str>,
) -> OutputResult<Box<dyn EventSink + Send>> {
    match config.format {
        OutputFormat::Jsonl if config.path == "-" => Ok(Box::new(JsonLinesSink::stdout())),
        OutputFormat::Jsonl => Ok(Box::new(JsonLinesSink::create(Path::new(&config.path))?)),
        OutputFormat::Sqlite => Ok(Box::new(SqliteSink::create(
            Path::new(&config.path),
            start_url,
            config_hash,
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CrawlEvent;

    #[test]
    fn test_open_jsonl_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let config = OutputConfig {
            format: OutputFormat::Jsonl,
            path: path.display().to_string(),
        };

        let mut sink = open_sink(&config, "http://example.com", None).unwrap();
        sink.emit(&CrawlEvent::root_link("http://example.com")).unwrap();
        sink.finish().unwrap();

        assert!(std::fs::read_to_string(&path).unwrap().contains("\"type\":\"link\""));
    }

    #[test]
    fn test_open_sqlite_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.db");
        let config = OutputConfig {
            format: OutputFormat::Sqlite,
            path: path.display().to_string(),
        };

        let mut sink = open_sink(&config, "http://example.com", Some("hash")).unwrap();
        sink.emit(&CrawlEvent::root_link("http://example.com")).unwrap();
        sink.finish().unwrap();
        drop(sink);

        let (run, stats) = load_statistics(&path).unwrap();
        assert_eq!(run.config_hash.as_deref(), Some("hash"));
        assert_eq!(stats.total_events(), 1);
    }
}
