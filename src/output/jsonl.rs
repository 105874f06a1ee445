//! JSON-lines event sink
//!
//! Writes one JSON object per line. Each object carries a `"type"` field
//! (`response`, `headers`, `data`, `link`, `dns_lookup_error`,
//! `timeout_error`) alongside the event's own fields.

use crate::events::CrawlEvent;
use crate::output::traits::{EventSink, OutputResult};
use std::fs::File;
use std::io::{self, BufWriter, Stdout, Write};
use std::path::Path;

/// Writes events as newline-delimited JSON
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: u64,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Number of events written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Returns the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<BufWriter<Stdout>> {
    pub fn stdout() -> Self {
        Self::new(BufWriter::new(io::stdout()))
    }
}

impl JsonLinesSink<BufWriter<File>> {
    /// Creates (or truncates) a file at `path`
    pub fn create(path: &Path) -> OutputResult<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn emit(&mut self, event: &CrawlEvent) -> OutputResult<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        self.writer.flush()?;
        tracing::debug!("Wrote {} events", self.written);
        Ok(())
    }
}
