//! Configuration module for site2graph
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section is optional; command-line flags are layered on top of the file
//! before validation.
//!
//! # Example
//!
//! ```no_run
//! use site2graph::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("site2graph.toml")).unwrap();
//! println!("Crawl starts at: {:?}", config.scope.start_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, FetcherConfig, OutputConfig, OutputFormat, SchedulerConfig, ScopeConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
