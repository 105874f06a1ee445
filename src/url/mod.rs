//! URL handling module for site2graph
//!
//! This module provides origin extraction, the crawl scope filter, and the
//! canonical form used to recognise repeat requests.

mod canonical;
mod origin;
mod scope;

// Re-export main functions
pub use canonical::canonicalize_url;
pub use origin::{is_same_origin, origin_of};
pub use scope::{compile_anchored, ScopeFilter};
