//! Per-URL crawl lifecycle tracking

mod page_state;

pub use page_state::PageState;
