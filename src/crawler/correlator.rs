//! Per-page event correlation
//!
//! Every fetched page is described by one data, one headers and one response
//! event followed by a link event per extracted link, all sharing one freshly
//! generated correlation id.

use crate::crawler::fetcher::FetchedPage;
use crate::crawler::parser::{parse_page, ExtractedLink};
use crate::events::{
    CrawlEvent, DataEvent, HeadersEvent, IdGenerator, LinkEvent, ResponseEvent,
};
use std::sync::Arc;

/// Events produced for one page, plus the links they report
#[derive(Debug, Clone)]
pub struct CorrelatedPage {
    pub id: String,
    /// Data, headers, response, then one link event per entry of `links`
    pub events: Vec<CrawlEvent>,
    pub links: Vec<ExtractedLink>,
}

/// Assembles the correlated event set for fetched pages
#[derive(Clone)]
pub struct PageCorrelator {
    ids: Arc<dyn IdGenerator>,
}

impl PageCorrelator {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self { ids }
    }

    /// Correlates a page under a fresh id
    pub fn correlate(&self, page: &FetchedPage) -> CorrelatedPage {
        self.correlate_with_id(self.ids.next_id(), page)
    }

    /// Correlates a page under an id chosen by the caller
    pub fn correlate_with_id(&self, id: String, page: &FetchedPage) -> CorrelatedPage {
        let parsed = parse_page(&page.body, page.content_type(), &page.response_url);
        let status = page.status.to_string();

        let mut events = Vec::with_capacity(3 + parsed.links.len());

        events.push(CrawlEvent::Data(DataEvent {
            id: id.clone(),
            url: page.response_url.clone(),
            status: status.clone(),
            data: parsed.data,
        }));

        events.push(CrawlEvent::Headers(HeadersEvent {
            id: id.clone(),
            url: page.response_url.clone(),
            status: status.clone(),
            headers: page.headers.clone(),
        }));

        let (redirect_urls, redirect_reasons): (Vec<String>, Vec<String>) = page
            .redirects
            .iter()
            .map(|hop| (hop.url.clone(), hop.reason.clone()))
            .unzip();

        events.push(CrawlEvent::Response(ResponseEvent {
            id: id.clone(),
            request_url: page.request_url.clone(),
            response_url: page.response_url.clone(),
            status: status.clone(),
            redirect_urls,
            redirect_reasons,
        }));

        events.extend(parsed.links.iter().map(|link| {
            CrawlEvent::Link(LinkEvent {
                id: id.clone(),
                url: page.response_url.clone(),
                status: status.clone(),
                target: link.url.clone(),
                nofollow: link.nofollow,
            })
        }));

        CorrelatedPage {
            id,
            events,
            links: parsed.links,
        }
    }
}

impl std::fmt::Debug for PageCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCorrelator").finish_non_exhaustive()
    }
}
