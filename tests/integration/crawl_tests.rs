//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use site2graph::config::{parse_config, validate, Config, OutputFormat};
use site2graph::crawler::{
    run_crawl, Coordinator, CrawlEngine, FetchFailure, FetchResult, HttpFetcher, Scheduler,
};
use site2graph::events::{CounterIdGenerator, CrawlEvent, ResponseEvent};
use site2graph::output::load_statistics;
use site2graph::state::PageState;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// set_body_string would force text/plain, so bodies carry their mime type
fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

async fn mount_html(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_raw(body, "text/html"))
        .mount(server)
        .await;
}

async fn request_count(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

/// Creates a test configuration rooted at `seed`
fn create_test_config(seed: &str) -> Config {
    let mut config = Config::default();
    config.scope.start_url = Some(seed.to_string());
    config.fetcher.request_timeout = 5;
    config.fetcher.connect_timeout = 2;
    config.fetcher.retry_times = 0;
    config.scheduler.max_concurrent_requests = 4;
    config
}

fn engine_for(config: &Config) -> CrawlEngine {
    CrawlEngine::from_config(config, Arc::new(CounterIdGenerator::new("req-")))
        .expect("Failed to build engine")
}

async fn crawl_to_vec(config: &Config) -> Vec<CrawlEvent> {
    validate(config).expect("Config should be valid");
    let engine = engine_for(config);
    let fetcher = HttpFetcher::new(&config.fetcher).expect("Failed to build client");
    let scheduler = Scheduler::new(config.scheduler.clone());
    let mut coordinator = Coordinator::new(engine, fetcher, scheduler, Vec::new());
    coordinator.run().await.expect("Crawl failed");
    coordinator.into_sink()
}

fn responses(events: &[CrawlEvent]) -> Vec<&ResponseEvent> {
    events
        .iter()
        .filter_map(|e| match e {
            CrawlEvent::Response(r) => Some(r),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(
        &server,
        "/",
        200,
        r#"<html><head><title>Home</title><meta name="description" content="Front page"></head>
        <body>
            <a href="/about">About</a>
            <a href="/missing">Missing</a>
            <a href="/private" rel="nofollow">Private</a>
            <a href="http://other.invalid/">Elsewhere</a>
            <a href="tel:+15551234">Call</a>
        </body></html>"#,
    )
    .await;
    mount_html(&server, "/about", 200, r#"<title>About</title><a href="/">Home</a>"#).await;

    let config = create_test_config(&format!("{}/", base));
    let events = crawl_to_vec(&config).await;

    // Root link comes first
    assert!(events[0].is_root());
    match &events[0] {
        CrawlEvent::Link(link) => assert_eq!(link.target, format!("{}/", base)),
        other => panic!("Expected root link, got {:?}", other),
    }

    // Three pages answered: /, /about, and the unmatched /missing (wiremock 404)
    let pages = responses(&events);
    assert_eq!(pages.len(), 3);
    let missing = pages
        .iter()
        .find(|r| r.request_url.ends_with("/missing"))
        .expect("404 page should still produce a response event");
    assert_eq!(missing.status, "404");

    // Home page metadata
    let home_data = events
        .iter()
        .find_map(|e| match e {
            CrawlEvent::Data(d) if d.url == format!("{}/", base) => Some(d),
            _ => None,
        })
        .expect("Home page data event");
    assert_eq!(home_data.data.title.as_deref(), Some("Home"));
    assert_eq!(home_data.data.meta_description.as_deref(), Some("Front page"));

    // Every link is reported, tel: is not, and nofollow is flagged
    let home_links: Vec<(&str, bool)> = events
        .iter()
        .filter_map(|e| match e {
            CrawlEvent::Link(l) if l.url == format!("{}/", base) => Some((l.target.as_str(), l.nofollow)),
            _ => None,
        })
        .collect();
    assert_eq!(home_links.len(), 4);
    assert!(home_links.contains(&("http://other.invalid/", false)));
    assert!(home_links.contains(&(format!("{}/private", base).as_str(), true)));
    assert!(!home_links.iter().any(|(t, _)| t.starts_with("tel:")));

    // Nofollow and off-site links were never requested
    let requested: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(requested.len(), 3);
    assert!(!requested.contains(&"/private".to_string()));
    assert!(!events.iter().any(|e| e.is_error()));
}

#[tokio::test]
async fn test_events_grouped_by_attempt() {
    let server = MockServer::start().await;
    mount_html(&server, "/", 200, r#"<a href="/a">A</a><a href="/b">B</a>"#).await;
    mount_html(&server, "/a", 200, r#"<a href="/b">B</a>"#).await;
    mount_html(&server, "/b", 200, "<p>leaf</p>").await;

    let config = create_test_config(&format!("{}/", server.uri()));
    let events = crawl_to_vec(&config).await;

    let mut blocks: Vec<(String, Vec<&str>)> = Vec::new();
    for event in &events[1..] {
        let continues = blocks.last().map_or(false, |(id, _)| id == event.id());
        if continues {
            if let Some((_, kinds)) = blocks.last_mut() {
                kinds.push(event.kind());
            }
        } else {
            blocks.push((event.id().to_string(), vec![event.kind()]));
        }
    }

    assert_eq!(blocks.len(), 3, "one contiguous block per fetch attempt");
    for (_, kinds) in &blocks {
        assert_eq!(&kinds[..3], &["data", "headers", "response"]);
        assert!(kinds[3..].iter().all(|k| *k == "link"));
    }
}

#[tokio::test]
async fn test_redirect_chain_recorded() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/mid"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mid"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/new"))
        .mount(&server)
        .await;
    mount_html(&server, "/new", 200, r#"<a href="/old">Old</a><a href="/new">Self</a>"#).await;

    let config = create_test_config(&format!("{}/old", base));
    let events = crawl_to_vec(&config).await;

    let pages = responses(&events);
    assert_eq!(pages.len(), 1, "neither /old nor /new is fetched twice");

    let response = pages[0];
    assert_eq!(response.request_url, format!("{}/old", base));
    assert_eq!(response.response_url, format!("{}/new", base));
    assert_eq!(response.status, "200");
    assert_eq!(
        response.redirect_urls,
        vec![format!("{}/old", base), format!("{}/mid", base)]
    );
    assert_eq!(response.redirect_reasons, vec!["301", "302"]);

    // Links are reported against the final URL
    assert!(events
        .iter()
        .filter(|e| e.kind() == "link" && !e.is_root())
        .all(|e| e.url() == format!("{}/new", base)));
}

#[tokio::test]
async fn test_redirect_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&server)
        .await;

    let mut config = create_test_config(&format!("{}/loop", server.uri()));
    config.fetcher.max_redirects = 3;
    let fetcher = HttpFetcher::new(&config.fetcher).unwrap();

    let result = fetcher.fetch_url(&format!("{}/loop", server.uri())).await;
    assert!(matches!(
        result,
        FetchResult::Failure {
            failure: FetchFailure::TooManyRedirects,
            ..
        }
    ));

    // Not a DNS or timeout failure, so nothing is emitted
    assert!(engine_for(&config).handle(&result).events.is_empty());
}

#[tokio::test]
async fn test_server_error_page_is_mined() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/broken",
        500,
        r#"<title>Oops</title><a href="/status">Status page</a>"#,
    )
    .await;

    let config = create_test_config(&format!("{}/broken", server.uri()));
    let fetcher = HttpFetcher::new(&config.fetcher).unwrap();
    let result = fetcher.fetch_url(&format!("{}/broken", server.uri())).await;

    match &result {
        FetchResult::Failure {
            failure: FetchFailure::HttpError(page),
            ..
        } => assert_eq!(page.status, 500),
        other => panic!("Expected HTTP error, got {:?}", other),
    }

    let step = engine_for(&config).handle(&result);
    let kinds: Vec<&str> = step.events.iter().map(CrawlEvent::kind).collect();
    assert_eq!(kinds, vec!["data", "headers", "response", "link"]);
    assert!(step.events.iter().all(|e| e.status() == Some("500")));
    assert_eq!(step.follow, vec![format!("{}/status", server.uri())]);
}

#[tokio::test]
async fn test_timeout_emits_single_event() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("<p>late</p>").set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let mut config = create_test_config(&format!("{}/slow", server.uri()));
    config.fetcher.request_timeout = 1;
    let events = crawl_to_vec(&config).await;

    assert_eq!(events.len(), 2);
    assert!(events[0].is_root());
    match &events[1] {
        CrawlEvent::TimeoutError(e) => assert_eq!(e.request_url, format!("{}/slow", server.uri())),
        other => panic!("Expected timeout error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_refused_is_dropped() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = create_test_config(&format!("http://{}/", addr));
    let fetcher = HttpFetcher::new(&config.fetcher).unwrap();
    let result = fetcher.fetch_url(&format!("http://{}/", addr)).await;

    assert!(matches!(
        result,
        FetchResult::Failure {
            failure: FetchFailure::Connection(_),
            ..
        }
    ));
    let step = engine_for(&config).handle(&result);
    assert!(step.events.is_empty());
    assert!(step.follow.is_empty());
}

#[tokio::test]
async fn test_non_html_body_not_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"<title>PDF</title><a href="/hidden">not a link</a>"#, "application/pdf"),
        )
        .mount(&server)
        .await;

    let config = create_test_config(&format!("{}/report.pdf", server.uri()));
    let events = crawl_to_vec(&config).await;

    let kinds: Vec<&str> = events.iter().map(CrawlEvent::kind).collect();
    assert_eq!(kinds, vec!["link", "data", "headers", "response"]);
    assert_eq!(request_count(&server, "/hidden").await, 0);
    match &events[2] {
        CrawlEvent::Headers(h) => assert!(h.headers["content-type"][0].starts_with("application/pdf")),
        other => panic!("Expected headers event, got {:?}", other),
    }
    match &events[1] {
        CrawlEvent::Data(d) => {
            assert!(d.data.title.is_none());
            assert!(d.data.meta_description.is_none());
        }
        other => panic!("Expected data event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_include_and_exclude_patterns() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(
        &server,
        "/",
        200,
        r#"<a href="/docs/intro">Intro</a><a href="/docs/draft">Draft</a><a href="/blog">Blog</a>"#,
    )
    .await;
    mount_html(&server, "/docs/intro", 200, "<p>intro</p>").await;
    mount_html(&server, "/docs/draft", 200, "<p>draft</p>").await;
    mount_html(&server, "/blog", 200, "<p>blog</p>").await;

    let config = parse_config(&format!(
        r#"
[scope]
start-url = "{base}/"
include-url-re = "{base}/docs/"
exclude-url-re = ".*/draft"
"#
    ))
    .unwrap();
    let events = crawl_to_vec(&config).await;

    let fetched: Vec<String> = responses(&events)
        .iter()
        .map(|r| r.request_url.clone())
        .collect();
    assert_eq!(fetched, vec![format!("{}/", base), format!("{}/docs/intro", base)]);
}

#[tokio::test]
async fn test_depth_limit() {
    let server = MockServer::start().await;
    mount_html(&server, "/", 200, r#"<a href="/1">1</a>"#).await;
    mount_html(&server, "/1", 200, r#"<a href="/2">2</a>"#).await;
    mount_html(&server, "/2", 200, r#"<a href="/3">3</a>"#).await;

    let mut config = create_test_config(&format!("{}/", server.uri()));
    config.scheduler.max_depth = 1;

    let engine = engine_for(&config);
    let fetcher = HttpFetcher::new(&config.fetcher).unwrap();
    let mut coordinator = Coordinator::new(
        engine,
        fetcher,
        Scheduler::new(config.scheduler.clone()),
        Vec::new(),
    );
    let stats = coordinator.run().await.unwrap();

    assert_eq!(stats.pages, 2);
    // /2 is still reported as a link from /1, just not fetched
    assert_eq!(stats.links, 2);
    assert_eq!(
        coordinator.scheduler().state_of(&format!("{}/1", server.uri())),
        Some(PageState::Succeeded)
    );
    assert!(coordinator
        .scheduler()
        .state_of(&format!("{}/2", server.uri()))
        .is_none());
}

#[tokio::test]
async fn test_run_crawl_to_sqlite() {
    let server = MockServer::start().await;
    mount_html(&server, "/", 200, r#"<a href="/a">A</a>"#).await;
    mount_html(&server, "/a", 200, "<title>A</title>").await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("crawl.db");

    let mut config = create_test_config(&format!("{}/", server.uri()));
    config.output.format = OutputFormat::Sqlite;
    config.output.path = db_path.display().to_string();
    validate(&config).unwrap();

    let live = run_crawl(&config, Some("deadbeef")).await.unwrap();
    let (run, stored) = load_statistics(&db_path).unwrap();

    assert_eq!(run.config_hash.as_deref(), Some("deadbeef"));
    assert!(run.finished_at.is_some());
    assert_eq!(stored, live);
    assert_eq!(stored.pages, 2);
    assert_eq!(stored.count("link"), 2);
}

#[tokio::test]
async fn test_run_crawl_to_jsonl_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "site2graph-test"))
        .respond_with(html("<title>Only</title>"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("events.jsonl");

    let mut config = create_test_config(&format!("{}/", server.uri()));
    config.output.path = out_path.display().to_string();
    config.fetcher.user_agent = "site2graph-test".to_string();

    run_crawl(&config, None).await.unwrap();

    let content = std::fs::read_to_string(&out_path).unwrap();
    let events: Vec<CrawlEvent> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    let kinds: Vec<&str> = events.iter().map(CrawlEvent::kind).collect();
    assert_eq!(kinds, vec!["link", "data", "headers", "response"]);
    assert!(content.lines().next().unwrap().contains(r#""type":"link""#));

    // The title only comes back if the configured user agent was sent
    match &events[1] {
        CrawlEvent::Data(d) => assert_eq!(d.data.title.as_deref(), Some("Only")),
        other => panic!("Expected data event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_html_fixtures_are_served_as_html() {
    let server = MockServer::start().await;
    mount_html(&server, "/", 200, "<title>Typed</title>").await;

    let config = create_test_config(&format!("{}/", server.uri()));
    let events = crawl_to_vec(&config).await;

    let content_type = events
        .iter()
        .find_map(|e| match e {
            CrawlEvent::Headers(h) => h.headers.get("content-type").cloned(),
            _ => None,
        })
        .expect("headers event with a content type");
    assert_eq!(content_type.len(), 1);
    assert!(content_type[0].starts_with("text/html"), "{:?}", content_type);
}

#[tokio::test]
async fn test_transient_error_retried_into_single_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_html(&server, "/flaky", 200, "<title>Back</title>").await;

    let mut config = create_test_config(&format!("{}/flaky", server.uri()));
    config.fetcher.retry_times = 2;
    let events = crawl_to_vec(&config).await;

    let kinds: Vec<&str> = events.iter().map(CrawlEvent::kind).collect();
    assert_eq!(kinds, vec!["link", "data", "headers", "response"]);
    assert!(events[1..].iter().all(|e| e.status() == Some("200")));
    assert!(events[1..].iter().all(|e| e.id() == events[1].id()));
    assert_eq!(request_count(&server, "/flaky").await, 2);
}

#[tokio::test]
async fn test_retries_exhausted_reports_last_response() {
    let server = MockServer::start().await;
    mount_html(&server, "/down", 503, "<title>Maintenance</title>").await;

    let mut config = create_test_config(&format!("{}/down", server.uri()));
    config.fetcher.retry_times = 2;
    let events = crawl_to_vec(&config).await;

    let pages = responses(&events);
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].status, "503");
    assert_eq!(request_count(&server, "/down").await, 3);
}

#[tokio::test]
async fn test_client_errors_not_retried() {
    let server = MockServer::start().await;
    mount_html(&server, "/gone", 404, "<p>gone</p>").await;

    let mut config = create_test_config(&format!("{}/gone", server.uri()));
    config.fetcher.retry_times = 2;
    let events = crawl_to_vec(&config).await;

    assert_eq!(responses(&events)[0].status, "404");
    assert_eq!(request_count(&server, "/gone").await, 1);
}

#[tokio::test]
async fn test_meta_refresh_followed_as_redirect() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(
        &server,
        "/start",
        200,
        r#"<html><head><meta http-equiv="refresh" content="0; url=/landing"></head></html>"#,
    )
    .await;
    mount_html(&server, "/landing", 200, "<title>Landing</title>").await;

    let config = create_test_config(&format!("{}/start", base));
    let events = crawl_to_vec(&config).await;

    let pages = responses(&events);
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].request_url, format!("{}/start", base));
    assert_eq!(pages[0].response_url, format!("{}/landing", base));
    assert_eq!(pages[0].redirect_urls, vec![format!("{}/start", base)]);
    assert_eq!(pages[0].redirect_reasons, vec!["meta refresh"]);

    match &events[1] {
        CrawlEvent::Data(d) => assert_eq!(d.data.title.as_deref(), Some("Landing")),
        other => panic!("Expected data event, got {:?}", other),
    }
}
