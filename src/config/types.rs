use crate::url::ScopeFilter;
use crate::ConfigError;
use serde::Deserialize;

/// Main configuration structure for site2graph
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Seed URL of the crawl, if one has been configured
    pub fn start_url(&self) -> Option<&str> {
        self.scope.start_url.as_deref()
    }

    /// Compiles the scope section into a [`ScopeFilter`]
    pub fn scope_filter(&self) -> Result<ScopeFilter, ConfigError> {
        let seed = self
            .start_url()
            .ok_or_else(|| ConfigError::Validation("start-url is required".to_string()))?;

        ScopeFilter::new(
            seed,
            self.scope.include_url_re.as_deref(),
            self.scope.exclude_url_re.as_deref(),
        )
    }
}

/// Which URLs the crawl starts from and may follow
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScopeConfig {
    /// Seed URL
    #[serde(rename = "start-url")]
    pub start_url: Option<String>,

    /// Start-anchored regex; when set, replaces the same-origin rule
    #[serde(rename = "include-url-re")]
    pub include_url_re: Option<String>,

    /// Start-anchored regex; matching URLs are never followed
    #[serde(rename = "exclude-url-re")]
    pub exclude_url_re: Option<String>,
}

/// HTTP fetcher configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Total time allowed per request (seconds)
    #[serde(rename = "request-timeout")]
    pub request_timeout: u64,

    /// Time allowed to establish a connection (seconds)
    #[serde(rename = "connect-timeout")]
    pub connect_timeout: u64,

    /// Maximum redirect hops followed per fetch
    #[serde(rename = "max-redirects")]
    pub max_redirects: u32,

    /// Extra tries after a transient failure (DNS, timeout, connection,
    /// or a retryable status such as 503)
    #[serde(rename = "retry-times")]
    pub retry_times: u32,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("site2graph/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: 180,
            connect_timeout: 10,
            max_redirects: 20,
            retry_times: 2,
        }
    }
}

/// Request scheduling configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of fetches in flight
    #[serde(rename = "max-concurrent-requests")]
    pub max_concurrent_requests: u32,

    /// Maximum link depth from the seed (0 = unlimited)
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// URLs longer than this are not requested (0 = unlimited)
    #[serde(rename = "max-url-length")]
    pub max_url_length: usize,

    /// Minimum time between two dispatched requests (milliseconds)
    #[serde(rename = "download-delay")]
    pub download_delay: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 16,
            max_depth: 0,
            max_url_length: 2083,
            download_delay: 0,
        }
    }
}

/// Event stream format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per line
    #[default]
    Jsonl,
    /// SQLite database with `runs` and `events` tables
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,

    /// Destination file; "-" writes JSON lines to stdout
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jsonl,
            path: "-".to_string(),
        }
    }
}
