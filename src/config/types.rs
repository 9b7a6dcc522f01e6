use serde::Deserialize;

/// Hard ceilings on a crawl run. Checked before every enqueue; once
/// exhausted no new fetches are issued.
#[derive(Debug, Clone, Copy)]
pub struct CrawlBudget {
    /// Maximum number of HTML documents fetched (assets do not count)
    pub max_pages: u32,

    /// Maximum BFS link depth from the entry URL (entry is depth 0;
    /// asset references do not increment depth)
    pub max_depth: u32,
}

/// Everything a single crawl run needs besides the entry URL
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub budget: CrawlBudget,

    /// Record asset references in the manifest but never fetch them
    pub skip_assets: bool,

    pub tuning: Tuning,
}

/// Tuning knobs loaded from the optional TOML config file
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Tuning {
    #[serde(default)]
    pub fetch: FetchTuning,

    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
}

/// Fetch behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchTuning {
    /// Maximum concurrent plain fetches
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Maximum concurrent browser-fallback renders. Strictly lower than
    /// plain-fetch concurrency since each render spawns a browser process.
    #[serde(rename = "browser-concurrency", default = "default_browser_concurrency")]
    pub browser_concurrency: u32,

    /// Per-attempt timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the archiver
    #[serde(rename = "archiver-name", default = "default_archiver_name")]
    pub archiver_name: String,

    /// Version of the archiver
    #[serde(rename = "archiver-version", default = "default_archiver_version")]
    pub archiver_version: String,

    /// URL with information about the archiver
    #[serde(rename = "contact-url", default)]
    pub contact_url: String,
}

impl Default for FetchTuning {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            browser_concurrency: default_browser_concurrency(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            archiver_name: default_archiver_name(),
            archiver_version: default_archiver_version(),
            contact_url: String::new(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value.
    ///
    /// Format: `ArchiverName/Version (+ContactURL)` when a contact URL is
    /// configured, `ArchiverName/Version` otherwise.
    pub fn header_value(&self) -> String {
        if self.contact_url.is_empty() {
            format!("{}/{}", self.archiver_name, self.archiver_version)
        } else {
            format!(
                "{}/{} (+{})",
                self.archiver_name, self.archiver_version, self.contact_url
            )
        }
    }
}

fn default_concurrency() -> u32 {
    4
}

fn default_browser_concurrency() -> u32 {
    1
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_archiver_name() -> String {
    "Pagepack".to_string()
}

fn default_archiver_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
