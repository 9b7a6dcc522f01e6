//! Pagepack: a single-site web archiver
//!
//! This crate crawls a web site breadth-first within a page/depth budget,
//! localizes every referenced sub-resource (images, stylesheets, scripts,
//! fonts), rewrites all references to point at the localized copies, and
//! bundles the result plus a manifest into one replayable `.page` archive.

pub mod archive;
pub mod browser;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod fetch;
pub mod url;

use thiserror::Error;

/// Main error type for Pagepack operations
#[derive(Debug, Error)]
pub enum PagepackError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Entry URL unreachable: {url}: {reason}")]
    EntryUnreachable { url: String, reason: String },

    #[error("Crawl worker failed: {0}")]
    Worker(String),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Manifest serialization error: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Pagepack operations
pub type Result<T> = std::result::Result<T, PagepackError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{CrawlBudget, CrawlOptions};
pub use crawler::run_crawl;
pub use url::{normalize_url, same_origin, SchemeClass};
