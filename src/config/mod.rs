//! Configuration module for Pagepack
//!
//! The command line supplies the crawl budget (max pages, max depth) and the
//! asset-skip flag; the optional TOML tuning file covers everything that
//! rarely changes between runs: fetch concurrency, timeouts, and the
//! user-agent identification sent with every request.

mod parser;
mod types;
mod validation;

pub use parser::load_tuning;
pub use types::{CrawlBudget, CrawlOptions, FetchTuning, Tuning, UserAgentConfig};
pub use validation::validate;
