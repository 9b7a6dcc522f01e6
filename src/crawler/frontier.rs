//! Frontier bookkeeping: visited set, budget counters, skip records.
//!
//! All mutable crawl state lives here, behind a single lock in the
//! coordinator. Fetching and extraction run unsynchronized; only admission
//! decisions and record-keeping go through this struct.

use std::collections::HashSet;

use url::Url;

use crate::config::CrawlBudget;

/// Terminal status of a URL in the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlStatus {
    /// Fetched and included in the archive
    Fetched,
    /// Fetch failed after the fallback attempt; references to it are left
    /// pointing at the original remote URL
    Unreachable,
    /// Discovered but the depth or page budget was already exhausted
    SkippedBudget,
    /// A link to another origin; recorded, never followed
    ForeignLink,
    /// mailto:, javascript:, data: and friends; passed through verbatim
    NonFetchable,
    /// An asset the run was told not to fetch (--skip-assets)
    SkippedAsset,
}

impl UrlStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UrlStatus::Fetched => "fetched",
            UrlStatus::Unreachable => "unreachable",
            UrlStatus::SkippedBudget => "skipped_budget",
            UrlStatus::ForeignLink => "foreign",
            UrlStatus::NonFetchable => "non_fetchable",
            UrlStatus::SkippedAsset => "skipped_asset",
        }
    }
}

/// A URL the crawl saw but did not fetch (or failed to), for the manifest
#[derive(Debug, Clone)]
pub struct SkippedRecord {
    pub url: String,
    pub status: UrlStatus,
    /// Depth of the document that referenced it
    pub depth: u32,
}

/// How a URL entered the frontier; decides depth and budget treatment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkKind {
    /// A navigation target: consumes page budget, increments depth
    Page,
    /// A sub-resource: fetched at its referencing document's depth, free of
    /// page budget, fetched even when foreign
    Asset,
}

/// One pending fetch
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub url: Url,
    pub depth: u32,
    pub kind: WorkKind,
}

/// Mutable state shared across the run
pub struct CrawlState {
    budget: CrawlBudget,
    /// Canonical URLs ever admitted to the queue; admission happens at most
    /// once per URL per run
    visited: HashSet<String>,
    /// URLs already recorded as skipped, to keep the manifest free of
    /// duplicate records
    recorded: HashSet<String>,
    /// Pages admitted so far, counted at admission so the budget is checked
    /// before every enqueue
    pages_admitted: u32,
    records: Vec<SkippedRecord>,
}

impl CrawlState {
    pub fn new(budget: CrawlBudget) -> Self {
        Self {
            budget,
            visited: HashSet::new(),
            recorded: HashSet::new(),
            pages_admitted: 0,
            records: Vec::new(),
        }
    }

    /// Admits a page link into the frontier. Returns false when the URL was
    /// already seen or the budget refuses it; budget refusals are recorded.
    pub fn admit_page(&mut self, url: &Url, depth: u32) -> bool {
        if self.visited.contains(url.as_str()) {
            return false;
        }
        if depth > self.budget.max_depth || self.pages_admitted >= self.budget.max_pages {
            self.record(url.as_str(), UrlStatus::SkippedBudget, depth);
            return false;
        }
        self.visited.insert(url.to_string());
        self.pages_admitted += 1;
        true
    }

    /// Admits an asset into the frontier; assets are only refused when
    /// already seen
    pub fn admit_asset(&mut self, url: &Url) -> bool {
        self.visited.insert(url.to_string())
    }

    /// Records a URL the crawl will not fetch, once
    pub fn record(&mut self, url: &str, status: UrlStatus, depth: u32) {
        if self.recorded.insert(url.to_string()) {
            self.records.push(SkippedRecord {
                url: url.to_string(),
                status,
                depth,
            });
        }
    }

    /// Skip records accumulated so far, dropping any URL that was fetched
    /// after all (a foreign link can also appear as a foreign asset, and
    /// the fetch wins)
    pub fn into_records(self, fetched: &HashSet<&str>) -> Vec<SkippedRecord> {
        self.records
            .into_iter()
            .filter(|r| !fetched.contains(r.url.as_str()))
            .collect()
    }
}
