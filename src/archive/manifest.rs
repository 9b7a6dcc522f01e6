//! The archive manifest: what was crawled, with what parameters, and where
//! every URL ended up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CrawlOptions;
use crate::crawler::{CrawlOutcome, UrlStatus};

use super::mapper::PathMap;

/// Fixed location of the manifest inside the archive
pub const MANIFEST_PATH: &str = "manifest.json";

/// Bumped when the manifest layout changes incompatibly
pub const FORMAT_VERSION: u32 = 1;

/// Serialized once into the archive at the end of a run
#[derive(Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub generator: String,
    pub created_at: DateTime<Utc>,
    /// Canonical entry URL; its document is always the root entry point
    /// file in the archive
    pub entry_url: String,
    pub crawl: CrawlParams,
    /// True when any document contained dynamic references the extractor
    /// could not follow; the archive may be missing resources
    pub possibly_incomplete: bool,
    /// Fetched resources in BFS order, then everything the crawl saw but
    /// did not fetch
    pub entries: Vec<ManifestEntry>,
}

/// The budget and policy the run was given
#[derive(Debug, Serialize, Deserialize)]
pub struct CrawlParams {
    pub max_pages: u32,
    pub max_depth: u32,
    pub skip_assets: bool,
}

/// One URL's outcome
#[derive(Debug, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub url: String,
    pub status: String,
    pub depth: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Fetched size in bytes, before rewriting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub via_browser: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub possibly_incomplete: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Builds the manifest from a completed crawl and its path assignment
pub fn build_manifest(
    outcome: &CrawlOutcome,
    paths: &PathMap,
    options: &CrawlOptions,
) -> Manifest {
    let mut entries = Vec::with_capacity(outcome.resources.len() + outcome.records.len());

    for resource in &outcome.resources {
        entries.push(ManifestEntry {
            url: resource.url.to_string(),
            status: UrlStatus::Fetched.as_str().to_string(),
            depth: resource.depth,
            local_path: paths.get(&resource.url).map(str::to_string),
            content_type: Some(resource.content_type.clone()),
            size: Some(resource.body.len() as u64),
            title: resource.title.clone(),
            via_browser: resource.via_browser,
            possibly_incomplete: resource.possibly_incomplete,
        });
    }

    for record in &outcome.records {
        entries.push(ManifestEntry {
            url: record.url.clone(),
            status: record.status.as_str().to_string(),
            depth: record.depth,
            local_path: None,
            content_type: None,
            size: None,
            title: None,
            via_browser: false,
            possibly_incomplete: false,
        });
    }

    Manifest {
        format_version: FORMAT_VERSION,
        generator: format!("pagepack/{}", env!("CARGO_PKG_VERSION")),
        created_at: Utc::now(),
        entry_url: outcome.entry.to_string(),
        crawl: CrawlParams {
            max_pages: options.budget.max_pages,
            max_depth: options.budget.max_depth,
            skip_assets: options.skip_assets,
        },
        possibly_incomplete: outcome.resources.iter().any(|r| r.possibly_incomplete),
        entries,
    }
}
