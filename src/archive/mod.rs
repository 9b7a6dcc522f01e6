//! Archive production: path assignment, rewriting, manifest, container.
//!
//! Runs after the crawl completes, over the full set of fetched resources.
//! Path assignment must see every resource before any document is
//! rewritten, because rewriting needs the completed mapping.

mod manifest;
mod mapper;
mod rewriter;
mod writer;

pub use manifest::{build_manifest, CrawlParams, Manifest, ManifestEntry, MANIFEST_PATH};
pub use mapper::{assign_paths, PathMap, ENTRY_DOCUMENT};
pub use rewriter::rewrite;
pub use writer::write_archive;

use std::path::Path;

use url::Url;

use crate::config::CrawlOptions;
use crate::crawler::CrawlOutcome;
use crate::Result;

/// Turns a completed crawl into a `.page` archive at `output`
///
/// Assigns paths, rewrites every document against the completed mapping,
/// builds the manifest, and writes the container atomically.
pub fn write_bundle(output: &Path, outcome: &CrawlOutcome, options: &CrawlOptions) -> Result<()> {
    let paths = assign_paths(&outcome.entry, &outcome.resources);
    let manifest = build_manifest(outcome, &paths, options);

    let mut files = Vec::with_capacity(outcome.resources.len());
    for resource in &outcome.resources {
        if let Some(path) = paths.get(&resource.url) {
            files.push((path.to_string(), rewrite(resource, &paths)));
        }
    }

    write_archive(output, &files, &manifest)
}

/// Default archive file name for an entry URL: `<host>.page`
pub fn default_archive_name(entry: &Url) -> String {
    format!("{}.page", entry.host_str().unwrap_or("archive"))
}
