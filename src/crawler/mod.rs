//! Breadth-first site crawler
//!
//! The crawler owns the frontier (visited set, pending queue, budget) and
//! drives the fetcher and the reference extractor over the page graph. It
//! produces the complete set of fetched resources, each carrying its
//! resolved outbound references, ready for path assignment and rewriting.

mod coordinator;
mod frontier;

pub use coordinator::run_crawl;
pub use frontier::{CrawlState, SkippedRecord, UrlStatus, WorkItem, WorkKind};

use std::ops::Range;

use url::Url;

use crate::extract::RefKind;

/// A reference extracted from a fetched document, with its target resolved
/// against the document's final URL
#[derive(Debug, Clone)]
pub struct ResolvedReference {
    /// The reference text exactly as it appears in the source
    pub raw: String,
    /// Byte range of `raw` within the source document
    pub span: Range<usize>,
    pub kind: RefKind,
    /// Canonical target, or None when the reference is non-fetchable
    /// (opaque scheme, unparsable) and must pass through rewriting verbatim
    pub target: Option<Url>,
}

/// A resource the crawl fetched successfully
#[derive(Debug)]
pub struct FetchedResource {
    /// Canonical URL the resource was discovered under; identity key for
    /// path assignment and the manifest
    pub url: Url,
    /// URL after redirects, used as the base for resolving references
    pub final_url: Url,
    pub content_type: String,
    pub body: Vec<u8>,
    /// BFS depth. Pages increment it; assets inherit the depth of the
    /// document that referenced them.
    pub depth: u32,
    /// True for same-origin HTML documents, the unit the page budget counts
    pub is_page: bool,
    pub same_origin: bool,
    /// Whether the resource was obtained via the browser fallback
    pub via_browser: bool,
    /// References in document order, for the rewriter
    pub references: Vec<ResolvedReference>,
    /// True when extraction saw dynamic reference patterns it cannot follow
    pub possibly_incomplete: bool,
    /// `<title>` text for HTML documents
    pub title: Option<String>,
}

/// Everything a completed crawl run produced
#[derive(Debug)]
pub struct CrawlOutcome {
    /// Canonical entry URL
    pub entry: Url,
    /// Fetched resources in BFS discovery order
    pub resources: Vec<FetchedResource>,
    /// URLs the crawl saw but deliberately did not fetch, or failed to
    pub records: Vec<SkippedRecord>,
}
