//! Crawl coordination: depth waves, worker pool, reference discovery.
//!
//! The crawl proceeds in breadth-first waves. Each wave fetches its work
//! items concurrently through a bounded worker pool; admission of newly
//! discovered URLs happens sequentially in the coordinator between waves,
//! which is the single point where crawl state mutates. That keeps the
//! depth ordering exact without fine-grained locking around the visited
//! set and budget counters.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{BrowserBackend, CapturedResponse};
use crate::config::CrawlOptions;
use crate::extract;
use crate::fetch::{self, FetchOutcome};
use crate::url::{classify_scheme, normalize_url, same_origin, SchemeClass};
use crate::{PagepackError, Result};

use super::frontier::{CrawlState, UrlStatus, WorkItem, WorkKind};
use super::{CrawlOutcome, FetchedResource, ResolvedReference};

/// Sub-resource responses observed by browser renders, adopted by later
/// fetches of the same URL instead of hitting the network again
type CapturedCache = Arc<Mutex<HashMap<String, CapturedResponse>>>;

/// Crawls a site starting at `entry`, breadth-first within the configured
/// budget
///
/// # Arguments
///
/// * `entry` - Canonical entry URL; its fetch failing is fatal for the run
/// * `options` - Budget, asset policy, and tuning
/// * `client` - Shared HTTP client from [`fetch::build_http_client`]
/// * `browser` - Optional fallback for challenge-protected pages; without
///   it, a challenged URL goes straight to unreachable
///
/// # Returns
///
/// * `Ok(CrawlOutcome)` - All fetched resources plus skip records
/// * `Err(PagepackError::EntryUnreachable)` - The entry URL could not be
///   fetched even through the fallback
pub async fn run_crawl(
    entry: &Url,
    options: &CrawlOptions,
    client: &Client,
    browser: Option<Arc<dyn BrowserBackend>>,
) -> Result<CrawlOutcome> {
    let mut state = CrawlState::new(options.budget);
    let captured: CapturedCache = Arc::new(Mutex::new(HashMap::new()));
    let fetch_sem = Arc::new(Semaphore::new(options.tuning.fetch.concurrency as usize));
    let browser_sem = Arc::new(Semaphore::new(
        options.tuning.fetch.browser_concurrency as usize,
    ));

    state.admit_page(entry, 0);
    let mut wave = vec![WorkItem {
        url: entry.clone(),
        depth: 0,
        kind: WorkKind::Page,
    }];
    let mut resources: Vec<FetchedResource> = Vec::new();

    while !wave.is_empty() {
        debug!("Fetching wave of {} resource(s)", wave.len());

        let mut join_set: JoinSet<(usize, TaskResult)> = JoinSet::new();
        for (idx, item) in wave.iter().cloned().enumerate() {
            let client = client.clone();
            let fetch_sem = Arc::clone(&fetch_sem);
            let browser_sem = Arc::clone(&browser_sem);
            let browser = browser.clone();
            let captured = Arc::clone(&captured);
            join_set.spawn(async move {
                let _permit = match fetch_sem.acquire().await {
                    Ok(p) => p,
                    Err(_) => {
                        return (
                            idx,
                            TaskResult::Failed {
                                url: item.url.clone(),
                                depth: item.depth,
                                reason: "worker pool closed".to_string(),
                            },
                        )
                    }
                };
                let result =
                    fetch_one(&client, &item, browser.as_deref(), &browser_sem, &captured).await;
                (idx, result)
            });
        }

        // Reassemble wave order so discovery (and thus the manifest) is
        // deterministic regardless of completion order
        let mut results: Vec<Option<TaskResult>> = Vec::new();
        results.resize_with(wave.len(), || None);
        while let Some(joined) = join_set.join_next().await {
            let (idx, result) = joined.map_err(|e| PagepackError::Worker(e.to_string()))?;
            results[idx] = Some(result);
        }

        let mut next_wave = Vec::new();
        for result in results.into_iter().flatten() {
            match result {
                TaskResult::Fetched(mut resource) => {
                    discover(&mut resource, entry, options, &mut state, &mut next_wave);
                    resources.push(resource);
                }
                TaskResult::Failed { url, depth, reason } => {
                    if url == *entry {
                        return Err(PagepackError::EntryUnreachable {
                            url: url.to_string(),
                            reason,
                        });
                    }
                    warn!("Unreachable: {} ({})", url, reason);
                    state.record(url.as_str(), UrlStatus::Unreachable, depth);
                }
            }
        }

        wave = next_wave;
    }

    let pages = resources.iter().filter(|r| r.is_page).count();
    info!(
        "Crawl complete: {} resource(s), {} page(s)",
        resources.len(),
        pages
    );

    let fetched: HashSet<&str> = resources.iter().map(|r| r.url.as_str()).collect();
    let records = state.into_records(&fetched);

    Ok(CrawlOutcome {
        entry: entry.clone(),
        resources,
        records,
    })
}

enum TaskResult {
    Fetched(FetchedResource),
    Failed {
        url: Url,
        depth: u32,
        reason: String,
    },
}

/// Fetches one work item: direct request first, then at most one browser
/// fallback attempt
async fn fetch_one(
    client: &Client,
    item: &WorkItem,
    browser: Option<&dyn BrowserBackend>,
    browser_sem: &Semaphore,
    captured: &Mutex<HashMap<String, CapturedResponse>>,
) -> TaskResult {
    // A browser render may already have captured this URL's response
    if let Some(response) = captured.lock().await.remove(item.url.as_str()) {
        debug!("Adopting browser-captured response for {}", item.url);
        return TaskResult::Fetched(build_resource(
            item,
            item.url.clone(),
            response.content_type,
            response.body,
            true,
        ));
    }

    let reason = match fetch::fetch_url(client, item.url.as_str()).await {
        FetchOutcome::Fetched {
            final_url,
            status: _,
            content_type,
            body,
        } => {
            let final_url = Url::parse(&final_url).unwrap_or_else(|_| item.url.clone());
            return TaskResult::Fetched(build_resource(item, final_url, content_type, body, false));
        }
        FetchOutcome::Challenge { status } => {
            format!("challenge page (HTTP {})", status)
        }
        FetchOutcome::HttpError { status } => format!("HTTP {}", status),
        FetchOutcome::NetworkError { error } => error,
    };

    let Some(browser) = browser else {
        return TaskResult::Failed {
            url: item.url.clone(),
            depth: item.depth,
            reason,
        };
    };

    info!("Direct fetch failed for {} ({}), trying browser", item.url, reason);
    let _permit = match browser_sem.acquire().await {
        Ok(p) => p,
        Err(_) => {
            return TaskResult::Failed {
                url: item.url.clone(),
                depth: item.depth,
                reason,
            }
        }
    };

    match browser.render(item.url.as_str()).await {
        Ok(rendered) => {
            let mut cache = captured.lock().await;
            for response in rendered.resources {
                if let Ok(url) = normalize_url(&response.url, None) {
                    cache.entry(url.to_string()).or_insert(response);
                }
            }
            drop(cache);

            let final_url =
                Url::parse(&rendered.final_url).unwrap_or_else(|_| item.url.clone());
            TaskResult::Fetched(build_resource(
                item,
                final_url,
                "text/html".to_string(),
                rendered.html.into_bytes(),
                true,
            ))
        }
        Err(e) => TaskResult::Failed {
            url: item.url.clone(),
            depth: item.depth,
            reason: format!("{}; browser fallback: {}", reason, e),
        },
    }
}

fn build_resource(
    item: &WorkItem,
    final_url: Url,
    content_type: String,
    body: Vec<u8>,
    via_browser: bool,
) -> FetchedResource {
    let is_page = item.kind == WorkKind::Page && extract::is_html(&content_type);
    FetchedResource {
        url: item.url.clone(),
        final_url,
        content_type,
        body,
        depth: item.depth,
        is_page,
        same_origin: item.kind == WorkKind::Page,
        via_browser,
        references: Vec::new(),
        possibly_incomplete: false,
        title: None,
    }
}

/// Extracts a fetched resource's references, resolves them, and admits the
/// new ones into the next wave
fn discover(
    resource: &mut FetchedResource,
    entry: &Url,
    options: &CrawlOptions,
    state: &mut CrawlState,
    next_wave: &mut Vec<WorkItem>,
) {
    resource.same_origin = same_origin(&resource.url, entry);

    let extraction = extract::extract_references(&resource.content_type, &resource.body);
    resource.possibly_incomplete = extraction.possibly_incomplete;

    if extract::is_html(&resource.content_type) {
        resource.title = page_title(&resource.body);
    }

    for reference in extraction.references {
        if classify_scheme(&reference.raw) == SchemeClass::Opaque {
            if !reference.raw.starts_with('#') {
                state.record(&reference.raw, UrlStatus::NonFetchable, resource.depth);
            }
            resource.references.push(ResolvedReference {
                raw: reference.raw,
                span: reference.span,
                kind: reference.kind,
                target: None,
            });
            continue;
        }

        let target = match normalize_url(&reference.url_text(), Some(&resource.final_url)) {
            Ok(url) => url,
            Err(e) => {
                debug!("Unresolvable reference '{}': {}", reference.raw, e);
                state.record(&reference.raw, UrlStatus::NonFetchable, resource.depth);
                resource.references.push(ResolvedReference {
                    raw: reference.raw,
                    span: reference.span,
                    kind: reference.kind,
                    target: None,
                });
                continue;
            }
        };

        if reference.kind.is_page_link() {
            // Links are only followed from same-origin pages; a link in a
            // fetched asset document stays a link
            if resource.is_page && resource.same_origin {
                if same_origin(&target, entry) {
                    if state.admit_page(&target, resource.depth + 1) {
                        next_wave.push(WorkItem {
                            url: target.clone(),
                            depth: resource.depth + 1,
                            kind: WorkKind::Page,
                        });
                    }
                } else {
                    state.record(target.as_str(), UrlStatus::ForeignLink, resource.depth);
                }
            }
        } else if options.skip_assets {
            state.record(target.as_str(), UrlStatus::SkippedAsset, resource.depth);
        } else if state.admit_asset(&target) {
            // Assets are fetched regardless of origin; a page without its
            // CDN stylesheet does not render offline
            next_wave.push(WorkItem {
                url: target.clone(),
                depth: resource.depth,
                kind: WorkKind::Asset,
            });
        }

        resource.references.push(ResolvedReference {
            raw: reference.raw,
            span: reference.span,
            kind: reference.kind,
            target: Some(target),
        });
    }
}

/// Pulls the `<title>` text out of an HTML document
fn page_title(body: &[u8]) -> Option<String> {
    let html = String::from_utf8_lossy(body);
    let document = scraper::Html::parse_document(&html);
    let selector = scraper::Selector::parse("title").ok()?;
    let title = document
        .select(&selector)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CrawlBudget, Tuning};

    fn page_resource(url: &str, depth: u32, body: &str) -> FetchedResource {
        FetchedResource {
            url: Url::parse(url).unwrap(),
            final_url: Url::parse(url).unwrap(),
            content_type: "text/html".to_string(),
            body: body.as_bytes().to_vec(),
            depth,
            is_page: true,
            same_origin: true,
            via_browser: false,
            references: Vec::new(),
            possibly_incomplete: false,
            title: None,
        }
    }

    fn options(max_pages: u32, max_depth: u32, skip_assets: bool) -> CrawlOptions {
        CrawlOptions {
            budget: CrawlBudget {
                max_pages,
                max_depth,
            },
            skip_assets,
            tuning: Tuning::default(),
        }
    }

    fn run_discover(
        resource: &mut FetchedResource,
        entry: &str,
        options: &CrawlOptions,
    ) -> (CrawlState, Vec<WorkItem>) {
        let entry = Url::parse(entry).unwrap();
        let mut state = CrawlState::new(options.budget);
        state.admit_page(&entry, 0);
        let mut next = Vec::new();
        discover(resource, &entry, options, &mut state, &mut next);
        (state, next)
    }

    #[test]
    fn test_same_origin_link_enqueued_as_page() {
        let mut r = page_resource(
            "https://a.test/",
            0,
            r#"<a href="/about.html">about</a>"#,
        );
        let (_, next) = run_discover(&mut r, "https://a.test/", &options(10, 2, false));
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].kind, WorkKind::Page);
        assert_eq!(next[0].depth, 1);
        assert_eq!(next[0].url.as_str(), "https://a.test/about.html");
    }

    #[test]
    fn test_foreign_link_recorded_not_enqueued() {
        let mut r = page_resource(
            "https://a.test/",
            0,
            r#"<a href="https://other.test/x">x</a>"#,
        );
        let (state, next) = run_discover(&mut r, "https://a.test/", &options(10, 2, false));
        assert!(next.is_empty());
        let records = state.into_records(&HashSet::new());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, UrlStatus::ForeignLink);
    }

    #[test]
    fn test_foreign_asset_enqueued() {
        let mut r = page_resource(
            "https://a.test/",
            0,
            r#"<img src="https://cdn.test/logo.png">"#,
        );
        let (_, next) = run_discover(&mut r, "https://a.test/", &options(10, 2, false));
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].kind, WorkKind::Asset);
        assert_eq!(next[0].depth, 0);
    }

    #[test]
    fn test_skip_assets_records_instead_of_enqueueing() {
        let mut r = page_resource("https://a.test/", 0, r#"<img src="/logo.png">"#);
        let (state, next) = run_discover(&mut r, "https://a.test/", &options(10, 2, true));
        assert!(next.is_empty());
        let records = state.into_records(&HashSet::new());
        assert_eq!(records[0].status, UrlStatus::SkippedAsset);
    }

    #[test]
    fn test_opaque_scheme_passes_through_unresolved() {
        let mut r = page_resource(
            "https://a.test/",
            0,
            r#"<a href="mailto:hi@a.test">mail</a>"#,
        );
        let (_, next) = run_discover(&mut r, "https://a.test/", &options(10, 2, false));
        assert!(next.is_empty());
        assert_eq!(r.references.len(), 1);
        assert!(r.references[0].target.is_none());
    }

    #[test]
    fn test_fragment_link_not_recorded() {
        let mut r = page_resource("https://a.test/", 0, r##"<a href="#top">top</a>"##);
        let (state, _) = run_discover(&mut r, "https://a.test/", &options(10, 2, false));
        assert!(state.into_records(&HashSet::new()).is_empty());
    }

    #[test]
    fn test_depth_bound_stops_link_following() {
        let mut r = page_resource("https://a.test/deep", 2, r#"<a href="/deeper">go</a>"#);
        let (state, next) = run_discover(&mut r, "https://a.test/", &options(10, 2, false));
        assert!(next.is_empty());
        let records = state.into_records(&HashSet::new());
        assert_eq!(records[0].status, UrlStatus::SkippedBudget);
    }

    #[test]
    fn test_references_resolved_against_final_url() {
        let mut r = page_resource("https://a.test/blog/", 0, r#"<img src="cover.jpg">"#);
        let (_, next) = run_discover(&mut r, "https://a.test/", &options(10, 2, false));
        assert_eq!(next[0].url.as_str(), "https://a.test/blog/cover.jpg");
    }

    #[test]
    fn test_title_extracted() {
        let mut r = page_resource(
            "https://a.test/",
            0,
            "<html><head><title> Hello </title></head></html>",
        );
        run_discover(&mut r, "https://a.test/", &options(10, 2, false));
        assert_eq!(r.title.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_links_in_asset_documents_not_followed() {
        let mut r = page_resource("https://a.test/frame.html", 1, r#"<a href="/next">n</a>"#);
        r.is_page = false;
        let (_, next) = run_discover(&mut r, "https://a.test/", &options(10, 5, false));
        assert!(next.is_empty());
    }

    #[test]
    fn test_dynamic_js_marks_possibly_incomplete() {
        let mut r = page_resource(
            "https://a.test/",
            0,
            r#"<script>fetch(endpoint + "/data");</script>"#,
        );
        run_discover(&mut r, "https://a.test/", &options(10, 2, false));
        assert!(r.possibly_incomplete);
    }

    #[test]
    fn test_reference_order_matches_document_order() {
        let mut r = page_resource(
            "https://a.test/",
            0,
            r#"<img src="/1.png"><img src="/2.png">"#,
        );
        run_discover(&mut r, "https://a.test/", &options(10, 2, false));
        let raws: Vec<_> = r.references.iter().map(|x| x.raw.as_str()).collect();
        assert_eq!(raws, ["/1.png", "/2.png"]);
    }

    mod crawl {
        use super::*;
        use crate::fetch::build_http_client;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        async fn serve_html(server: &MockServer, p: &str, body: &str) {
            Mock::given(method("GET"))
                .and(path(p))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_raw(body.to_string(), "text/html; charset=utf-8"),
                )
                .mount(server)
                .await;
        }

        #[tokio::test]
        async fn test_crawl_follows_links_breadth_first() {
            let server = MockServer::start().await;
            serve_html(&server, "/", r#"<a href="/a">a</a><a href="/b">b</a>"#).await;
            serve_html(&server, "/a", r#"<a href="/c">c</a>"#).await;
            serve_html(&server, "/b", "leaf").await;
            serve_html(&server, "/c", "leaf").await;

            let entry = normalize_url(&server.uri(), None).unwrap();
            let client = build_http_client(&Tuning::default()).unwrap();
            let outcome = run_crawl(&entry, &options(10, 2, false), &client, None)
                .await
                .unwrap();

            let depths: Vec<(String, u32)> = outcome
                .resources
                .iter()
                .map(|r| (r.url.path().to_string(), r.depth))
                .collect();
            assert_eq!(
                depths,
                [
                    ("/".to_string(), 0),
                    ("/a".to_string(), 1),
                    ("/b".to_string(), 1),
                    ("/c".to_string(), 2),
                ]
            );
        }

        #[tokio::test]
        async fn test_page_budget_bounds_fetched_pages() {
            let server = MockServer::start().await;
            serve_html(
                &server,
                "/",
                r#"<a href="/1">1</a><a href="/2">2</a><a href="/3">3</a>"#,
            )
            .await;
            for p in ["/1", "/2", "/3"] {
                serve_html(&server, p, "leaf").await;
            }

            let entry = normalize_url(&server.uri(), None).unwrap();
            let client = build_http_client(&Tuning::default()).unwrap();
            let outcome = run_crawl(&entry, &options(2, 3, false), &client, None)
                .await
                .unwrap();

            assert_eq!(outcome.resources.iter().filter(|r| r.is_page).count(), 2);
            assert!(outcome
                .records
                .iter()
                .any(|r| r.status == UrlStatus::SkippedBudget));
        }

        #[tokio::test]
        async fn test_entry_failure_is_fatal() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&server)
                .await;

            let entry = normalize_url(&server.uri(), None).unwrap();
            let client = build_http_client(&Tuning::default()).unwrap();
            let result = run_crawl(&entry, &options(5, 2, false), &client, None).await;

            assert!(matches!(
                result,
                Err(PagepackError::EntryUnreachable { .. })
            ));
        }

        #[tokio::test]
        async fn test_asset_failure_is_not_fatal() {
            let server = MockServer::start().await;
            serve_html(&server, "/", r#"<img src="/gone.png">"#).await;
            Mock::given(method("GET"))
                .and(path("/gone.png"))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server)
                .await;

            let entry = normalize_url(&server.uri(), None).unwrap();
            let client = build_http_client(&Tuning::default()).unwrap();
            let outcome = run_crawl(&entry, &options(5, 2, false), &client, None)
                .await
                .unwrap();

            assert_eq!(outcome.resources.len(), 1);
            assert!(outcome
                .records
                .iter()
                .any(|r| r.status == UrlStatus::Unreachable && r.url.ends_with("/gone.png")));
        }

        #[tokio::test]
        async fn test_cycle_does_not_loop() {
            let server = MockServer::start().await;
            serve_html(&server, "/", r#"<a href="/loop">loop</a>"#).await;
            serve_html(&server, "/loop", r#"<a href="/">back</a>"#).await;

            let entry = normalize_url(&server.uri(), None).unwrap();
            let client = build_http_client(&Tuning::default()).unwrap();
            let outcome = run_crawl(&entry, &options(10, 5, false), &client, None)
                .await
                .unwrap();

            assert_eq!(outcome.resources.len(), 2);
        }

        struct StaticBrowser {
            html: String,
        }

        #[async_trait::async_trait]
        impl BrowserBackend for StaticBrowser {
            async fn render(
                &self,
                url: &str,
            ) -> std::result::Result<crate::browser::RenderedPage, crate::browser::BrowserError>
            {
                Ok(crate::browser::RenderedPage {
                    final_url: url.to_string(),
                    html: self.html.clone(),
                    resources: Vec::new(),
                })
            }
        }

        #[tokio::test]
        async fn test_challenge_falls_back_to_browser() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/"))
                .respond_with(ResponseTemplate::new(503).set_body_raw(
                    "<html><title>Just a moment...</title></html>".to_string(),
                    "text/html",
                ))
                .mount(&server)
                .await;

            let entry = normalize_url(&server.uri(), None).unwrap();
            let client = build_http_client(&Tuning::default()).unwrap();
            let browser = Arc::new(StaticBrowser {
                html: "<html><title>Real</title></html>".to_string(),
            });
            let outcome = run_crawl(&entry, &options(5, 2, false), &client, Some(browser))
                .await
                .unwrap();

            assert_eq!(outcome.resources.len(), 1);
            assert!(outcome.resources[0].via_browser);
            assert_eq!(outcome.resources[0].title.as_deref(), Some("Real"));
        }

        #[tokio::test]
        async fn test_challenge_without_browser_fails_entry() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/"))
                .respond_with(ResponseTemplate::new(503).set_body_raw(
                    "<html><title>Just a moment...</title></html>".to_string(),
                    "text/html",
                ))
                .mount(&server)
                .await;

            let entry = normalize_url(&server.uri(), None).unwrap();
            let client = build_http_client(&Tuning::default()).unwrap();
            let result = run_crawl(&entry, &options(5, 2, false), &client, None).await;

            assert!(matches!(
                result,
                Err(PagepackError::EntryUnreachable { .. })
            ));
        }
    }
}
