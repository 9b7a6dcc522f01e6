//! Chromium backend for the browser fallback.

use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, GetResponseBodyParams,
};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::fetch;

use super::{BrowserBackend, BrowserError, CapturedResponse, RenderedPage};

/// User agent presented by the headless browser. A realistic desktop Chrome
/// string, not the archiver identity, because the whole point of the
/// fallback is to look like the browser it actually is.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// JavaScript to wait for page ready state.
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// How long to let an interstitial run before giving up on the render
const CHALLENGE_SETTLE_MILLIS: u64 = 5000;

/// Browser fallback driven by headless Chromium over CDP
pub struct ChromiumBackend {
    browser: Mutex<Browser>,
    timeout: Duration,
}

impl ChromiumBackend {
    /// Launches a headless Chromium instance
    pub async fn launch(timeout: Duration) -> Result<Self, BrowserError> {
        let config = BrowserConfig::builder()
            .arg(format!("--user-agent={}", BROWSER_USER_AGENT))
            .build()
            .map_err(BrowserError::Backend)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Backend(e.to_string()))?;

        // The handler future must be polled for the browser connection to
        // make progress.
        tokio::spawn(async move {
            while let Some(result) = handler.next().await {
                if let Err(e) = result {
                    debug!("browser handler: {}", e);
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            timeout,
        })
    }

    async fn render_inner(&self, page: &Page, url: &str) -> Result<RenderedPage, BrowserError> {
        page.execute(EnableParams::default())
            .await
            .map_err(|e| BrowserError::Backend(e.to_string()))?;

        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| BrowserError::Backend(e.to_string()))?;

        self.navigate(page, url).await?;
        wait_for_page_ready(page, self.timeout).await;

        // If the interstitial is still up, give it time to run its
        // verification and swap in the real content.
        let mut html = self.page_content(page).await?;
        if looks_like_challenge(&html) {
            debug!("Challenge interstitial still present, waiting for it to settle");
            tokio::time::sleep(Duration::from_millis(CHALLENGE_SETTLE_MILLIS)).await;
            wait_for_page_ready(page, self.timeout).await;
            html = self.page_content(page).await?;
            if looks_like_challenge(&html) {
                return Err(BrowserError::ChallengeUnsolved(url.to_string()));
            }
        }

        let final_url = page
            .url()
            .await
            .map_err(|e| BrowserError::Backend(e.to_string()))?
            .unwrap_or_else(|| url.to_string());

        // Drain the response events observed so far and pull their bodies.
        // Bodies that are gone from the browser cache are skipped; the
        // crawler re-fetches anything it still needs.
        let mut resources = Vec::new();
        while let Some(event) = next_buffered_event(&mut responses) {
            if event.response.url == final_url {
                continue;
            }
            let body_params = GetResponseBodyParams::new(event.request_id.clone());
            let body = match page.execute(body_params).await {
                Ok(result) => {
                    if result.result.base64_encoded {
                        use base64::Engine;
                        match base64::engine::general_purpose::STANDARD.decode(&result.result.body)
                        {
                            Ok(bytes) => bytes,
                            Err(_) => continue,
                        }
                    } else {
                        result.result.body.clone().into_bytes()
                    }
                }
                Err(e) => {
                    debug!("No body for {}: {}", event.response.url, e);
                    continue;
                }
            };
            resources.push(CapturedResponse {
                url: event.response.url.clone(),
                content_type: fetch::media_type(&event.response.mime_type),
                body,
            });
        }

        Ok(RenderedPage {
            final_url,
            html,
            resources,
        })
    }

    async fn navigate(&self, page: &Page, url: &str) -> Result<(), BrowserError> {
        let nav_params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(BrowserError::Backend)?;

        tokio::time::timeout(self.timeout, page.execute(nav_params))
            .await
            .map_err(|_| BrowserError::Backend(format!("Navigation timed out for {}", url)))?
            .map_err(|e| BrowserError::Backend(format!("Navigation failed for {}: {}", url, e)))?;

        Ok(())
    }

    async fn page_content(&self, page: &Page) -> Result<String, BrowserError> {
        page.content()
            .await
            .map_err(|e| BrowserError::Backend(e.to_string()))
    }
}

#[async_trait::async_trait]
impl BrowserBackend for ChromiumBackend {
    async fn render(&self, url: &str) -> Result<RenderedPage, BrowserError> {
        let browser = self.browser.lock().await;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Backend(e.to_string()))?;
        drop(browser);

        let result = self.render_inner(&page, url).await;
        if let Err(e) = page.close().await {
            warn!("Failed to close browser page: {}", e);
        }
        result
    }
}

/// Wait for the page to reach a ready state.
async fn wait_for_page_ready(page: &Page, timeout: Duration) {
    match tokio::time::timeout(timeout, page.evaluate(WAIT_FOR_READY_SCRIPT.to_string())).await {
        Ok(Ok(result)) => {
            let state: String = result
                .into_value()
                .unwrap_or_else(|_| "unknown".to_string());
            debug!("Page ready state: {}", state);
        }
        Ok(Err(e)) => {
            debug!("Could not check ready state: {}", e);
        }
        Err(_) => {
            warn!("Timeout waiting for page ready state");
        }
    }
}

fn looks_like_challenge(html: &str) -> bool {
    fetch::is_challenge(503, "text/html", html.as_bytes())
        || fetch::is_challenge(403, "text/html", html.as_bytes())
}

/// Pulls already-buffered events off the listener without awaiting new ones
fn next_buffered_event(
    stream: &mut (impl futures::Stream<Item = std::sync::Arc<EventResponseReceived>> + Unpin),
) -> Option<std::sync::Arc<EventResponseReceived>> {
    use futures::task::noop_waker;
    use std::task::{Context, Poll};

    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);
    match stream.poll_next_unpin(&mut cx) {
        Poll::Ready(Some(event)) => Some(event),
        _ => None,
    }
}
