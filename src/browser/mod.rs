//! Browser-automation fallback
//!
//! When a direct fetch hits an anti-bot challenge or fails outright, the
//! crawler retries the URL once through a [`BrowserBackend`]: a headless
//! browser that navigates to the page, solves whatever interstitial the site
//! throws at it by actually executing it, and hands back the rendered HTML
//! plus the sub-resource responses it observed on the wire.
//!
//! The default implementation drives Chromium over CDP (cargo feature
//! `browser`). Everything else in the crate only sees the trait, so tests
//! substitute their own backend.

#[cfg(feature = "browser")]
mod chromium;

#[cfg(feature = "browser")]
pub use chromium::ChromiumBackend;

use async_trait::async_trait;
use thiserror::Error;

/// A sub-resource response observed by the browser while rendering a page
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    /// Absolute URL of the sub-resource
    pub url: String,
    /// Media type of the response (parameters stripped)
    pub content_type: String,
    /// Response body
    pub body: Vec<u8>,
}

/// Result of a successful browser render
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// URL the browser ended up on after redirects and challenge hops
    pub final_url: String,
    /// Serialized DOM after the page settled
    pub html: String,
    /// Sub-resource responses observed during the render. The crawler adopts
    /// these directly instead of re-fetching them.
    pub resources: Vec<CapturedResponse>,
}

/// Errors from the browser backend
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The interstitial never resolved into real content. The crawler maps
    /// this to an unreachable fetch.
    #[error("Challenge unsolved for {0}")]
    ChallengeUnsolved(String),

    #[error("Browser backend error: {0}")]
    Backend(String),
}

/// A capability that renders a URL in a real browser and reports what it saw
#[async_trait]
pub trait BrowserBackend: Send + Sync {
    /// Navigates to `url`, waits for the page to settle, and returns the
    /// rendered document plus observed sub-resource responses.
    async fn render(&self, url: &str) -> Result<RenderedPage, BrowserError>;
}
