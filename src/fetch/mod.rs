//! HTTP fetcher
//!
//! This module handles all direct HTTP requests for the crawler:
//! - Building the HTTP client with the configured user agent and timeouts
//! - GET requests for pages and assets
//! - Detection of bot-challenge responses, which the crawler escalates to
//!   the browser-automation fallback
//! - Error classification

use crate::config::Tuning;
use reqwest::Client;
use std::time::Duration;

/// Body markers that identify an anti-bot interstitial. A 403/503 HTML
/// response matching any of these means the real content was withheld and a
/// browser render is needed.
const CHALLENGE_MARKERS: &[&str] = &[
    "Just a moment",
    "cf-chl",
    "_cf_chl_opt",
    "Checking your browser",
    "Attention Required!",
    "DDoS protection by",
    "challenge-platform",
];

/// Result of a direct fetch attempt
#[derive(Debug)]
pub enum FetchOutcome {
    /// Successfully fetched the resource
    Fetched {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status: u16,
        /// Content-Type, media type only (parameters stripped)
        content_type: String,
        /// Raw response body
        body: Vec<u8>,
    },

    /// The response is a bot challenge; a browser render may still succeed
    Challenge {
        /// HTTP status of the challenge response
        status: u16,
    },

    /// Non-success HTTP status that is not a challenge
    HttpError { status: u16 },

    /// Network-level failure (connect error, timeout, TLS)
    NetworkError { error: String },
}

/// Builds the HTTP client used for all direct fetches
///
/// Redirects are followed by reqwest with its default limit of 10 hops, so
/// redirect loops and unbounded chains surface as errors instead of hanging
/// the crawl.
pub fn build_http_client(tuning: &Tuning) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(tuning.user_agent.header_value())
        .timeout(Duration::from_secs(tuning.fetch.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL and classifies the response
///
/// Timeouts and connection failures are reported as `NetworkError`; the
/// crawler treats them the same as any other failed fetch (one browser
/// fallback attempt, then unreachable).
pub async fn fetch_url(client: &Client, url: &str) -> FetchOutcome {
    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            let error = if e.is_timeout() {
                "request timeout".to_string()
            } else if e.is_connect() {
                "connection failed".to_string()
            } else if e.is_redirect() {
                "redirect limit exceeded".to_string()
            } else {
                e.to_string()
            };
            return FetchOutcome::NetworkError { error };
        }
    };

    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let content_type = media_type(
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or(""),
    );

    let body = match response.bytes().await {
        Ok(b) => b.to_vec(),
        Err(e) => {
            return FetchOutcome::NetworkError {
                error: format!("body read failed: {}", e),
            }
        }
    };

    if is_challenge(status, &content_type, &body) {
        return FetchOutcome::Challenge { status };
    }

    if !(200..300).contains(&status) {
        return FetchOutcome::HttpError { status };
    }

    FetchOutcome::Fetched {
        final_url,
        status,
        content_type,
        body,
    }
}

/// Strips parameters from a Content-Type header value
///
/// `text/html; charset=utf-8` becomes `text/html`.
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

/// Checks whether a response looks like an anti-bot challenge
///
/// A 403/503 alone is not enough: plenty of sites return those statuses for
/// ordinary missing/broken resources. The body has to carry one of the
/// known interstitial markers.
pub fn is_challenge(status: u16, content_type: &str, body: &[u8]) -> bool {
    if status != 403 && status != 503 {
        return false;
    }
    if !content_type.contains("html") {
        return false;
    }

    // Challenge pages are small; only scan the first 64 KiB. Lossy decoding
    // keeps a code point split at the window edge from hiding a marker (the
    // markers themselves are ASCII).
    let head = &body[..body.len().min(64 * 1024)];
    let text = String::from_utf8_lossy(head);

    CHALLENGE_MARKERS.iter().any(|marker| text.contains(marker))
}
