use crate::UrlError;
use url::Url;

/// Normalizes a URL into the canonical form used as crawl identity
///
/// # Normalization Steps
///
/// 1. Resolve the (possibly relative) reference against `base`, if given
/// 2. Reject non-http(s) schemes
/// 3. Lowercase the host
/// 4. Normalize path: remove dot segments and duplicate slashes, drop the
///    trailing slash (except for the root `/`), empty path becomes `/`
/// 5. Remove the fragment (fragments never change what is fetched)
/// 6. Sort query pairs byte-wise, keeping their percent-encoding intact;
///    drop an empty query string
///
/// Default ports are removed by the `url` crate itself, so
/// `https://example.com:443/` and `https://example.com/` normalize to the
/// same CanonicalURL.
///
/// # Arguments
///
/// * `raw` - The URL string to normalize, absolute or relative
/// * `base` - Base URL for resolving relative references
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - Unparsable URL or unsupported scheme
///
/// # Examples
///
/// ```
/// use pagepack::url::normalize_url;
///
/// let url = normalize_url("https://EXAMPLE.COM/a/../b/#frag", None).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/b");
/// ```
pub fn normalize_url(raw: &str, base: Option<&Url>) -> Result<Url, UrlError> {
    let raw = raw.trim();

    let mut url = match base {
        Some(base) => base
            .join(raw)
            .map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?,
        None => Url::parse(raw).map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?,
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::UnsupportedScheme(url.scheme().to_string()));
    }

    if let Some(host) = url.host_str() {
        let lowered = host.to_lowercase();
        if lowered != host {
            url.set_host(Some(&lowered))
                .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
        }
    } else {
        return Err(UrlError::MissingHost);
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    // Sort the raw pairs without decoding: decoding would turn an encoded
    // separator (%26, %3D) into a literal one and merge distinct URLs
    if let Some(query) = url.query().map(str::to_string) {
        let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
        pairs.sort_unstable();
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&pairs.join("&")));
        }
    }

    Ok(url)
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let segments: Vec<&str> = path.split('/').collect();
    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in segments {
        match segment {
            // Skip empty segments (from duplicate slashes) and current
            // directory markers
            "" | "." => continue,
            ".." => {
                if !normalized_segments.is_empty() {
                    normalized_segments.pop();
                }
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", normalized_segments.join("/"))
}
