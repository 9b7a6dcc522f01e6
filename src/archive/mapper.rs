//! Path assignment: canonical URL to local relative path.
//!
//! Every fetched resource gets a unique forward-slash path inside the
//! archive, derived from its host and path segments. The entry document is
//! always `index.html` at the archive root so viewers can open a bundle
//! without reading the manifest first.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};
use url::Url;

use crate::crawler::FetchedResource;

/// Root document name for the entry URL
pub const ENTRY_DOCUMENT: &str = "index.html";

/// Longest sanitized path segment kept before truncation
const MAX_SEGMENT_LEN: usize = 100;

/// Injective mapping from canonical URL to archive-relative path
#[derive(Debug, Default)]
pub struct PathMap {
    inner: HashMap<String, String>,
}

impl PathMap {
    pub fn get(&self, url: &Url) -> Option<&str> {
        self.inner.get(url.as_str()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Assigns a local path to every fetched resource
///
/// Candidates are derived from host plus sanitized path segments, with an
/// extension inferred from the content type when the URL has none. A
/// candidate that collides with an already-assigned path (URLs differing
/// only by query string, or a file squatting on a needed directory name)
/// gets a deterministic suffix derived from the full URL, so reruns of the
/// identical crawl assign identical paths.
pub fn assign_paths(entry: &Url, resources: &[FetchedResource]) -> PathMap {
    let mut map = PathMap::default();
    let mut used_paths: HashSet<String> = HashSet::new();
    let mut used_dirs: HashSet<String> = HashSet::new();

    for resource in resources {
        let path = if resource.url == *entry {
            ENTRY_DOCUMENT.to_string()
        } else {
            let candidate = candidate_path(&resource.url, &resource.content_type);
            let candidate = avoid_file_ancestors(&candidate, &used_paths);
            disambiguate(candidate, resource.url.as_str(), &used_paths, &used_dirs)
        };

        reserve(&path, &mut used_paths, &mut used_dirs);
        map.inner.insert(resource.url.to_string(), path);
    }

    map
}

/// Derives the pre-collision candidate path for a URL
fn candidate_path(url: &Url, content_type: &str) -> String {
    let host = sanitize_segment(url.host_str().unwrap_or("unknown-host"));

    let mut segments: Vec<String> = url
        .path_segments()
        .map(|s| {
            s.filter(|seg| !seg.is_empty())
                .map(sanitize_segment)
                .collect()
        })
        .unwrap_or_default();

    // Directory-style URLs get an index document
    if segments.is_empty() || url.path().ends_with('/') {
        segments.push("index".to_string());
    }

    if let Some(last) = segments.last_mut() {
        if !has_extension(last) {
            if let Some(ext) = extension_for(content_type) {
                last.push('.');
                last.push_str(ext);
            }
        }
    }

    let mut path = host;
    for seg in segments {
        path.push('/');
        path.push_str(&seg);
    }
    path
}

/// Makes a candidate unique against everything assigned so far
fn disambiguate(
    candidate: String,
    url: &str,
    used_paths: &HashSet<String>,
    used_dirs: &HashSet<String>,
) -> String {
    if !conflicts(&candidate, used_paths, used_dirs) {
        return candidate;
    }

    // Suffix the stem with a hash of the full URL; extend the hash in the
    // (astronomically unlikely) case the short form still collides
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    let (stem, ext) = split_extension(&candidate);
    for hash_len in [8, 16, 32, digest.len()] {
        let suffixed = match ext {
            Some(ext) => format!("{}-{}.{}", stem, &digest[..hash_len], ext),
            None => format!("{}-{}", stem, &digest[..hash_len]),
        };
        if !conflicts(&suffixed, used_paths, used_dirs) {
            return suffixed;
        }
    }
    // Same URL cannot be assigned twice, so the full digest always wins
    format!("{}-{}", stem, digest)
}

/// A path conflicts when it is already taken or when it names an existing
/// directory
fn conflicts(path: &str, used_paths: &HashSet<String>, used_dirs: &HashSet<String>) -> bool {
    used_paths.contains(path) || used_dirs.contains(path)
}

/// An ancestor segment that is already assigned as a *file* cannot become a
/// directory; such segments get underscores appended until the conflict
/// clears. Deterministic because assignment order is the BFS order.
fn avoid_file_ancestors(candidate: &str, used_paths: &HashSet<String>) -> String {
    let segments: Vec<&str> = candidate.split('/').collect();
    let mut prefix = String::new();
    let mut out: Vec<String> = Vec::with_capacity(segments.len());

    for (i, raw) in segments.iter().enumerate() {
        let mut seg = (*raw).to_string();
        if i < segments.len() - 1 {
            loop {
                let trial = if prefix.is_empty() {
                    seg.clone()
                } else {
                    format!("{}/{}", prefix, seg)
                };
                if used_paths.contains(&trial) {
                    seg.push('_');
                } else {
                    break;
                }
            }
        }
        prefix = if prefix.is_empty() {
            seg.clone()
        } else {
            format!("{}/{}", prefix, seg)
        };
        out.push(seg);
    }

    out.join("/")
}

fn reserve(path: &str, used_paths: &mut HashSet<String>, used_dirs: &mut HashSet<String>) {
    used_paths.insert(path.to_string());
    let segments: Vec<&str> = path.split('/').collect();
    let mut prefix = String::new();
    for seg in &segments[..segments.len() - 1] {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(seg);
        used_dirs.insert(prefix.clone());
    }
}

/// Replaces filesystem-hostile characters and truncates oversized segments
fn sanitize_segment(segment: &str) -> String {
    let mut out: String = segment
        .chars()
        .map(|c| match c {
            '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if out == "." || out == ".." {
        out = "_".to_string();
    }
    if out.len() > MAX_SEGMENT_LEN {
        out.truncate(MAX_SEGMENT_LEN);
    }
    out
}

fn has_extension(segment: &str) -> bool {
    match segment.rfind('.') {
        Some(pos) => pos > 0 && pos < segment.len() - 1 && segment.len() - pos <= 8,
        None => false,
    }
}

fn split_extension(path: &str) -> (&str, Option<&str>) {
    let file_start = path.rfind('/').map(|p| p + 1).unwrap_or(0);
    let file = &path[file_start..];
    match file.rfind('.') {
        Some(pos) if pos > 0 => {
            let abs = file_start + pos;
            (&path[..abs], Some(&path[abs + 1..]))
        }
        _ => (path, None),
    }
}

/// Extension inferred from a declared media type
fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "text/html" | "application/xhtml+xml" => Some("html"),
        "text/css" => Some("css"),
        "application/javascript" | "text/javascript" | "application/x-javascript" => Some("js"),
        "application/json" => Some("json"),
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/svg+xml" => Some("svg"),
        "image/webp" => Some("webp"),
        "image/x-icon" | "image/vnd.microsoft.icon" => Some("ico"),
        "font/woff2" => Some("woff2"),
        "font/woff" | "application/font-woff" => Some("woff"),
        "font/ttf" => Some("ttf"),
        "font/otf" => Some("otf"),
        "text/plain" => Some("txt"),
        "application/pdf" => Some("pdf"),
        "text/xml" | "application/xml" => Some("xml"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "audio/mpeg" => Some("mp3"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(url: &str, content_type: &str) -> FetchedResource {
        let url = Url::parse(url).unwrap();
        FetchedResource {
            final_url: url.clone(),
            url,
            content_type: content_type.to_string(),
            body: Vec::new(),
            depth: 0,
            is_page: content_type == "text/html",
            same_origin: true,
            via_browser: false,
            references: Vec::new(),
            possibly_incomplete: false,
            title: None,
        }
    }

    fn entry() -> Url {
        Url::parse("https://a.test/").unwrap()
    }

    #[test]
    fn test_entry_maps_to_root_index() {
        let resources = vec![resource("https://a.test/", "text/html")];
        let map = assign_paths(&entry(), &resources);
        assert_eq!(map.get(&entry()), Some(ENTRY_DOCUMENT));
    }

    #[test]
    fn test_path_derived_from_host_and_segments() {
        let resources = vec![
            resource("https://a.test/", "text/html"),
            resource("https://a.test/blog/post.html", "text/html"),
        ];
        let map = assign_paths(&entry(), &resources);
        let url = Url::parse("https://a.test/blog/post.html").unwrap();
        assert_eq!(map.get(&url), Some("a.test/blog/post.html"));
    }

    #[test]
    fn test_extension_inferred_from_content_type() {
        let resources = vec![
            resource("https://a.test/", "text/html"),
            resource("https://a.test/styles/main", "text/css"),
            resource("https://a.test/about", "text/html"),
        ];
        let map = assign_paths(&entry(), &resources);
        let css = Url::parse("https://a.test/styles/main").unwrap();
        let about = Url::parse("https://a.test/about").unwrap();
        assert_eq!(map.get(&css), Some("a.test/styles/main.css"));
        assert_eq!(map.get(&about), Some("a.test/about.html"));
    }

    #[test]
    fn test_query_collision_disambiguated() {
        let resources = vec![
            resource("https://a.test/", "text/html"),
            resource("https://a.test/post?id=1", "text/html"),
            resource("https://a.test/post?id=2", "text/html"),
        ];
        let map = assign_paths(&entry(), &resources);
        let one = Url::parse("https://a.test/post?id=1").unwrap();
        let two = Url::parse("https://a.test/post?id=2").unwrap();
        let p1 = map.get(&one).unwrap().to_string();
        let p2 = map.get(&two).unwrap().to_string();
        assert_ne!(p1, p2);
        assert!(p1.starts_with("a.test/post"));
        assert!(p2.starts_with("a.test/post"));
    }

    #[test]
    fn test_assignment_is_deterministic() {
        let resources = vec![
            resource("https://a.test/", "text/html"),
            resource("https://a.test/post?id=1", "text/html"),
            resource("https://a.test/post?id=2", "text/html"),
        ];
        let first = assign_paths(&entry(), &resources);
        let second = assign_paths(&entry(), &resources);
        let one = Url::parse("https://a.test/post?id=2").unwrap();
        assert_eq!(first.get(&one), second.get(&one));
    }

    #[test]
    fn test_injective_over_all_resources() {
        let resources = vec![
            resource("https://a.test/", "text/html"),
            resource("https://a.test/post?id=1", "text/html"),
            resource("https://a.test/post?id=2", "text/html"),
            resource("https://a.test/post", "text/html"),
            resource("https://cdn.test/post", "text/css"),
        ];
        let map = assign_paths(&entry(), &resources);
        let paths: HashSet<&str> = map.iter().map(|(_, p)| p).collect();
        assert_eq!(paths.len(), resources.len());
    }

    #[test]
    fn test_page_without_extension_gets_html() {
        let resources = vec![
            resource("https://a.test/", "text/html"),
            resource("https://a.test/blog", "text/html"),
        ];
        let map = assign_paths(&entry(), &resources);
        let blog = Url::parse("https://a.test/blog").unwrap();
        assert_eq!(map.get(&blog), Some("a.test/blog.html"));
    }

    #[test]
    fn test_file_ancestor_conflict_resolved() {
        // "data" is assigned as a file first, then needed as a directory
        let resources = vec![
            resource("https://a.test/", "text/html"),
            resource("https://a.test/data", "application/octet-stream"),
            resource("https://a.test/data/file.png", "image/png"),
        ];
        let map = assign_paths(&entry(), &resources);
        let file = Url::parse("https://a.test/data").unwrap();
        let nested = Url::parse("https://a.test/data/file.png").unwrap();
        assert_eq!(map.get(&file), Some("a.test/data"));
        assert_eq!(map.get(&nested), Some("a.test/data_/file.png"));
    }

    #[test]
    fn test_directory_url_gets_index_document() {
        let resources = vec![
            resource("https://a.test/", "text/html"),
            resource("https://a.test/docs/", "text/html"),
        ];
        let map = assign_paths(&entry(), &resources);
        let docs = Url::parse("https://a.test/docs/").unwrap();
        assert_eq!(map.get(&docs), Some("a.test/docs/index.html"));
    }

    #[test]
    fn test_hostile_characters_sanitized() {
        let resources = vec![
            resource("https://a.test/", "text/html"),
            resource("https://a.test/a%20b/c%22d.png", "image/png"),
        ];
        let map = assign_paths(&entry(), &resources);
        let url = Url::parse("https://a.test/a%20b/c%22d.png").unwrap();
        // Percent-encoded segments stay encoded; encoding characters are safe
        assert_eq!(map.get(&url), Some("a.test/a%20b/c%22d.png"));
    }

    #[test]
    fn test_unknown_content_type_keeps_bare_name() {
        let resources = vec![
            resource("https://a.test/", "text/html"),
            resource("https://a.test/download/blob", "application/octet-stream"),
        ];
        let map = assign_paths(&entry(), &resources);
        let url = Url::parse("https://a.test/download/blob").unwrap();
        assert_eq!(map.get(&url), Some("a.test/download/blob"));
    }
}
