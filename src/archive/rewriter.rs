//! Reference rewriting: splice local paths into recorded spans.
//!
//! The rewriter is a byte splicer. It walks a document's resolved
//! references in document order and replaces each span whose target has a
//! path assignment with a path relative to the rewritten document's own
//! location. Bytes outside the spans are copied through untouched, so the
//! output diffs clean against the original everywhere except the
//! references themselves.

use crate::crawler::FetchedResource;

use super::mapper::PathMap;

/// Rewrites a fetched document against the completed path assignment
///
/// References with no assignment (failed fetches, foreign links, opaque
/// schemes) keep their original text. Fragments on rewritten references
/// are carried over, so `page#sec` becomes `page.html#sec`.
pub fn rewrite(resource: &FetchedResource, paths: &PathMap) -> Vec<u8> {
    let Some(own_path) = paths.get(&resource.url) else {
        return resource.body.clone();
    };

    let mut out = Vec::with_capacity(resource.body.len());
    let mut cursor = 0;

    for reference in &resource.references {
        let Some(target) = &reference.target else {
            continue;
        };
        let Some(target_path) = paths.get(target) else {
            continue;
        };
        // Spans arrive in ascending order; anything out of order or out of
        // bounds is skipped rather than risking a corrupt splice
        if reference.span.start < cursor || reference.span.end > resource.body.len() {
            continue;
        }

        let mut replacement = relative_path(own_path, target_path);
        if let Some(pos) = reference.raw.find('#') {
            replacement.push_str(&reference.raw[pos..]);
        }

        out.extend_from_slice(&resource.body[cursor..reference.span.start]);
        out.extend_from_slice(replacement.as_bytes());
        cursor = reference.span.end;
    }

    out.extend_from_slice(&resource.body[cursor..]);
    out
}

/// Path from the directory of `from` to `to`, both archive-relative
fn relative_path(from: &str, to: &str) -> String {
    let from_dir: Vec<&str> = {
        let mut segs: Vec<&str> = from.split('/').collect();
        segs.pop();
        segs
    };
    let to_segs: Vec<&str> = to.split('/').collect();

    let mut common = 0;
    while common < from_dir.len()
        && common < to_segs.len() - 1
        && from_dir[common] == to_segs[common]
    {
        common += 1;
    }

    let mut parts: Vec<&str> = Vec::new();
    for _ in common..from_dir.len() {
        parts.push("..");
    }
    parts.extend(&to_segs[common..]);
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::ResolvedReference;
    use crate::extract::RefKind;
    use url::Url;

    fn resource_with_refs(
        url: &str,
        body: &str,
        refs: Vec<(&str, std::ops::Range<usize>, &str)>,
    ) -> FetchedResource {
        let url = Url::parse(url).unwrap();
        FetchedResource {
            final_url: url.clone(),
            url,
            content_type: "text/html".to_string(),
            body: body.as_bytes().to_vec(),
            depth: 0,
            is_page: true,
            same_origin: true,
            via_browser: false,
            references: refs
                .into_iter()
                .map(|(raw, span, target)| ResolvedReference {
                    raw: raw.to_string(),
                    span,
                    kind: RefKind::Other,
                    target: (!target.is_empty()).then(|| Url::parse(target).unwrap()),
                })
                .collect(),
            possibly_incomplete: false,
            title: None,
        }
    }

    fn paths(entries: &[(&str, &str)]) -> PathMap {
        // Build through assign_paths-free construction: PathMap is opaque,
        // so go through a tiny crawl-shaped fixture instead
        let entry = Url::parse(entries[0].0).unwrap();
        let resources: Vec<FetchedResource> = entries
            .iter()
            .map(|(url, _)| resource_with_refs(url, "", Vec::new()))
            .collect();
        let map = super::super::mapper::assign_paths(&entry, &resources);
        for (url, expected) in entries {
            let url = Url::parse(url).unwrap();
            assert_eq!(map.get(&url), Some(*expected), "fixture path mismatch");
        }
        map
    }

    #[test]
    fn test_relative_path_same_directory() {
        assert_eq!(relative_path("index.html", "a.test/x.png"), "a.test/x.png");
        assert_eq!(relative_path("a.test/a.html", "a.test/b.html"), "b.html");
    }

    #[test]
    fn test_relative_path_up_and_across() {
        assert_eq!(
            relative_path("a.test/blog/post.html", "a.test/img/x.png"),
            "../img/x.png"
        );
        assert_eq!(
            relative_path("a.test/deep/er/page.html", "index.html"),
            "../../../index.html"
        );
    }

    #[test]
    fn test_rewrite_splices_assigned_reference() {
        let body = r#"<img src="https://a.test/logo.png">"#;
        let start = body.find("https").unwrap();
        let r = resource_with_refs(
            "https://a.test/",
            body,
            vec![(
                "https://a.test/logo.png",
                start..start + "https://a.test/logo.png".len(),
                "https://a.test/logo.png",
            )],
        );
        let map = paths(&[
            ("https://a.test/", "index.html"),
            ("https://a.test/logo.png", "a.test/logo.png"),
        ]);
        let rewritten = rewrite(&r, &map);
        assert_eq!(
            String::from_utf8(rewritten).unwrap(),
            r#"<img src="a.test/logo.png">"#
        );
    }

    #[test]
    fn test_unassigned_reference_left_verbatim() {
        let body = r#"<img src="https://gone.test/x.png">"#;
        let start = body.find("https").unwrap();
        let r = resource_with_refs(
            "https://a.test/",
            body,
            vec![(
                "https://gone.test/x.png",
                start..start + "https://gone.test/x.png".len(),
                "https://gone.test/x.png",
            )],
        );
        let map = paths(&[("https://a.test/", "index.html")]);
        assert_eq!(rewrite(&r, &map), body.as_bytes());
    }

    #[test]
    fn test_fragment_carried_over() {
        let body = r#"<a href="/about#team">team</a>"#;
        let start = body.find("/about").unwrap();
        let r = resource_with_refs(
            "https://a.test/",
            body,
            vec![(
                "/about#team",
                start..start + "/about#team".len(),
                "https://a.test/about",
            )],
        );
        let map = paths(&[
            ("https://a.test/", "index.html"),
            ("https://a.test/about", "a.test/about.html"),
        ]);
        let rewritten = String::from_utf8(rewrite(&r, &map)).unwrap();
        assert_eq!(rewritten, r#"<a href="a.test/about.html#team">team</a>"#);
    }

    #[test]
    fn test_bytes_outside_spans_untouched() {
        let body = "AAAA<a href=\"/x\">BBBB</a>CCCC";
        let start = body.find("/x").unwrap();
        let r = resource_with_refs(
            "https://a.test/",
            body,
            vec![("/x", start..start + 2, "https://a.test/x")],
        );
        let map = paths(&[
            ("https://a.test/", "index.html"),
            ("https://a.test/x", "a.test/x.html"),
        ]);
        let rewritten = String::from_utf8(rewrite(&r, &map)).unwrap();
        let (before, rest) = rewritten.split_once("a.test/x.html").unwrap();
        assert_eq!(before, &body[..start]);
        assert_eq!(rest, &body[start + 2..]);
    }

    #[test]
    fn test_document_without_assignment_returned_unchanged() {
        let r = resource_with_refs("https://never.test/", "<p>hi</p>", Vec::new());
        let map = paths(&[("https://a.test/", "index.html")]);
        assert_eq!(rewrite(&r, &map), b"<p>hi</p>");
    }

    #[test]
    fn test_non_fetchable_reference_untouched() {
        let body = r#"<a href="mailto:x@a.test">mail</a>"#;
        let start = body.find("mailto").unwrap();
        let r = resource_with_refs(
            "https://a.test/",
            body,
            vec![("mailto:x@a.test", start..start + "mailto:x@a.test".len(), "")],
        );
        let map = paths(&[("https://a.test/", "index.html")]);
        assert_eq!(rewrite(&r, &map), body.as_bytes());
    }
}
