//! Reference extraction
//!
//! Given a fetched document's bytes and declared media type, the extractor
//! produces every outbound reference in document order, each with the exact
//! byte span it occupies in the source. The spans are what make rewriting
//! possible later: the rewriter splices replacement paths into those spans
//! and leaves every other byte untouched.
//!
//! One extractor per syntax:
//! - HTML: URL-carrying attributes, `srcset` candidate lists, inline
//!   `style` attributes, `<style>` blocks, inline `<script>` bodies
//! - CSS: `url()` and `@import`
//! - JS: string-literal `import`/`fetch`/`new URL` arguments only; no
//!   execution, so dynamic references are missed and the document is
//!   flagged as possibly incomplete when a non-literal argument is seen

mod css;
mod html;
mod js;

use std::borrow::Cow;
use std::ops::Range;

/// What role the referenced resource plays in the referencing document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// A navigation link to another page. The only kind that consumes
    /// crawl depth and page budget.
    PageLink,
    Image,
    Stylesheet,
    Script,
    Font,
    /// Everything else that is still fetchable (media, frames-as-assets,
    /// preloads without a known type)
    Other,
}

impl RefKind {
    /// Page links follow the depth-bounded frontier; everything else is an
    /// asset of the page it appears in.
    pub fn is_page_link(self) -> bool {
        matches!(self, RefKind::PageLink)
    }
}

/// One outbound reference found in a document
#[derive(Debug, Clone)]
pub struct Reference {
    /// The reference text exactly as it appears in the source bytes
    pub raw: String,
    /// Byte range of `raw` within the source document
    pub span: Range<usize>,
    pub kind: RefKind,
}

impl Reference {
    /// The reference text with minimal HTML entity decoding applied, for
    /// URL resolution. `&amp;` is the only entity that legitimately shows
    /// up inside attribute URLs.
    pub fn url_text(&self) -> Cow<'_, str> {
        if self.raw.contains("&amp;") {
            Cow::Owned(self.raw.replace("&amp;", "&"))
        } else {
            Cow::Borrowed(&self.raw)
        }
    }
}

/// Result of extracting one document
#[derive(Debug, Default)]
pub struct Extraction {
    /// References in document order
    pub references: Vec<Reference>,
    /// True when the document contained dynamic reference patterns the
    /// extractor cannot follow (computed import/fetch arguments)
    pub possibly_incomplete: bool,
}

/// Extracts all references from a document, dispatching on media type
///
/// Unknown media types (images, fonts, binaries) produce no references.
pub fn extract_references(content_type: &str, body: &[u8]) -> Extraction {
    if is_html(content_type) {
        html::extract(body)
    } else if content_type == "text/css" {
        Extraction {
            references: css::extract(body, 0),
            possibly_incomplete: false,
        }
    } else if is_javascript(content_type) {
        let (references, possibly_incomplete) = js::extract(body, 0);
        Extraction {
            references,
            possibly_incomplete,
        }
    } else {
        Extraction::default()
    }
}

/// Checks whether a media type names an HTML document
pub fn is_html(content_type: &str) -> bool {
    content_type == "text/html" || content_type == "application/xhtml+xml"
}

fn is_javascript(content_type: &str) -> bool {
    matches!(
        content_type,
        "application/javascript" | "text/javascript" | "application/x-javascript"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_on_media_type() {
        let html = b"<a href=\"/next\">next</a>";
        assert_eq!(extract_references("text/html", html).references.len(), 1);

        let css = b"body { background: url(/bg.png); }";
        assert_eq!(extract_references("text/css", css).references.len(), 1);

        let js = b"import(\"/mod.js\");";
        assert_eq!(
            extract_references("text/javascript", js).references.len(),
            1
        );

        assert!(extract_references("image/png", b"\x89PNG")
            .references
            .is_empty());
    }

    #[test]
    fn test_spans_index_into_source() {
        let html = b"<img src=\"/a.png\">";
        let extraction = extract_references("text/html", html);
        let r = &extraction.references[0];
        assert_eq!(&html[r.span.clone()], r.raw.as_bytes());
    }

    #[test]
    fn test_url_text_decodes_amp_entity() {
        let r = Reference {
            raw: "/post?a=1&amp;b=2".to_string(),
            span: 0..17,
            kind: RefKind::PageLink,
        };
        assert_eq!(r.url_text(), "/post?a=1&b=2");
    }
}
