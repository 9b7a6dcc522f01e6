//! CSS reference scanner: `url()` and `@import`.

use std::ops::Range;

use super::{RefKind, Reference};

/// Extracts references from a CSS document or fragment
///
/// `offset` is added to every span, so the scanner works on `<style>`
/// blocks and inline `style` attributes as well as whole stylesheets.
pub fn extract(body: &[u8], offset: usize) -> Vec<Reference> {
    let mut refs = Vec::new();
    let mut font_face_depth: Option<u32> = None;
    let mut i = 0;

    while i < body.len() {
        // Comments
        if body[i..].starts_with(b"/*") {
            i = find(body, i + 2, b"*/").map(|p| p + 2).unwrap_or(body.len());
            continue;
        }

        // Track whether we are inside an @font-face block, so its url()
        // references are classified as fonts
        if starts_with_ci(&body[i..], b"@font-face") {
            font_face_depth = Some(0);
            i += b"@font-face".len();
            continue;
        }
        if let Some(depth) = font_face_depth {
            match body[i] {
                b'{' => font_face_depth = Some(depth + 1),
                b'}' => {
                    font_face_depth = if depth <= 1 { None } else { Some(depth - 1) };
                }
                _ => {}
            }
        }

        if starts_with_ci(&body[i..], b"url(") {
            let after = i + 4;
            if let Some((span, next)) = read_url_argument(body, after) {
                let kind = if font_face_depth.is_some() {
                    RefKind::Font
                } else {
                    RefKind::Other
                };
                push(body, span, offset, kind, &mut refs);
                i = next;
                continue;
            }
        }

        if starts_with_ci(&body[i..], b"@import") {
            let mut j = i + b"@import".len();
            while j < body.len() && body[j].is_ascii_whitespace() {
                j += 1;
            }
            // The url(...) form is caught by the url( scanner above; handle
            // the bare string form here
            if j < body.len() && (body[j] == b'"' || body[j] == b'\'') {
                let quote = body[j];
                let start = j + 1;
                if let Some(end) = find_byte(body, start, quote) {
                    push(body, start..end, offset, RefKind::Stylesheet, &mut refs);
                    i = end + 1;
                    continue;
                }
            }
        }

        i += 1;
    }

    refs
}

/// Reads the argument of `url(`, quotes and surrounding whitespace
/// excluded; returns the URL span and the index past the closing paren
fn read_url_argument(body: &[u8], mut j: usize) -> Option<(Range<usize>, usize)> {
    while j < body.len() && body[j].is_ascii_whitespace() {
        j += 1;
    }
    if j >= body.len() {
        return None;
    }

    if body[j] == b'"' || body[j] == b'\'' {
        let quote = body[j];
        let start = j + 1;
        let end = find_byte(body, start, quote)?;
        let close = find_byte(body, end + 1, b')')?;
        Some((start..end, close + 1))
    } else {
        let start = j;
        let close = find_byte(body, start, b')')?;
        let mut end = close;
        while end > start && body[end - 1].is_ascii_whitespace() {
            end -= 1;
        }
        Some((start..end, close + 1))
    }
}

fn push(body: &[u8], span: Range<usize>, offset: usize, kind: RefKind, refs: &mut Vec<Reference>) {
    let Ok(text) = std::str::from_utf8(&body[span.clone()]) else {
        return;
    };
    if text.is_empty() {
        return;
    }
    refs.push(Reference {
        raw: text.to_string(),
        span: span.start + offset..span.end + offset,
        kind,
    });
}

fn starts_with_ci(haystack: &[u8], prefix: &[u8]) -> bool {
    haystack.len() >= prefix.len() && haystack[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn find(body: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= body.len() {
        return None;
    }
    body[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| from + p)
}

fn find_byte(body: &[u8], from: usize, byte: u8) -> Option<usize> {
    if from >= body.len() {
        return None;
    }
    body[from..].iter().position(|&b| b == byte).map(|p| from + p)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(css: &str) -> Vec<Reference> {
        extract(css.as_bytes(), 0)
    }

    #[test]
    fn test_bare_url() {
        let css = "body { background: url(/bg.png); }";
        let r = refs(css);
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].raw, "/bg.png");
        assert_eq!(&css.as_bytes()[r[0].span.clone()], b"/bg.png");
    }

    #[test]
    fn test_quoted_url() {
        let r = refs(r#"div { background: url("/img/a b.png"); }"#);
        assert_eq!(r[0].raw, "/img/a b.png");
    }

    #[test]
    fn test_import_string_form() {
        let r = refs(r#"@import "theme.css";"#);
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].raw, "theme.css");
        assert_eq!(r[0].kind, RefKind::Stylesheet);
    }

    #[test]
    fn test_import_url_form() {
        let r = refs("@import url(theme.css);");
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].raw, "theme.css");
    }

    #[test]
    fn test_font_face_url_is_font_kind() {
        let css = r#"
            @font-face { font-family: X; src: url(/fonts/x.woff2) format("woff2"); }
            body { background: url(/bg.png); }
        "#;
        let r = refs(css);
        assert_eq!(r[0].kind, RefKind::Font);
        assert_eq!(r[1].kind, RefKind::Other);
    }

    #[test]
    fn test_comments_skipped() {
        let r = refs("/* url(/not-this.png) */ a { background: url(/real.png); }");
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].raw, "/real.png");
    }

    #[test]
    fn test_whitespace_inside_url_parens() {
        let css = "a { background: url( /pad.png ); }";
        let r = refs(css);
        assert_eq!(r[0].raw, "/pad.png");
        assert_eq!(&css.as_bytes()[r[0].span.clone()], b"/pad.png");
    }

    #[test]
    fn test_offset_applied_to_spans() {
        let r = extract(b"url(/x.png)", 100);
        assert_eq!(r[0].span, 104..110);
    }

    #[test]
    fn test_unterminated_url_ignored() {
        assert!(refs("a { background: url(/broken").is_empty());
    }
}
