//! Span-aware HTML reference scanner.
//!
//! A purpose-built byte scanner rather than a DOM parse: a DOM loses the
//! byte offsets the rewriter needs, and re-serializing a parsed tree would
//! rewrite the whole document instead of just the reference spans. The
//! scanner walks tags and attributes directly, which also keeps malformed
//! markup from derailing extraction (unknown constructs are skipped, never
//! guessed at).

use std::ops::Range;

use super::{css, js, Extraction, RefKind, Reference};

/// Extracts all references from an HTML document
pub fn extract(body: &[u8]) -> Extraction {
    let mut out = Extraction::default();
    let mut i = 0;

    while i < body.len() {
        if body[i] != b'<' {
            i += 1;
            continue;
        }

        // Comments, doctype, processing instructions, closing tags
        if body[i..].starts_with(b"<!--") {
            i = find(body, i + 4, b"-->").map(|p| p + 3).unwrap_or(body.len());
            continue;
        }
        if matches!(body.get(i + 1), Some(b'!') | Some(b'?') | Some(b'/')) {
            i = find(body, i + 1, b">").map(|p| p + 1).unwrap_or(body.len());
            continue;
        }

        let Some((tag, after_name)) = read_tag_name(body, i + 1) else {
            i += 1;
            continue;
        };

        let (attrs, tag_end) = read_attributes(body, after_name);
        collect_tag_references(body, &tag, &attrs, &mut out);
        i = tag_end;

        // Raw text elements: skip past the body, scanning it with the
        // matching extractor where it carries content
        if tag == "style" {
            let end = find_ci(body, i, b"</style").unwrap_or(body.len());
            out.references.extend(css::extract(&body[i..end], i));
            i = end;
        } else if tag == "script" {
            let end = find_ci(body, i, b"</script").unwrap_or(body.len());
            if !attrs.iter().any(|a| a.name == "src") {
                let (refs, incomplete) = js::extract(&body[i..end], i);
                out.references.extend(refs);
                out.possibly_incomplete |= incomplete;
            }
            i = end;
        }
    }

    out
}

struct Attribute {
    name: String,
    /// Byte range of the value, quotes excluded
    value: Range<usize>,
}

/// Reads a tag name starting at `start`; returns None if this is not a tag
fn read_tag_name(body: &[u8], start: usize) -> Option<(String, usize)> {
    let mut j = start;
    while j < body.len() && (body[j].is_ascii_alphanumeric() || body[j] == b'-') {
        j += 1;
    }
    if j == start {
        return None;
    }
    let name = std::str::from_utf8(&body[start..j]).ok()?.to_lowercase();
    Some((name, j))
}

/// Reads attributes up to the closing `>`, returning them plus the index
/// just past the `>`
fn read_attributes(body: &[u8], mut j: usize) -> (Vec<Attribute>, usize) {
    let mut attrs = Vec::new();

    loop {
        while j < body.len() && (body[j].is_ascii_whitespace() || body[j] == b'/') {
            j += 1;
        }
        if j >= body.len() {
            return (attrs, j);
        }
        if body[j] == b'>' {
            return (attrs, j + 1);
        }

        // Attribute name
        let name_start = j;
        while j < body.len() && !body[j].is_ascii_whitespace() && body[j] != b'=' && body[j] != b'>'
        {
            j += 1;
        }
        let name = match std::str::from_utf8(&body[name_start..j]) {
            Ok(s) => s.to_lowercase(),
            Err(_) => String::new(),
        };

        while j < body.len() && body[j].is_ascii_whitespace() {
            j += 1;
        }
        if j >= body.len() || body[j] != b'=' {
            continue; // boolean attribute
        }
        j += 1;
        while j < body.len() && body[j].is_ascii_whitespace() {
            j += 1;
        }
        if j >= body.len() {
            return (attrs, j);
        }

        let value = if body[j] == b'"' || body[j] == b'\'' {
            let quote = body[j];
            let start = j + 1;
            let end = find_byte(body, start, quote).unwrap_or(body.len());
            j = (end + 1).min(body.len());
            start..end
        } else {
            let start = j;
            while j < body.len() && !body[j].is_ascii_whitespace() && body[j] != b'>' {
                j += 1;
            }
            start..j
        };

        if !name.is_empty() {
            attrs.push(Attribute { name, value });
        }
    }
}

fn collect_tag_references(body: &[u8], tag: &str, attrs: &[Attribute], out: &mut Extraction) {
    let rel = attr_text(body, attrs, "rel").map(|s| s.to_lowercase());
    let as_attr = attr_text(body, attrs, "as").map(|s| s.to_lowercase());

    for attr in attrs {
        let kind = match (tag, attr.name.as_str()) {
            ("a" | "area", "href") => RefKind::PageLink,
            ("iframe" | "frame", "src") => RefKind::PageLink,
            ("link", "href") => link_kind(rel.as_deref(), as_attr.as_deref()),
            ("img", "src") => RefKind::Image,
            ("img" | "source", "srcset") => {
                push_srcset(body, attr.value.clone(), out);
                continue;
            }
            ("script", "src") => RefKind::Script,
            ("video" | "audio" | "source" | "track" | "embed", "src") => RefKind::Other,
            ("video", "poster") => RefKind::Image,
            ("object", "data") => RefKind::Other,
            (_, "style") => {
                out.references
                    .extend(css::extract(&body[attr.value.clone()], attr.value.start));
                continue;
            }
            _ => continue,
        };
        push_reference(body, attr.value.clone(), kind, out);
    }
}

fn link_kind(rel: Option<&str>, as_attr: Option<&str>) -> RefKind {
    match rel {
        Some(r) if r.contains("stylesheet") => RefKind::Stylesheet,
        Some(r) if r.contains("icon") => RefKind::Image,
        Some(r) if r.contains("preload") || r.contains("prefetch") => match as_attr {
            Some("font") => RefKind::Font,
            Some("image") => RefKind::Image,
            Some("style") => RefKind::Stylesheet,
            Some("script") => RefKind::Script,
            _ => RefKind::Other,
        },
        _ => RefKind::Other,
    }
}

/// Each srcset candidate URL is its own reference; descriptors (`2x`,
/// `480w`) stay out of the span so rewriting leaves them intact.
fn push_srcset(body: &[u8], value: Range<usize>, out: &mut Extraction) {
    let mut pos = value.start;
    while pos < value.end {
        // Skip leading whitespace and commas
        while pos < value.end && (body[pos].is_ascii_whitespace() || body[pos] == b',') {
            pos += 1;
        }
        let url_start = pos;
        while pos < value.end && !body[pos].is_ascii_whitespace() && body[pos] != b',' {
            pos += 1;
        }
        if pos > url_start {
            push_reference(body, url_start..pos, RefKind::Image, out);
        }
        // Skip the descriptor up to the next comma
        while pos < value.end && body[pos] != b',' {
            pos += 1;
        }
    }
}

fn push_reference(body: &[u8], span: Range<usize>, kind: RefKind, out: &mut Extraction) {
    let Ok(text) = std::str::from_utf8(&body[span.clone()]) else {
        return;
    };
    let raw = text.trim();
    if raw.is_empty() {
        return;
    }
    // Adjust the span to the trimmed text
    let lead = text.len() - text.trim_start().len();
    let span = span.start + lead..span.start + lead + raw.len();
    out.references.push(Reference {
        raw: raw.to_string(),
        span,
        kind,
    });
}

fn attr_text<'a>(body: &'a [u8], attrs: &[Attribute], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|a| a.name == name)
        .and_then(|a| std::str::from_utf8(&body[a.value.clone()]).ok())
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

fn find_ci(body: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= body.len() {
        return None;
    }
    body[from..]
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|p| from + p)
}

fn find_byte(body: &[u8], from: usize, byte: u8) -> Option<usize> {
    body[from..].iter().position(|&b| b == byte).map(|p| from + p)
}
