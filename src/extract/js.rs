//! Best-effort JavaScript reference scanner.
//!
//! No execution and no real parsing: only references sitting in plain
//! string literals directly inside well-known loading constructs are
//! extracted. Anything computed (template interpolation, variables,
//! concatenation) is skipped and reported as a possibly-incomplete
//! extraction so the manifest can say so. False negatives are acceptable;
//! a false positive would corrupt rewriting, so the matching is strict.

use std::ops::Range;

use super::{RefKind, Reference};

/// Loading constructs whose first argument is scanned for a string literal
const CALL_PATTERNS: &[(&str, RefKind)] = &[
    ("import", RefKind::Script),
    ("fetch", RefKind::Other),
    ("new URL", RefKind::Other),
];

/// Extracts string-literal references; the bool is true when a dynamic
/// (non-literal) argument was seen in one of the scanned constructs
pub fn extract(body: &[u8], offset: usize) -> (Vec<Reference>, bool) {
    let mut refs = Vec::new();
    let mut possibly_incomplete = false;
    let mut i = 0;

    while i < body.len() {
        // Skip comments and unrelated string literals so their contents
        // cannot be mistaken for loading constructs
        if body[i..].starts_with(b"//") {
            i = find_byte(body, i, b'\n').unwrap_or(body.len());
            continue;
        }
        if body[i..].starts_with(b"/*") {
            i = find(body, i + 2, b"*/").map(|p| p + 2).unwrap_or(body.len());
            continue;
        }

        let mut matched = false;
        for (pattern, kind) in CALL_PATTERNS {
            if !body[i..].starts_with(pattern.as_bytes()) || !at_word_boundary(body, i) {
                continue;
            }
            let mut j = i + pattern.len();

            // `import "x"` / `import x from "y"` module syntax
            if *pattern == "import" {
                if let Some((span, next)) = read_static_import(body, j) {
                    push(body, span, offset, RefKind::Script, &mut refs);
                    i = next;
                    matched = true;
                    break;
                }
            }

            while j < body.len() && body[j].is_ascii_whitespace() {
                j += 1;
            }
            if j >= body.len() || body[j] != b'(' {
                break;
            }
            j += 1;
            while j < body.len() && body[j].is_ascii_whitespace() {
                j += 1;
            }
            match read_string_literal(body, j) {
                Some((span, next)) => {
                    push(body, span, offset, *kind, &mut refs);
                    i = next;
                }
                None => {
                    possibly_incomplete = true;
                    i = j;
                }
            }
            matched = true;
            break;
        }

        if !matched {
            if body[i] == b'"' || body[i] == b'\'' || body[i] == b'`' {
                i = skip_string(body, i);
            } else {
                i += 1;
            }
        }
    }

    (refs, possibly_incomplete)
}

/// Skips past a string literal that is not part of a loading construct, so
/// its contents are never mistaken for one
fn skip_string(body: &[u8], i: usize) -> usize {
    let quote = body[i];
    let mut k = i + 1;
    while k < body.len() {
        match body[k] {
            b'\\' => k += 2,
            b'\n' if quote != b'`' => return k + 1,
            b if b == quote => return k + 1,
            _ => k += 1,
        }
    }
    body.len()
}

/// Handles `import "mod"` and `import ... from "mod"` without parsing the
/// binding list: scan forward on the same statement for a `from` clause or
/// a directly following string
fn read_static_import(body: &[u8], mut j: usize) -> Option<(Range<usize>, usize)> {
    while j < body.len() && body[j].is_ascii_whitespace() {
        j += 1;
    }
    if j < body.len() && (body[j] == b'"' || body[j] == b'\'') {
        return read_string_literal(body, j);
    }

    // Look for ` from "..."` before the statement ends
    let stmt_end = find_byte(body, j, b';').unwrap_or(body.len());
    let from_pos = find(&body[..stmt_end], j, b"from")?;
    if !at_word_boundary(body, from_pos) {
        return None;
    }
    let mut k = from_pos + 4;
    while k < body.len() && body[k].is_ascii_whitespace() {
        k += 1;
    }
    read_string_literal(body, k)
}

/// Reads a plain string literal at `j`; rejects template literals with
/// interpolation and literals containing escapes
fn read_string_literal(body: &[u8], j: usize) -> Option<(Range<usize>, usize)> {
    if j >= body.len() {
        return None;
    }
    let quote = body[j];
    if quote != b'"' && quote != b'\'' && quote != b'`' {
        return None;
    }
    let start = j + 1;
    let mut k = start;
    while k < body.len() {
        let b = body[k];
        if b == quote {
            return Some((start..k, k + 1));
        }
        if b == b'\\' || b == b'\n' || (quote == b'`' && body[k..].starts_with(b"${")) {
            return None;
        }
        k += 1;
    }
    None
}

fn at_word_boundary(body: &[u8], pos: usize) -> bool {
    pos == 0 || !(body[pos - 1].is_ascii_alphanumeric() || body[pos - 1] == b'_' || body[pos - 1] == b'.')
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
