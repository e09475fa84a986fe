//! C4 — media-type and `Accept` list parsing (§4.4, §4.2 GLOSSARY
//! "Specification grade" / "Accept iteration").
//!
//! Grounded in `examples/original_source/src/lib/http/parser/utility/media_type.hpp`
//! (`quality()`/`specification_grade()` accessors, parameter map, custom
//! type/subtype buffers) — the `.cpp` wasn't retrieved, so the quality/
//! grade arithmetic below follows the quantities spec.md documents
//! directly rather than the original's internal representation.

use std::collections::BTreeMap;

use crate::mime::{Mime, MimeRegistry, MimeSubtype, MimeType};

/// How concretely a media type was specified: both wildcard scores `0`,
/// both concrete scores `3`. Used as the negotiation tiebreaker after
/// quality (§4.4, GLOSSARY).
pub fn specification_grade(mime: Mime) -> u8 {
    let type_concrete = mime.mime_type != MimeType::WILDCARD;
    let subtype_concrete = mime.mime_subtype != MimeSubtype::WILDCARD;
    match (type_concrete, subtype_concrete) {
        (false, false) => 0,
        (false, true) => 1,
        (true, false) => 2,
        (true, true) => 3,
    }
}

/// One parsed element of an `Accept` header: a media type, its quality
/// (0-1000, default 1000), its specification grade, and any extension
/// parameters (`q` itself is consumed, not kept as a parameter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptEntry {
    pub mime: Mime,
    pub quality: u16,
    pub specification_grade: u8,
    pub parameters: BTreeMap<String, String>,
}

const DEFAULT_QUALITY: u16 = 1000;

/// Splits `s` on `sep` at depth-0 only: a `(`/`)` pair (nestable) shields
/// any separator it encloses, so a comment containing a `,` or `;` can't
/// be mistaken for a structural delimiter (§4.4 "Comments `( ... )`
/// inside parameter lists are recognized and support nesting").
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut result = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0usize;

    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = (depth - 1).max(0),
            c if c == sep && depth == 0 => {
                result.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    result.push(&s[start..]);
    result
}

/// Removes every top-level and nested `( ... )` comment from `s`,
/// terminating each at its matching `)` (§4.4). An unterminated `(` (a
/// malformed comment) discards everything from the `(` onward rather
/// than panicking.
fn strip_comments(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth: u32 = 0;

    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Parses a `q=` value into the 0-1000 fixed-point range, clamping out of
/// range values rather than rejecting the header (§4.4 tolerant parsing
/// posture).
fn parse_quality(raw: &str) -> u16 {
    let raw = raw.trim();
    let (int_part, frac_part) = match raw.split_once('.') {
        Some((i, f)) => (i, f),
        None => (raw, ""),
    };

    let int_value: i64 = int_part.parse().unwrap_or(0);
    let mut frac_digits = frac_part.chars().chain(std::iter::repeat('0'));
    let d1 = frac_digits.next().unwrap_or('0').to_digit(10).unwrap_or(0) as i64;
    let d2 = frac_digits.next().unwrap_or('0').to_digit(10).unwrap_or(0) as i64;
    let d3 = frac_digits.next().unwrap_or('0').to_digit(10).unwrap_or(0) as i64;

    let value = int_value * 1000 + d1 * 100 + d2 * 10 + d3;
    value.clamp(0, 1000) as u16
}

/// Splits a single `Accept` element (`text/plain;q=0.8;level=1`) into the
/// media type and its parameters, delegating type/subtype interning to
/// `registry`. Unparseable elements fall back to `Mime::WILDCARD` at
/// quality 0 so they sort last rather than aborting the whole header.
fn parse_one(element: &str, registry: &MimeRegistry) -> AcceptEntry {
    let parts = split_top_level(element, ';');
    let mut parts = parts.into_iter();
    let type_part = strip_comments(parts.next().unwrap_or(""));
    let type_part = type_part.trim();
    let mime = registry.parse(type_part.as_bytes(), type_part.len());

    let mut quality = DEFAULT_QUALITY;
    let mut parameters = BTreeMap::new();

    for param in parts {
        let param = strip_comments(param);
        let param = param.trim();
        if param.is_empty() {
            continue;
        }
        match param.split_once('=') {
            Some((key, value)) => {
                let key = key.trim();
                let value = value.trim().trim_matches('"');
                if key.eq_ignore_ascii_case("q") {
                    quality = parse_quality(value);
                } else {
                    parameters.insert(key.to_ascii_lowercase(), value.to_owned());
                }
            }
            None => {
                parameters.insert(param.to_ascii_lowercase(), String::new());
            }
        }
    }

    AcceptEntry {
        mime,
        quality,
        specification_grade: specification_grade(mime),
        parameters,
    }
}

/// Parses a full `Accept` header value into entries sorted by
/// `(quality desc, specification_grade desc, registration order)` — stable
/// sort preserves registration order among exact ties (§4.4).
pub fn parse_accept(header_value: &str, registry: &MimeRegistry) -> Vec<AcceptEntry> {
    let mut entries: Vec<AcceptEntry> = split_top_level(header_value, ',')
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|element| parse_one(element, registry))
        .collect();

    entries.sort_by(|a, b| {
        b.quality
            .cmp(&a.quality)
            .then(b.specification_grade.cmp(&a.specification_grade))
    });

    entries
}

/// A cursor over a parsed `Accept` list, walking entries in priority
/// order. Mirrors the `accept(&mut handle, &mut out) -> bool` iterator
/// described in the GLOSSARY ("Accept iteration").
#[derive(Debug, Clone, Default)]
pub struct AcceptCursor {
    position: usize,
}

impl AcceptCursor {
    pub fn new() -> Self {
        Self { position: 0 }
    }

    /// Refills `out` with the next entry and advances the cursor; returns
    /// `false` once the list is exhausted.
    pub fn next<'a>(&mut self, entries: &'a [AcceptEntry], out: &mut Option<&'a AcceptEntry>) -> bool {
        match entries.get(self.position) {
            Some(entry) => {
                *out = Some(entry);
                self.position += 1;
                true
            }
            None => {
                *out = None;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specification_grade_scoring() {
        assert_eq!(specification_grade(Mime::WILDCARD), 0);
        assert_eq!(
            specification_grade(Mime::new(MimeType::WILDCARD, MimeSubtype::PLAIN)),
            1
        );
        assert_eq!(
            specification_grade(Mime::new(MimeType::TEXT, MimeSubtype::WILDCARD)),
            2
        );
        assert_eq!(
            specification_grade(Mime::new(MimeType::TEXT, MimeSubtype::PLAIN)),
            3
        );
    }

    #[test]
    fn quality_defaults_to_1000() {
        let registry = MimeRegistry::new();
        let entries = parse_accept("text/plain", &registry);
        assert_eq!(entries[0].quality, 1000);
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(parse_quality("2.5"), 1000);
        assert_eq!(parse_quality("-1"), 0);
        assert_eq!(parse_quality("0.987654"), 987);
    }

    #[test]
    fn sorts_by_quality_then_specification_grade() {
        let registry = MimeRegistry::new();
        let entries = parse_accept("application/json;q=0.9, text/plain;q=0.9, */*;q=0.9", &registry);
        assert_eq!(
            entries[0].mime,
            Mime::new(MimeType::APPLICATION, registry.register_subtype("json"))
        );
    }

    #[test]
    fn ties_break_on_registration_order() {
        let registry = MimeRegistry::new();
        let entries = parse_accept("text/plain, application/json", &registry);
        // Both default to q=1.000 and grade 3; stable sort keeps input order.
        assert_eq!(entries[0].mime.mime_type, MimeType::TEXT);
        assert_eq!(entries[1].mime.mime_type, MimeType::APPLICATION);
    }

    #[test]
    fn extension_parameters_are_captured() {
        let registry = MimeRegistry::new();
        let entries = parse_accept("text/plain;level=1;q=0.5", &registry);
        assert_eq!(entries[0].quality, 500);
        assert_eq!(entries[0].parameters.get("level"), Some(&"1".to_string()));
    }

    #[test]
    fn cursor_walks_and_refills() {
        let registry = MimeRegistry::new();
        let entries = parse_accept("text/plain, application/json;q=0.5", &registry);
        let mut cursor = AcceptCursor::new();
        let mut out = None;

        assert!(cursor.next(&entries, &mut out));
        assert_eq!(out.unwrap().quality, 1000);
        assert!(cursor.next(&entries, &mut out));
        assert_eq!(out.unwrap().quality, 500);
        assert!(!cursor.next(&entries, &mut out));
        assert!(out.is_none());
    }

    #[test]
    fn comment_inside_parameters_is_skipped() {
        let registry = MimeRegistry::new();
        let entries = parse_accept("text/plain;q=0.5 (my browser)", &registry);
        assert_eq!(entries[0].quality, 500);
    }

    #[test]
    fn nested_comment_is_skipped() {
        let registry = MimeRegistry::new();
        let entries = parse_accept("text/plain (outer (inner) still outer);q=0.5", &registry);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].quality, 500);
    }

    #[test]
    fn comma_inside_comment_does_not_split_elements() {
        let registry = MimeRegistry::new();
        let entries = parse_accept("text/plain (a, b); q=0.9, application/json", &registry);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].mime.mime_type, MimeType::TEXT);
    }

    #[test]
    fn semicolon_inside_comment_does_not_split_parameters() {
        let registry = MimeRegistry::new();
        let entries = parse_accept("text/plain;q=0.8 (note; with semicolon)", &registry);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].quality, 800);
    }
}
