//! C4 — URL parsing: splits the request target into scheme, authority
//! (host), path, query and fragment, percent-decoding everything outside
//! RFC 3986's `reserved` set and canonicalizing scheme/host to lowercase
//! and path segments to a single `/`-joined, dot-free form.
//!
//! No dedicated original_source file covers this (the distilled spec names
//! the grammar but the retrieved sources don't include a URI parser); it's
//! built against RFC 3986 directly, following the teacher's habit (see
//! `normalize_path_hash` in its `main.rs`) of folding path normalization
//! into one pass over the byte string rather than building an AST.

use std::collections::BTreeMap;

use crate::charmap::CharMap;

/// RFC 3986 `reserved` (gen-delims + sub-delims) — percent-decoding never
/// touches an octet that decodes to one of these, so decoded reserved
/// characters can't be mistaken for structural delimiters downstream.
static RESERVED: CharMap = CharMap::new(b":/?#[]@!$&'()*+,;=");

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Uri {
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub fragment: Option<String>,
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Percent-decodes `input`, leaving `%XX` sequences that decode to a
/// `reserved` octet untouched (re-encoded) so later structural splitting
/// (path segments, query pairs) still works.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                let decoded = (hi << 4) | lo;
                if RESERVED.contains(decoded) {
                    out.push(bytes[i]);
                    out.push(bytes[i + 1]);
                    out.push(bytes[i + 2]);
                } else {
                    out.push(decoded);
                }
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Joins non-empty, non-`.` path segments with `/`, resolving `..` against
/// the segments accumulated so far (it's simply dropped at the root).
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut normalized = String::from("/");
    normalized.push_str(&segments.join("/"));
    normalized
}

fn parse_query(raw: &str) -> BTreeMap<String, String> {
    let mut query = BTreeMap::new();
    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };
        query.insert(percent_decode(key), percent_decode(value));
    }
    query
}

/// Parses a request target, which may be an absolute URI (`scheme://host/path`)
/// or an origin-form (`/path?query#fragment`) as sent by most HTTP/1.x
/// clients (§4.4).
pub fn parse(target: &str) -> Uri {
    let mut rest = target;

    let mut scheme = None;
    if let Some(idx) = rest.find("://") {
        let candidate = &rest[..idx];
        if !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') {
            scheme = Some(candidate.to_ascii_lowercase());
            rest = &rest[idx + 3..];
        }
    }

    let mut host = None;
    if scheme.is_some() {
        let path_start = rest.find('/').unwrap_or(rest.len());
        let authority = &rest[..path_start];
        if !authority.is_empty() {
            host = Some(authority.to_ascii_lowercase());
        }
        rest = &rest[path_start..];
    }

    let mut fragment = None;
    if let Some(idx) = rest.find('#') {
        fragment = Some(percent_decode(&rest[idx + 1..]));
        rest = &rest[..idx];
    }

    let mut query = BTreeMap::new();
    if let Some(idx) = rest.find('?') {
        query = parse_query(&rest[idx + 1..]);
        rest = &rest[..idx];
    }

    let path = if rest.is_empty() {
        "/".to_string()
    } else {
        normalize_path(&percent_decode(rest))
    };

    Uri {
        scheme,
        host,
        path,
        query,
        fragment,
    }
}
