//! Response object: status code, header multimap and optional body, filled
//! in by a handler callback and rendered to wire bytes by the processor
//! (§4.6 step 7, §A.6).
//!
//! Grounded in `examples/original_source/src/lib/request/response.hpp` /
//! `response.cpp` (the `set_header`/`set_content`/`set_content_location`/
//! `set_location`/`set_retry_after`/`set_server` setter surface — the
//! original's bodies are all stubs, so the behavior behind each setter
//! here is this spec's own, built to match the documented header list).

use crate::date;
use crate::md5;
use crate::request::Version;

fn reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        408 => "Request Timeout",
        409 => "Conflict",
        413 => "Payload Too Large",
        417 => "Expectation Failed",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// A response under construction. Handler callbacks receive `&mut
/// Response`; the processor fills in `Date` and `Content-Length` and
/// renders the final bytes.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Self::new()
        }
    }

    /// Sets (replacing any prior value) a header. Names are stored
    /// lowercase, matching the request side's `lower_case_string`
    /// canonicalization (§A.6).
    pub fn set_header(&mut self, name: &str, value: &str) {
        let name_lc = name.to_ascii_lowercase();
        self.headers.retain(|(k, _)| *k != name_lc);
        self.headers.push((name_lc, value.to_owned()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets the body, optionally computing and setting `Content-MD5`
    /// (mirrors `response::set_content(content, set_md5)`).
    pub fn set_content(&mut self, content: Vec<u8>, set_md5: bool) {
        if set_md5 {
            let digest = md5::digest(&content);
            self.set_header("content-md5", &crate::base64::encode(&digest));
        }
        self.body = Some(content);
    }

    pub fn set_content_location(&mut self, location: &str) {
        self.set_header("content-location", location);
    }

    pub fn set_location(&mut self, location: &str) {
        self.set_header("location", location);
    }

    /// Retry-After as an HTTP-date (the original takes a `time_t`; this
    /// formats it the same way the `Date` header is formatted).
    pub fn set_retry_after(&mut self, epoch_seconds: i64) {
        self.set_header("retry-after", &date::format_http_date(epoch_seconds));
    }

    pub fn set_server(&mut self, fingerprint: &str) {
        self.set_header("server", fingerprint);
    }

    /// Renders the status line, headers, blank line and body. `now` is the
    /// epoch seconds used for the `Date` header (passed in rather than
    /// read from the clock so rendering stays deterministic and
    /// testable); `version` picks the status-line HTTP version, matching
    /// whatever the request that triggered this response was parsed as
    /// (`UNKNOWN` renders as `HTTP/1.1`, the processor's own fallback).
    pub fn render(&self, now: i64, keep_alive: bool, version: Version) -> Vec<u8> {
        let version_token = match version {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 | Version::Unknown => "HTTP/1.1",
        };

        let mut out = Vec::new();
        out.extend_from_slice(format!("{} {} {}\r\n", version_token, self.status, reason_phrase(self.status)).as_bytes());

        let mut wrote_date = false;
        let mut wrote_content_length = false;
        let mut wrote_connection = false;
        for (name, value) in &self.headers {
            if name == "date" {
                wrote_date = true;
            }
            if name == "content-length" {
                wrote_content_length = true;
            }
            if name == "connection" {
                wrote_connection = true;
            }
            out.extend_from_slice(format!("{}: {}\r\n", header_display_name(name), value).as_bytes());
        }

        if !wrote_date {
            out.extend_from_slice(format!("Date: {}\r\n", date::format_http_date(now)).as_bytes());
        }
        if !wrote_content_length {
            let len = self.body.as_ref().map(Vec::len).unwrap_or(0);
            out.extend_from_slice(format!("Content-Length: {}\r\n", len).as_bytes());
        }
        if !wrote_connection {
            let value = if keep_alive { "keep-alive" } else { "close" };
            out.extend_from_slice(format!("Connection: {}\r\n", value).as_bytes());
        }

        out.extend_from_slice(b"\r\n");
        if let Some(body) = &self.body {
            out.extend_from_slice(body);
        }
        out
    }
}

/// Renders `content-md5` etc. back to their conventional mixed-case wire
/// form for readability; the header multimap itself stays lowercase.
fn header_display_name(lowercase: &str) -> String {
    lowercase
        .split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_200() {
        assert_eq!(Response::new().status, 200);
    }

    #[test]
    fn set_header_replaces_prior_value() {
        let mut response = Response::new();
        response.set_header("X-Foo", "a");
        response.set_header("x-foo", "b");
        assert_eq!(response.header("X-FOO"), Some("b"));
        assert_eq!(response.headers.len(), 1);
    }

    #[test]
    fn set_content_with_md5_sets_header() {
        let mut response = Response::new();
        response.set_content(b"hello".to_vec(), true);
        assert!(response.header("content-md5").is_some());
        assert_eq!(response.body.as_deref(), Some(&b"hello"[..]));
    }

    #[test]
    fn render_includes_status_line_and_defaults() {
        let mut response = Response::with_status(404);
        response.set_content(b"not found".to_vec(), false);
        let rendered = String::from_utf8(response.render(0, false, Version::Http11)).unwrap();
        assert!(rendered.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(rendered.contains("Content-Length: 9\r\n"));
        assert!(rendered.contains("Connection: close\r\n"));
        assert!(rendered.ends_with("not found"));
    }

    #[test]
    fn render_does_not_duplicate_explicit_headers() {
        let mut response = Response::new();
        response.set_header("connection", "keep-alive");
        let rendered = String::from_utf8(response.render(0, false, Version::Http11)).unwrap();
        assert_eq!(rendered.matches("Connection:").count(), 1);
    }

    #[test]
    fn render_uses_the_requests_http_version() {
        let response = Response::with_status(200);
        let rendered = String::from_utf8(response.render(0, false, Version::Http10)).unwrap();
        assert!(rendered.starts_with("HTTP/1.0 200 OK\r\n"));
    }
}
