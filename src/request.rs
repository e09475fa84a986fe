//! C4 — HTTP/1.x request parsing (§4.4). Splits into two stages: parsing
//! the request line and headers from an in-memory buffer via the C3 lexer
//! (text framing, CRLF/whitespace tolerant), and finishing with a raw,
//! lexer-bypassing body slice (binary-safe — CRLF normalization must never
//! touch payload bytes).
//!
//! Grounded in the header list and field set documented in spec.md §3/§4.4,
//! `examples/original_source/src/request/parser_data.hpp` (registry-backed
//! media type parsing) and `examples/original_source/src/libhutznohmd/requests.hpp`
//! (the `expectation`/typed-accessor shape, supplemented per §A.6).

use std::cell::Cell;
use std::collections::BTreeMap;

use crate::base64;
use crate::charmap::TOKEN_STOP;
use crate::date;
use crate::error::ParseError;
use crate::lexer::{parse_word, Lexer};
use crate::media_type::{parse_accept, AcceptEntry};
use crate::mime::{Mime, MimeRegistry};
use crate::pushback::PushBackString;
use crate::uri;

/// Tunables the embedder sets when building a request processor (§A.4).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub connection_timeout: std::time::Duration,
    pub max_request_line_len: usize,
    pub max_header_len: usize,
    pub max_content_length: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            connection_timeout: std::time::Duration::from_secs(30),
            max_request_line_len: 8 * 1024,
            max_header_len: 8 * 1024,
            max_content_length: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MethodToken {
    Known(Method),
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    Http10,
    Http11,
    Unknown,
}

/// Everything parsable before the body: the request line and headers.
/// Kept separate from `Request` so the processor can learn
/// `content_length` before deciding how many more bytes to read (§4.6).
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: MethodToken,
    pub path: String,
    pub host: Option<String>,
    pub query: BTreeMap<String, String>,
    pub fragment: Option<String>,
    pub version: Version,
    pub headers: Vec<(String, String)>,
    pub content_length: u32,
    pub content_type: Mime,
    pub accept: Vec<AcceptEntry>,
    pub expectation: Option<String>,
    pub date: Option<i64>,
    pub keep_alive: bool,
    content_md5: Option<String>,
}

/// A fully parsed request, body included (§3 "Parsed request").
#[derive(Debug, Clone)]
pub struct Request {
    pub method: MethodToken,
    pub path: String,
    pub host: Option<String>,
    pub query: BTreeMap<String, String>,
    pub fragment: Option<String>,
    pub version: Version,
    pub headers: Vec<(String, String)>,
    pub content_length: u32,
    pub content: Option<Vec<u8>>,
    pub content_type: Mime,
    pub accept: Vec<AcceptEntry>,
    pub expectation: Option<String>,
    pub date: Option<i64>,
    pub keep_alive: bool,
}

impl Request {
    /// Case-insensitive lookup of the first matching header (raw
    /// multimap access, for anything not promoted to a typed accessor).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref().or_else(|| self.header("host"))
    }

    pub fn referer(&self) -> Option<&str> {
        self.header("referer")
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header("user-agent")
    }

    pub fn from(&self) -> Option<&str> {
        self.header("from")
    }

    pub fn cache_control(&self) -> Option<&str> {
        self.header("cache-control")
    }

    pub fn content_location(&self) -> Option<&str> {
        self.header("content-location")
    }

    pub fn expectation(&self) -> Option<&str> {
        self.expectation.as_deref()
    }

    pub fn content_type(&self) -> Mime {
        self.content_type
    }

    pub fn date(&self) -> Option<i64> {
        self.date
    }

    pub fn accept(&self) -> &[AcceptEntry] {
        &self.accept
    }
}

const KNOWN_METHODS: &[(&str, Method)] = &[
    ("GET", Method::Get),
    ("HEAD", Method::Head),
    ("POST", Method::Post),
    ("PUT", Method::Put),
    ("DELETE", Method::Delete),
    ("CONNECT", Method::Connect),
    ("OPTIONS", Method::Options),
    ("TRACE", Method::Trace),
];

fn classify_method(token: &str) -> MethodToken {
    // Matched case-sensitively against the known set (§4.4).
    match KNOWN_METHODS.iter().find(|(name, _)| *name == token) {
        Some((_, method)) => MethodToken::Known(*method),
        None => MethodToken::Unknown(token.to_owned()),
    }
}

/// Pulls characters via `lexer` into a `PushBackString` until `stop`
/// matches the current character or EOF is reached, enforcing `max_len`.
/// Leaves the stopping character in `character` for the caller. Built on
/// `lexer::parse_word`, which has no notion of a length cap itself, so the
/// cap is folded into the continue condition via a shared counter.
fn read_token<G, P>(
    lexer: &mut Lexer<G, P>,
    character: &mut i32,
    stop: impl Fn(i32) -> bool,
    max_len: usize,
) -> Result<String, ParseError>
where
    G: FnMut() -> i32,
    P: FnMut() -> i32,
{
    let mut token = PushBackString::new();
    let accepted = Cell::new(0usize);

    parse_word(
        character,
        &mut token,
        |c| c,
        |c| {
            if stop(c as i32) || accepted.get() >= max_len {
                return false;
            }
            accepted.set(accepted.get() + 1);
            true
        },
        lexer,
    );

    if *character < 0 {
        return Err(ParseError::Malformed);
    }
    if !stop(*character) {
        // parse_word stopped because the length cap was hit, not because
        // the stop character was reached.
        return Err(ParseError::HeaderTooLong);
    }
    Ok(token.into_string())
}

fn expect_char<G, P>(lexer: &mut Lexer<G, P>, character: &mut i32, expected: u8) -> Result<(), ParseError>
where
    G: FnMut() -> i32,
    P: FnMut() -> i32,
{
    if *character != expected as i32 {
        return Err(ParseError::Malformed);
    }
    *character = lexer.get();
    Ok(())
}

/// Parses a decimal `Content-Length` value via `Lexer::get_unsigned_integer`
/// rather than `str::parse`, so the 31-bit overflow check and the digit
/// grammar both come from the one place the spec names for it (§4.3). The
/// first byte is checked separately so a post-call `-1` can only mean
/// overflow, never "didn't start with a digit".
fn parse_decimal_u32(value: &str) -> Result<u32, ParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.as_bytes()[0].is_ascii_digit() {
        return Err(ParseError::Malformed);
    }

    let bytes = trimmed.as_bytes();
    let idx = Cell::new(0usize);
    let get = || -> i32 {
        let i = idx.get();
        if i < bytes.len() {
            idx.set(i + 1);
            bytes[i] as i32
        } else {
            -1
        }
    };
    let peek = || -> i32 {
        let i = idx.get();
        if i < bytes.len() {
            bytes[i] as i32
        } else {
            -1
        }
    };
    let mut lexer = Lexer::new(get, peek);
    let mut character = lexer.get();

    let n = lexer.get_unsigned_integer(&mut character);
    if n < 0 {
        return Err(ParseError::PayloadTooLarge);
    }
    if character >= 0 {
        return Err(ParseError::Malformed);
    }
    Ok(n as u32)
}

fn parse_version(token: &str) -> Version {
    match token {
        "HTTP/1.0" => Version::Http10,
        "HTTP/1.1" => Version::Http11,
        _ => Version::Unknown,
    }
}

/// Parses a request line plus headers out of `buf`, stopping at the blank
/// line that terminates the head section. Returns the parsed head and the
/// number of bytes of `buf` consumed, so the caller can locate the body.
pub fn parse_head(
    buf: &[u8],
    registry: &MimeRegistry,
    config: &ServerConfig,
) -> Result<(RequestHead, usize), ParseError> {
    let idx = Cell::new(0usize);
    let get = || -> i32 {
        let i = idx.get();
        if i < buf.len() {
            idx.set(i + 1);
            buf[i] as i32
        } else {
            -1
        }
    };
    let peek = || -> i32 {
        let i = idx.get();
        if i < buf.len() {
            buf[i] as i32
        } else {
            -1
        }
    };
    let mut lexer = Lexer::new(get, peek);

    let mut character = lexer.get();

    let method_token = read_token(
        &mut lexer,
        &mut character,
        |c| c >= 0 && TOKEN_STOP.contains(c as u8),
        config.max_request_line_len,
    )?;
    let method = classify_method(&method_token);
    expect_char(&mut lexer, &mut character, b' ')?;

    let url_token = read_token(
        &mut lexer,
        &mut character,
        |c| c == b' ' as i32,
        config.max_request_line_len,
    )?;
    expect_char(&mut lexer, &mut character, b' ')?;

    let version_token = read_token(
        &mut lexer,
        &mut character,
        |c| c == b'\n' as i32,
        config.max_request_line_len,
    )?;
    let version = parse_version(&version_token);
    if version == Version::Unknown {
        return Err(ParseError::UnsupportedVersion);
    }
    expect_char(&mut lexer, &mut character, b'\n')?;

    let mut headers: Vec<(String, String)> = Vec::new();
    loop {
        if character == b'\n' as i32 {
            // Blank line: end of headers.
            break;
        }

        let name = read_token(
            &mut lexer,
            &mut character,
            |c| c >= 0 && TOKEN_STOP.contains(c as u8),
            config.max_header_len,
        )?;
        expect_char(&mut lexer, &mut character, b':')?;

        character = lexer.get_non_whitespace();
        let value = read_token(
            &mut lexer,
            &mut character,
            |c| c == b'\n' as i32,
            config.max_header_len,
        )?;
        expect_char(&mut lexer, &mut character, b'\n')?;

        headers.push((name.to_ascii_lowercase(), value.trim().to_owned()));
    }

    let parsed = assemble_head(&uri::parse(&url_token), method, version, headers, registry, config)?;
    Ok((parsed, idx.get()))
}

fn assemble_head(
    url: &uri::Uri,
    method: MethodToken,
    version: Version,
    headers: Vec<(String, String)>,
    registry: &MimeRegistry,
    config: &ServerConfig,
) -> Result<RequestHead, ParseError> {
    let find = |name: &str| -> Option<&str> {
        headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };

    let content_length = match find("content-length") {
        Some(v) => {
            let n = parse_decimal_u32(v)?;
            if n > config.max_content_length {
                return Err(ParseError::PayloadTooLarge);
            }
            n
        }
        None => 0,
    };

    let content_type = match find("content-type") {
        Some(v) => registry.parse(v.as_bytes(), v.len()),
        None => Mime::new(crate::mime::MimeType::NONE, crate::mime::MimeSubtype::NONE),
    };

    let accept = match find("accept") {
        Some(v) => parse_accept(v, registry),
        None => Vec::new(),
    };

    let date = find("date").and_then(date::parse_http_date);
    let expectation = find("expect").map(|s| s.to_owned());
    let content_md5 = find("content-md5").map(|s| s.to_owned());

    let host = url.host.clone().or_else(|| find("host").map(str::to_owned));

    let mut keep_alive = version == Version::Http11;
    if let Some(conn) = find("connection") {
        if conn.eq_ignore_ascii_case("close") {
            keep_alive = false;
        } else if conn.eq_ignore_ascii_case("keep-alive") {
            keep_alive = true;
        }
    }

    Ok(RequestHead {
        method,
        path: url.path.clone(),
        host,
        query: url.query.clone(),
        fragment: url.fragment.clone(),
        version,
        headers,
        content_length,
        content_type,
        accept,
        expectation,
        date,
        keep_alive,
        content_md5,
    })
}

impl RequestHead {
    /// Combines the head with its (already fully buffered) body, checking
    /// `Content-MD5` if present (§4.4: mismatch is `Malformed`, not a
    /// security property, just an integrity check).
    pub fn finish(self, body: Option<Vec<u8>>) -> Result<Request, ParseError> {
        if let (Some(expected_b64), Some(bytes)) = (&self.content_md5, &body) {
            let expected = base64::decode(expected_b64);
            let actual = crate::md5::digest(bytes).to_vec();
            if expected != actual {
                return Err(ParseError::Malformed);
            }
        }

        Ok(Request {
            method: self.method,
            path: self.path,
            host: self.host,
            query: self.query,
            fragment: self.fragment,
            version: self.version,
            headers: self.headers,
            content_length: self.content_length,
            content: body,
            content_type: self.content_type,
            accept: self.accept,
            expectation: self.expectation,
            date: self.date,
            keep_alive: self.keep_alive,
        })
    }
}
