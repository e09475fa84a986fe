//! C6 — the per-connection request processor (§4.6): orchestrates
//! read → parse → demux lookup → invoke handler (or error document) →
//! render → write, and reports whether the connection should stay open.
//!
//! Grounded in `examples/original_source/src/demux/request_processor.cpp`
//! (the stubbed `handle_one_request` — an Open Question, resolved per
//! DESIGN.md's decision log) and the teacher's `handle_connection_inner`/
//! `handle_request` pair (a timeout-bounded read loop, one response
//! written per request, the keep-alive flag deciding whether to loop
//! again), generalized from the teacher's fixed static-file dispatch to
//! this spec's demux-backed callback dispatch, §4.6.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;

use crate::connection::Connection;
use crate::demux::Demux;
use crate::error::ParseError;
use crate::handle::ErrorHandle;
use crate::request::{self, MethodToken, Request, ServerConfig, Version};
use crate::response::Response;

/// An error-document callback: fills `response` for a given status code.
/// `request` is `None` when the failure happened before a full request
/// could be assembled (malformed head, timeout) — the original's "no
/// request, only an outcome" case (§4.6 step 6, §7).
pub type ErrorCallback = Arc<dyn Fn(Option<&Request>, &mut Response) + Send + Sync>;

struct ErrorHandlerRecord {
    callback: ErrorCallback,
    enabled: bool,
}

/// Identifies this library in the rendered `Server` header unless a
/// handler or error handler already set one.
const SERVER_FINGERPRINT: &str = concat!("restmux/", env!("CARGO_PKG_VERSION"));

/// Per-connection request processor (§4.6, §6 `create_request_processor`).
/// One `RequestProcessor` can drive many sequential `handle_one_request`
/// calls against many different connections; it is not itself
/// connection-bound state, only the error-handler table and the shared
/// demux are held.
pub struct RequestProcessor {
    demux: Arc<Demux>,
    config: ServerConfig,
    error_handlers: Mutex<FxHashMap<u16, ErrorHandlerRecord>>,
}

/// Library entry point: `create_request_processor(demux_query,
/// connection_timeout_secs) -> Processor` (§6).
pub fn create_request_processor(demux: Arc<Demux>, connection_timeout: Duration) -> Arc<RequestProcessor> {
    let mut config = ServerConfig::default();
    config.connection_timeout = connection_timeout;
    Arc::new(RequestProcessor {
        demux,
        config,
        error_handlers: Mutex::new(FxHashMap::default()),
    })
}

impl RequestProcessor {
    /// `set_error_handler(code, cb) -> handle | none` (§4.6): `None` if
    /// `code` is already registered, matching the demux's duplicate-
    /// registration policy (§4.5 `connect`).
    pub fn set_error_handler(
        self: Arc<Self>,
        code: u16,
        callback: impl Fn(Option<&Request>, &mut Response) + Send + Sync + 'static,
    ) -> Option<ErrorHandle> {
        let mut handlers = self.error_handlers.lock();
        if handlers.contains_key(&code) {
            return None;
        }
        handlers.insert(
            code,
            ErrorHandlerRecord {
                callback: Arc::new(callback),
                enabled: true,
            },
        );
        drop(handlers);
        Some(ErrorHandle::new(self, code))
    }

    /// Idempotent removal, called by `ErrorHandle::drop` (§4.8); never
    /// panics if `code` is absent.
    pub fn reset_error_handler(&self, code: u16) -> bool {
        self.error_handlers.lock().remove(&code).is_some()
    }

    pub fn enable(&self, code: u16) -> bool {
        match self.error_handlers.lock().get_mut(&code) {
            Some(record) => {
                record.enabled = true;
                true
            }
            None => false,
        }
    }

    pub fn disable(&self, code: u16) -> bool {
        match self.error_handlers.lock().get_mut(&code) {
            Some(record) => {
                record.enabled = false;
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, code: u16) -> bool {
        self.error_handlers.lock().get(&code).map(|r| r.enabled).unwrap_or(false)
    }

    /// Copies the callback out while holding the lock, then invokes it
    /// lock-free — handlers never run with a core mutex held (§5).
    fn invoke_error_handler(&self, code: u16, request: Option<&Request>, response: &mut Response) {
        let callback = {
            let handlers = self.error_handlers.lock();
            handlers.get(&code).filter(|r| r.enabled).map(|r| r.callback.clone())
        };
        if let Some(callback) = callback {
            callback(request, response);
        }
    }

    /// `handle_one_request(connection) -> bool` (§4.6, §6): parses and
    /// dispatches exactly one request, bounded by `connection_timeout`
    /// (§4.6 step 1). Returns whether the caller should read another
    /// request off the same connection.
    pub async fn handle_one_request<S>(&self, connection: &mut Connection<S>) -> bool
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        match timeout(self.config.connection_timeout, self.process_one(connection)).await {
            Ok(keep_alive) => keep_alive,
            Err(_) => false, // §4.6 step 1: timeout closes the connection.
        }
    }

    async fn process_one<S>(&self, connection: &mut Connection<S>) -> bool
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let max_head_scan_bytes = self.config.max_header_len.saturating_mul(16).max(16 * 1024);

        let mut buf: Vec<u8> = Vec::new();
        let head_end = loop {
            if let Some(end) = find_head_terminator(&buf) {
                break Some(end);
            }
            if buf.len() > max_head_scan_bytes {
                break None;
            }
            let mut chunk = Vec::new();
            if !connection.receive(&mut chunk, 8192).await {
                // Peer closed or errored. A clean close between requests
                // is not an error; a close mid-head is just a dead
                // connection either way (§4.6 step 1, §7 "I/O error").
                return false;
            }
            if chunk.is_empty() {
                return false;
            }
            buf.extend_from_slice(&chunk);
        };

        let Some(head_end) = head_end else {
            return self.respond_error(connection, 400, None, false).await;
        };

        let head = match request::parse_head(&buf[..head_end], self.demux.mime_registry(), &self.config) {
            Ok((head, _consumed)) => head,
            Err(err) => {
                return match status_for_parse_error(&err) {
                    Some(status) => self.respond_error(connection, status, None, false).await,
                    None => false,
                };
            }
        };

        let version = head.version;
        let keep_alive_requested = head.keep_alive;

        // §A.6: an `Expect` value other than `100-continue` is rejected
        // before the body is read, the only documented consumer of the
        // field the distilled spec reserves but never wires up.
        if let Some(expectation) = head.expectation.as_deref() {
            if !expectation.eq_ignore_ascii_case("100-continue") {
                return self.respond_error(connection, 417, None, keep_alive_requested).await;
            }
        }

        let body_len = head.content_length as usize;
        let mut body = buf[head_end..].to_vec();
        while body.len() < body_len {
            let mut chunk = Vec::new();
            let want = (body_len - body.len()).min(8192);
            if !connection.receive(&mut chunk, want).await || chunk.is_empty() {
                return false;
            }
            body.extend_from_slice(&chunk);
        }
        body.truncate(body_len);

        let request = match head.finish(if body_len > 0 { Some(body) } else { None }) {
            Ok(request) => request,
            Err(err) => {
                return match status_for_parse_error(&err) {
                    Some(status) => self.respond_error(connection, status, None, false).await,
                    None => false,
                };
            }
        };

        let (callback, default_status) = self.resolve(&request);

        let mut response = Response::new();
        let status = match callback {
            Some(callback) => match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(&request, &mut response))) {
                Ok(()) => response.status,
                Err(_) => {
                    // §4.6 step 5: a handler that unwinds is a 500.
                    response = Response::with_status(500);
                    log::error!("request handler panicked; responding 500");
                    500
                }
            },
            None => {
                response = Response::with_status(default_status);
                default_status
            }
        };

        if status >= 400 {
            self.invoke_error_handler(status, Some(&request), &mut response);
        }

        let keep_alive = keep_alive_requested;
        self.finish_response(connection, &mut response, keep_alive, version).await;
        keep_alive
    }

    /// §4.5 steps 1-3 plus §4.6 step 4's status fallback ladder: an exact
    /// `(path, method, content_type, accept)` match always wins; failing
    /// that, the most specific diagnosable reason is reported (unknown
    /// path, known path but unregistered method, or a content
    /// negotiation mismatch).
    fn resolve(&self, request: &Request) -> (Option<crate::demux::HandlerCallback>, u16) {
        if let Some(callback) = self.demux.determine(request) {
            return (Some(callback), 200);
        }

        if !self.demux.path_exists(&request.path) {
            return (None, 404);
        }

        let method_registered = match request.method {
            MethodToken::Known(method) => self.demux.method_exists(&request.path, method),
            MethodToken::Unknown(_) => false,
        };
        if !method_registered {
            return (None, 405);
        }

        (None, 406)
    }

    async fn respond_error<S>(
        &self,
        connection: &mut Connection<S>,
        status: u16,
        request: Option<&Request>,
        keep_alive: bool,
    ) -> bool
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut response = Response::with_status(status);
        self.invoke_error_handler(status, request, &mut response);
        let version = request.map(|r| r.version).unwrap_or(Version::Http11);
        self.finish_response(connection, &mut response, keep_alive, version).await;
        keep_alive
    }

    async fn finish_response<S>(&self, connection: &mut Connection<S>, response: &mut Response, keep_alive: bool, version: Version)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        if response.header("server").is_none() {
            response.set_server(SERVER_FINGERPRINT);
        }
        let now = now_epoch_seconds();
        let bytes = response.render(now, keep_alive, version);
        if !connection.send(&bytes).await {
            log::debug!("failed to write response to connection");
        }
    }
}

/// Maps a parser outcome to the status table in §7. `Timeout`/`Io` never
/// produce a response — the connection is simply dropped.
fn status_for_parse_error(err: &ParseError) -> Option<u16> {
    match err {
        ParseError::Malformed | ParseError::UnsupportedVersion | ParseError::HeaderTooLong => Some(400),
        ParseError::PayloadTooLarge => Some(413),
        ParseError::Timeout | ParseError::Io(_) => None,
    }
}

/// Scans for the blank line that ends the request head. Tolerant of bare
/// LF (§4.3 lexer normalization: CR, LF, CRLF all fold to one line
/// ending), so any of `\r\n\r\n`, `\n\r\n`, `\r\n\n`, `\n\n` counts.
fn find_head_terminator(buf: &[u8]) -> Option<usize> {
    const PATTERNS: &[&[u8]] = &[b"\r\n\r\n", b"\n\r\n", b"\r\n\n", b"\n\n"];
    PATTERNS
        .iter()
        .filter_map(|pat| find_subslice(buf, pat).map(|pos| pos + pat.len()))
        .min()
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn now_epoch_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
