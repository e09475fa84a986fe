//! Error taxonomy for the parser and the registration APIs (mime, demux,
//! error-handler table). The core never panics on malformed input; every
//! failure mode is a typed variant here instead of a C-style sentinel.

use thiserror::Error;

/// Structured outcome of parsing one request from a byte source (§4.4).
#[derive(Debug, Error)]
pub enum ParseError {
    /// Syntactically invalid request line, header, or body framing.
    #[error("malformed request")]
    Malformed,

    /// HTTP version token is neither `HTTP/1.0` nor `HTTP/1.1`.
    #[error("unsupported HTTP version")]
    UnsupportedVersion,

    /// `Content-Length` exceeds the configured ceiling or the mandatory
    /// 2^31-1 cap.
    #[error("payload too large")]
    PayloadTooLarge,

    /// Request line or headers exceeded the configured length bound before
    /// an end-of-headers marker was seen.
    #[error("header too long")]
    HeaderTooLong,

    /// `receive()` did not produce a complete request within the
    /// connection timeout.
    #[error("timed out waiting for request")]
    Timeout,

    /// The byte source itself failed (§4.7 `receive`/`send` returning
    /// false is surfaced as this at the parser boundary).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of registering a string in the MIME trie-backed registry (§4.2,
/// §7 "Registration error").
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationError {
    /// The empty string was passed as a type/subtype token.
    #[error("empty mime token")]
    Empty,

    /// The token is already registered, case-insensitively.
    #[error("mime token already registered")]
    AlreadyRegistered,

    /// The id space for this kind of token (254 user slots for types, 65534
    /// for subtypes) is exhausted.
    #[error("mime id space exhausted")]
    IdSpaceExhausted,
}
