//! `restmux` — an embeddable HTTP/1.x server library for REST resource
//! serving (§1 PURPOSE & SCOPE).
//!
//! The crate turns an inbound byte stream into a dispatch to a
//! user-supplied resource callback through three coupled subsystems: an
//! incremental, tolerant HTTP/1.x request parser ([`request`], [`lexer`],
//! [`uri`], [`media_type`]); a MIME-type registry that interns type and
//! subtype strings into compact numeric ids ([`mime`], [`trie`]); and a
//! request demultiplexer plus per-connection request processor that
//! resolve `(path, method, content-type, accept)` to a handler under
//! concurrent registration ([`demux`], [`processor`], [`handle`]).
//!
//! What this crate does *not* do: own a listener socket, implement TLS,
//! or pick a threading model — §1 Non-goals, §4.7. The embedder supplies
//! an accepted connection (any `tokio::io::AsyncRead + AsyncWrite`) and a
//! task per connection; [`connection::Connection`] and
//! [`processor::RequestProcessor::handle_one_request`] take it from
//! there.
//!
//! ```no_run
//! # use std::time::Duration;
//! # use restmux::demux::{connect, create_demultiplexer, RequestHandlerId};
//! # use restmux::mime::Mime;
//! # use restmux::processor::create_request_processor;
//! # use restmux::request::Method;
//! # async fn example() -> std::io::Result<()> {
//! let demux = create_demultiplexer();
//! let _handle = connect(
//!     &demux,
//!     RequestHandlerId::new("/", Method::Get, Mime::WILDCARD, Mime::WILDCARD),
//!     |_request, response| response.set_content(b"hello".to_vec(), false),
//! )
//! .unwrap();
//! let processor = create_request_processor(demux, Duration::from_secs(30));
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
//! loop {
//!     let (stream, _addr) = listener.accept().await?;
//!     let processor = processor.clone();
//!     tokio::spawn(async move {
//!         let mut connection = restmux::connection::Connection::new(stream);
//!         while processor.handle_one_request(&mut connection).await {}
//!     });
//! }
//! # }
//! ```

pub mod base64;
pub mod charmap;
pub mod connection;
pub mod date;
pub mod demux;
pub mod error;
pub mod handle;
pub mod lexer;
pub mod md5;
pub mod media_type;
pub mod mime;
pub mod processor;
pub mod pushback;
pub mod request;
pub mod response;
pub mod trie;
pub mod uri;

pub use connection::Connection;
pub use demux::{connect, create_demultiplexer, Demux, RequestHandlerId};
pub use error::{ParseError, RegistrationError};
pub use handle::{ErrorHandle, RequestHandle};
pub use mime::{Mime, MimeRegistry, MimeSubtype, MimeType};
pub use processor::{create_request_processor, RequestProcessor};
pub use request::{Method, MethodToken, Request, ServerConfig, Version};
pub use response::Response;
