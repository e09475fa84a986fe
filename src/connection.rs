//! C7 — the connection adapter (§4.7): the processor's only view onto a
//! byte stream. The core never allocates a socket; the listener/accept
//! loop is external (§1, §6).
//!
//! Grounded in spec.md §4.7's `receive`/`send`/`set_lingering_timeout`
//! contract; the teacher's `handle_connection`/`handle_connection_inner`
//! supply the idiom (a raw `TcpStream` read/write pair, `write_all` +
//! `flush` for sends). Generalized from a concrete `TcpStream` to any `S:
//! AsyncRead + AsyncWrite` so the request processor can be driven in
//! tests without a real socket (`tokio::io::duplex`), per DESIGN NOTES §9
//! ("model as a trait/capability set with concrete sum-typed dispatch
//! where the set of implementers is finite").

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Wraps a byte stream `S` with the minimal contract the processor needs.
/// `S` is `tokio::net::TcpStream` in the normal embedding; tests use an
/// in-memory duplex pipe.
pub struct Connection<S> {
    io: S,
    lingering_timeout_secs: Option<u64>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(io: S) -> Self {
        Self {
            io,
            lingering_timeout_secs: None,
        }
    }

    /// Reads at most `max_bytes` and appends them to `out`. `false` means
    /// end-of-stream or an I/O error (§4.7) — the caller never learns
    /// which, matching the original's boolean-only contract.
    pub async fn receive(&mut self, out: &mut Vec<u8>, max_bytes: usize) -> bool {
        let mut chunk = vec![0u8; max_bytes.max(1)];
        match self.io.read(&mut chunk).await {
            Ok(0) => false,
            Ok(n) => {
                out.extend_from_slice(&chunk[..n]);
                true
            }
            Err(_) => false,
        }
    }

    /// Writes the whole of `bytes`, flushing afterwards. `false` on any
    /// I/O error.
    pub async fn send(&mut self, bytes: &[u8]) -> bool {
        if self.io.write_all(bytes).await.is_err() {
            return false;
        }
        self.io.flush().await.is_ok()
    }

    /// Records the requested SO_LINGER-style timeout. Plain `S` values
    /// have no socket options to push this into; a `TcpStream`-backed
    /// embedder is expected to apply it via `socket2`/`libc` at accept
    /// time. Stored so embedders can read it back.
    pub fn set_lingering_timeout(&mut self, seconds: u64) -> bool {
        self.lingering_timeout_secs = Some(seconds);
        true
    }

    pub fn lingering_timeout(&self) -> Option<u64> {
        self.lingering_timeout_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn receive_returns_bytes_written_by_the_peer() {
        let (mut client, server) = duplex(64);
        client.write_all(b"hello").await.unwrap();
        let mut conn = Connection::new(server);

        let mut buf = Vec::new();
        assert!(conn.receive(&mut buf, 64).await);
        assert_eq!(buf, b"hello");
    }

    #[tokio::test]
    async fn receive_is_false_on_eof() {
        let (client, server) = duplex(64);
        drop(client);
        let mut conn = Connection::new(server);

        let mut buf = Vec::new();
        assert!(!conn.receive(&mut buf, 64).await);
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn send_writes_and_flushes() {
        let (mut client, server) = duplex(64);
        let mut conn = Connection::new(server);
        assert!(conn.send(b"hi").await);

        let mut buf = [0u8; 2];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hi");
    }

    #[tokio::test]
    async fn set_lingering_timeout_is_recorded() {
        let (_client, server) = duplex(64);
        let mut conn = Connection::new(server);
        assert!(conn.lingering_timeout().is_none());
        assert!(conn.set_lingering_timeout(5));
        assert_eq!(conn.lingering_timeout(), Some(5));
    }
}
