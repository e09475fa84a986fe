//! End-to-end scenarios from spec.md §8, driven over a real
//! `TcpListener`/`TcpStream` pair bound to an ephemeral port — the
//! library-callable adaptation of the teacher's own `tests/unit_tests.rs`,
//! which needed a separately-running server on a fixed port since `kiss`
//! was only ever a binary.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use restmux::demux::{connect, create_demultiplexer, RequestHandlerId};
use restmux::mime::{Mime, MimeSubtype, MimeType};
use restmux::processor::create_request_processor;
use restmux::request::Method;
use restmux::Connection;

async fn read_response(stream: &mut TcpStream) -> String {
    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await.unwrap();
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

#[tokio::test]
async fn http11_keep_alive_serves_two_requests_on_one_connection() {
    let demux = create_demultiplexer();
    let _handle = connect(
        &demux,
        RequestHandlerId::new("/", Method::Get, Mime::WILDCARD, Mime::WILDCARD),
        |_, response| response.set_content(b"ok".to_vec(), false),
    )
    .unwrap();
    let processor = create_request_processor(demux, Duration::from_secs(5));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut connection = Connection::new(stream);
        while processor.handle_one_request(&mut connection).await {}
    });

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
    let first = read_response(&mut client).await;
    assert!(first.starts_with("HTTP/1.1 200"));
    assert!(first.ends_with("ok"));

    client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
    let second = read_response(&mut client).await;
    assert!(second.starts_with("HTTP/1.1 200"));
}

#[tokio::test]
async fn accept_negotiation_over_a_real_socket_picks_the_higher_quality_match() {
    let demux = create_demultiplexer();
    let text_type = Mime::new(MimeType::TEXT, MimeSubtype::PLAIN);
    let json_subtype = demux.register_mime_subtype("json");
    let json_type = Mime::new(MimeType::APPLICATION, json_subtype);

    let _text_handle = connect(
        &demux,
        RequestHandlerId::new("/r", Method::Get, Mime::WILDCARD, text_type),
        |_, response| response.set_content(b"text".to_vec(), false),
    )
    .unwrap();
    let _json_handle = connect(
        &demux,
        RequestHandlerId::new("/r", Method::Get, Mime::WILDCARD, json_type),
        |_, response| response.set_content(b"json".to_vec(), false),
    )
    .unwrap();

    let processor = create_request_processor(demux, Duration::from_secs(5));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut connection = Connection::new(stream);
        while processor.handle_one_request(&mut connection).await {}
    });

    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET /r HTTP/1.1\r\nHost: x\r\nAccept: application/json;q=0.9, text/plain;q=0.8\r\n\r\n")
        .await
        .unwrap();
    let response = read_response(&mut client).await;
    assert!(response.ends_with("json"));
}

#[tokio::test]
async fn http10_request_over_a_real_socket_closes_after_one_response() {
    let demux = create_demultiplexer();
    let _handle = connect(
        &demux,
        RequestHandlerId::new("/", Method::Get, Mime::WILDCARD, Mime::WILDCARD),
        |_, _| {},
    )
    .unwrap();
    let processor = create_request_processor(demux, Duration::from_secs(5));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut connection = Connection::new(stream);
        while processor.handle_one_request(&mut connection).await {}
    });

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();
    let response = read_response(&mut client).await;
    assert!(response.starts_with("HTTP/1.0 200"));
    assert!(response.contains("Connection: close\r\n"));

    // the server side closed its write half after one response; the
    // socket should report EOF rather than block.
    let mut trailing = [0u8; 1];
    let n = client.read(&mut trailing).await.unwrap();
    assert_eq!(n, 0);
}
