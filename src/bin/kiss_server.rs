//! Example embedder for `restmux`: registers a couple of resources on
//! the demultiplexer, spins up a `TcpListener`, and drives one
//! `RequestProcessor` per accepted connection. Mirrors the teacher's
//! accept-loop/shutdown-signal shape (`main.rs`), re-expressed against
//! `restmux`'s library API instead of hand-rolled request parsing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::signal;

use restmux::demux::{connect, create_demultiplexer, RequestHandlerId};
use restmux::mime::Mime;
use restmux::processor::{create_request_processor, RequestProcessor};
use restmux::request::Method;
use restmux::Connection;

const PORT: u16 = 8080;
const CONNECTION_TIMEOUT_SECS: u64 = 30;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[tokio::main]
async fn main() {
    env_logger::init();

    let demux = create_demultiplexer();

    // text/plain handler for "/"
    let _root_handle = connect(
        &demux,
        RequestHandlerId::new("/", Method::Get, Mime::WILDCARD, Mime::WILDCARD),
        |_request, response| {
            response.set_content(b"restmux is running\n".to_vec(), false);
        },
    )
    .expect("register / handler");

    // application/json handler for "/health"
    let app_type = demux.register_mime_type("application");
    let json_subtype = demux.register_mime_subtype("json");
    let health_accept = Mime::new(app_type, json_subtype);
    let _health_handle = connect(
        &demux,
        RequestHandlerId::new("/health", Method::Get, Mime::WILDCARD, health_accept),
        |_request, response| {
            response.set_header("content-type", "application/json");
            response.set_content(br#"{"status":"ok"}"#.to_vec(), false);
        },
    )
    .expect("register /health handler");

    let processor = create_request_processor(demux, Duration::from_secs(CONNECTION_TIMEOUT_SECS));

    let listener = TcpListener::bind(("0.0.0.0", PORT))
        .await
        .expect("failed to bind to address");

    log::info!("restmux example server listening on http://0.0.0.0:{PORT}");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let _ = stream.set_nodelay(true);
                        tokio::spawn(handle_connection(stream, processor.clone()));
                    }
                    Err(err) => {
                        log::warn!("accept failed: {err}");
                        continue;
                    }
                }
            }
            _ = shutdown_signal() => {
                log::info!("shutdown signal received, stopping server");
                SHUTDOWN.store(true, Ordering::Relaxed);
                break;
            }
        }
    }

    log::info!("server shutdown complete");
}

async fn handle_connection(stream: TcpStream, processor: Arc<RequestProcessor>) {
    let mut connection = Connection::new(stream);
    while !SHUTDOWN.load(Ordering::Relaxed) {
        if !processor.handle_one_request(&mut connection).await {
            break;
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
