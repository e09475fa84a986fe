//! C8 — owning handles whose destruction deregisters from the owning
//! registry exactly once (§4.8).
//!
//! Grounded in `examples/original_source/src/demux/demultiplex_handler.cpp`
//! (`~demultiplex_handler()` calling `demuxer_.disconnect(id_)`) and
//! `examples/original_source/src/demux/reset_error_handler_interface.hpp`
//! (the parallel shape for the error-handler table).

use std::sync::Arc;

use crate::demux::{Demux, RequestHandlerId};
use crate::processor::RequestProcessor;

/// Owns a demultiplexer registration. Dropping it disconnects the handler
/// (§4.5 `connect`). Holds `Arc<Demux>` so the demultiplexer cannot be
/// dropped while any handle referencing it is still alive.
pub struct RequestHandle {
    demux: Arc<Demux>,
    id: RequestHandlerId,
}

impl RequestHandle {
    pub(crate) fn new(demux: Arc<Demux>, id: RequestHandlerId) -> Self {
        Self { demux, id }
    }

    pub fn id(&self) -> &RequestHandlerId {
        &self.id
    }
}

impl Drop for RequestHandle {
    fn drop(&mut self) {
        self.demux.disconnect(&self.id);
    }
}

/// Owns an error-handler registration (§4.6 `set_error_handler`). Dropping
/// it resets the handler for that status code.
pub struct ErrorHandle {
    processor: Arc<RequestProcessor>,
    code: u16,
}

impl ErrorHandle {
    pub(crate) fn new(processor: Arc<RequestProcessor>, code: u16) -> Self {
        Self { processor, code }
    }

    pub fn code(&self) -> u16 {
        self.code
    }
}

impl Drop for ErrorHandle {
    fn drop(&mut self) {
        self.processor.reset_error_handler(self.code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::{connect, create_demultiplexer};
    use crate::mime::Mime;
    use crate::request::Method;

    #[test]
    fn dropping_request_handle_disconnects() {
        let demux = create_demultiplexer();
        let id = RequestHandlerId::new("/r", Method::Get, Mime::WILDCARD, Mime::WILDCARD);
        let handle = connect(&demux, id, |_, _| {}).unwrap();
        assert!(demux.path_exists("/r"));
        drop(handle);
        assert!(!demux.path_exists("/r"));
    }

    #[test]
    fn dropping_error_handle_resets_handler() {
        let processor = crate::processor::create_request_processor(
            create_demultiplexer(),
            std::time::Duration::from_secs(1),
        );
        let handle = processor.clone().set_error_handler(404, |_, _| {}).unwrap();
        assert!(processor.is_enabled(404));
        drop(handle);
        assert!(!processor.is_enabled(404));
    }
}
