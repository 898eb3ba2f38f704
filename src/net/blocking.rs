//! Blocking helpers over the transport.
//!
//! Each call launches one exchange and parks the calling thread until its
//! completion arrives. Errors are returned, never escalated.
//!
//! None of these may be called from inside an async task; they panic there.
//! Call them from plain threads or `tokio::task::spawn_blocking`.

use std::path::PathBuf;

use bytes::Bytes;
use tracing::{debug, instrument};

use super::constants::MAX_BUFFERED_RESPONSE_BYTES;
use super::error::{FetchFileError, TransportError};
use super::request::{Method, RequestDescriptor};
use super::sink::FileSink;
use super::transport::Transport;

/// Synchronous facade over a shared [`Transport`].
#[derive(Debug, Clone)]
pub struct BlockingClient {
    transport: Transport,
    sink: FileSink,
    max_buffer_bytes: u64,
}

impl BlockingClient {
    pub fn new(transport: Transport, sink: FileSink) -> Self {
        Self {
            transport,
            sink,
            max_buffer_bytes: MAX_BUFFERED_RESPONSE_BYTES,
        }
    }

    /// Overrides the `fetch_to_buffer` ceiling (inclusive).
    #[must_use]
    pub fn with_max_buffer_bytes(mut self, limit: u64) -> Self {
        self.max_buffer_bytes = limit;
        self
    }

    #[must_use]
    pub fn sink(&self) -> &FileSink {
        &self.sink
    }

    /// GETs `url` and returns the body.
    ///
    /// # Errors
    ///
    /// Returns the exchange failure, or `ResponseTooLarge` when the body
    /// exceeds the ceiling.
    ///
    /// # Panics
    ///
    /// Panics when called from within an async task.
    #[instrument(skip(self))]
    pub fn fetch_to_buffer(&self, url: &str) -> Result<Bytes, TransportError> {
        let descriptor = RequestDescriptor::get(url).with_response_limit(self.max_buffer_bytes);
        let response = self.transport.launch(descriptor).wait()?;
        Ok(response.body)
    }

    /// GETs `url` into the scratch file and returns its path.
    ///
    /// # Errors
    ///
    /// Returns [`FetchFileError::Fetch`] if the download fails and
    /// [`FetchFileError::Sink`] if the scratch file cannot be written.
    ///
    /// # Panics
    ///
    /// Panics when called from within an async task.
    #[instrument(skip(self))]
    pub fn fetch_to_file(&self, url: &str) -> Result<PathBuf, FetchFileError> {
        let body = self.fetch_to_buffer(url)?;
        Ok(self.sink.save_scratch(&body)?)
    }

    /// POSTs an RPC payload and returns the reply body.
    ///
    /// # Errors
    ///
    /// Returns the exchange failure. Nothing is shown to the user.
    ///
    /// # Panics
    ///
    /// Panics when called from within an async task.
    #[instrument(skip(self, body))]
    pub fn post_and_wait(&self, url: &str, body: impl Into<Bytes>) -> Result<Bytes, TransportError> {
        let response = self
            .transport
            .launch(RequestDescriptor::post(url, body))
            .wait()?;
        Ok(response.body)
    }

    /// GETs `descriptor` and offers the reply for interactive save.
    ///
    /// Returns the saved path. Download failures and cancelled saves yield
    /// `None` without telling the user; only local write failures are
    /// reported, by the sink. A non-GET descriptor is refused before any
    /// network activity.
    ///
    /// # Panics
    ///
    /// Panics when called from within an async task.
    #[instrument(skip(self, descriptor), fields(url = %descriptor.url()))]
    pub fn download_and_save(&self, descriptor: RequestDescriptor) -> Option<PathBuf> {
        if descriptor.method() != Method::Get {
            debug!(method = %descriptor.method(), "download refused; only GET is saved");
            return None;
        }
        let response = match self.transport.launch(descriptor).wait() {
            Ok(response) => response,
            Err(error) => {
                debug!(error = %error, "download failed; nothing saved");
                return None;
            }
        };
        match self.sink.save_interactive(&response) {
            Ok(path) => path,
            Err(error) => {
                debug!(error = %error, "save failed");
                None
            }
        }
    }
}
