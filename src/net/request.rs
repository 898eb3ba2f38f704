//! Request descriptors and the per-request state machine.
//!
//! A [`Request`] models exactly one GET or POST exchange:
//!
//! ```text
//! Idle ──start──▶ Dispatched ──completion──▶ Succeeded | Failed
//! ```
//!
//! `Idle → Dispatched` creates the transport handle and can happen once.
//! The handle's single completion event is the only trigger for the terminal
//! transition, which is irreversible. There is no cancellation: once
//! dispatched the exchange runs to completion even if the caller stops
//! looking at it.

use std::fmt;

use bytes::Bytes;
use tracing::debug;

use super::constants::RPC_CONTENT_TYPE;
use super::error::{NetworkErrorKind, StateError, TransportError};
use super::transport::{ExchangeHandle, ExchangeOutcome, Response, Transport};

const CONTENT_TYPE: &str = "content-type";
const CONTENT_LENGTH: &str = "content-length";

/// Request method. Only the two the layer issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// What to send: URL, method, optional body and headers.
///
/// For POST, `Content-Type` is always [`RPC_CONTENT_TYPE`] and
/// `Content-Length` is derived from the body; callers cannot set either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    url: String,
    method: Method,
    body: Option<Bytes>,
    headers: Vec<(String, String)>,
    response_limit: Option<u64>,
}

impl RequestDescriptor {
    /// A GET with no body. The URL is validated at dispatch time.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            body: None,
            headers: Vec::new(),
            response_limit: None,
        }
    }

    /// A POST carrying an opaque binary RPC payload.
    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let headers = vec![
            (CONTENT_TYPE.to_string(), RPC_CONTENT_TYPE.to_string()),
            (CONTENT_LENGTH.to_string(), body.len().to_string()),
        ];
        Self {
            url: url.into(),
            method: Method::Post,
            body: Some(body),
            headers,
            response_limit: None,
        }
    }

    /// Adds an extra header. `Content-Type` and `Content-Length` are owned by
    /// the descriptor and are ignored here.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        if name.eq_ignore_ascii_case(CONTENT_TYPE) || name.eq_ignore_ascii_case(CONTENT_LENGTH) {
            debug!(header = %name, "ignoring caller-supplied content header");
            return self;
        }
        self.headers.push((name, value.into()));
        self
    }

    /// Caps the number of body bytes the exchange will accept.
    #[must_use]
    pub(crate) fn with_response_limit(mut self, limit: u64) -> Self {
        self.response_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn response_limit(&self) -> Option<u64> {
        self.response_limit
    }
}

/// Observable phase of a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Dispatched,
    Succeeded,
    Failed,
}

impl Phase {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Idle => "idle",
            Self::Dispatched => "dispatched",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(text)
    }
}

enum State {
    Idle,
    Dispatched(ExchangeHandle),
    Succeeded(Response),
    Failed(TransportError),
}

impl State {
    fn phase(&self) -> Phase {
        match self {
            Self::Idle => Phase::Idle,
            Self::Dispatched(_) => Phase::Dispatched,
            Self::Succeeded(_) => Phase::Succeeded,
            Self::Failed(_) => Phase::Failed,
        }
    }
}

/// One GET or POST exchange as an explicit state machine. Never reused.
///
/// Errors from a request are returned to the caller; nothing here escalates
/// to the user.
pub struct Request {
    descriptor: Option<RequestDescriptor>,
    state: State,
    history: Vec<Phase>,
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("descriptor", &self.descriptor)
            .field("phase", &self.phase())
            .finish()
    }
}

impl Request {
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptor: None,
            state: State::Idle,
            history: vec![Phase::Idle],
        }
    }

    /// Configures a GET against `url`. Only allowed while idle.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotIdle`] once the request has been started.
    pub fn configure_get(&mut self, url: impl Into<String>) -> Result<(), StateError> {
        self.ensure_idle()?;
        self.descriptor = Some(RequestDescriptor::get(url));
        Ok(())
    }

    /// Configures a POST with the fixed RPC content type and computed length.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotIdle`] once the request has been started.
    pub fn configure_post(
        &mut self,
        url: impl Into<String>,
        body: impl Into<Bytes>,
    ) -> Result<(), StateError> {
        self.ensure_idle()?;
        self.descriptor = Some(RequestDescriptor::post(url, body));
        Ok(())
    }

    /// Enters `Dispatched`, handing the descriptor to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotConfigured`] without a descriptor and
    /// [`StateError::NotIdle`] if already started.
    pub fn start(&mut self, transport: &Transport) -> Result<(), StateError> {
        self.ensure_idle()?;
        let descriptor = self.descriptor.clone().ok_or(StateError::NotConfigured)?;
        debug!(method = %descriptor.method(), url = %descriptor.url(), "request dispatched");
        let handle = transport.launch(descriptor);
        self.transition(State::Dispatched(handle));
        Ok(())
    }

    /// Waits for the completion event and returns the terminal phase.
    ///
    /// Dropping this future before it resolves leaves the request in
    /// `Dispatched`; the exchange keeps running.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotDispatched`] if the request was never started.
    pub async fn finished(&mut self) -> Result<Phase, StateError> {
        let outcome = match &mut self.state {
            State::Idle => return Err(StateError::NotDispatched),
            State::Succeeded(_) | State::Failed(_) => return Ok(self.phase()),
            State::Dispatched(handle) => handle.completion().await,
        };
        self.settle(outcome);
        Ok(self.phase())
    }

    /// Blocks the calling thread until the completion event arrives.
    ///
    /// Must not be called from within an async task.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotDispatched`] if the request was never started.
    pub fn wait(&mut self) -> Result<Phase, StateError> {
        let outcome = match &mut self.state {
            State::Idle => return Err(StateError::NotDispatched),
            State::Succeeded(_) | State::Failed(_) => return Ok(self.phase()),
            State::Dispatched(handle) => handle.wait_in_place(),
        };
        self.settle(outcome);
        Ok(self.phase())
    }

    /// Applies the completion if it has already arrived. Never blocks.
    ///
    /// Returns true once the request is terminal.
    pub fn poll_completion(&mut self) -> bool {
        if let State::Dispatched(handle) = &mut self.state
            && let Some(outcome) = handle.try_outcome()
        {
            self.settle(outcome);
        }
        self.phase().is_terminal()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Phases visited so far, in order.
    #[must_use]
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    #[must_use]
    pub fn descriptor(&self) -> Option<&RequestDescriptor> {
        self.descriptor.as_ref()
    }

    /// Response body. Empty unless the request succeeded; check
    /// [`error`](Self::error) first to tell an empty body from no body.
    #[must_use]
    pub fn data(&self) -> Bytes {
        match &self.state {
            State::Succeeded(response) => response.body.clone(),
            _ => Bytes::new(),
        }
    }

    /// `NoError` only when succeeded, `NotFinished` before completion,
    /// otherwise the failure's kind.
    #[must_use]
    pub fn error(&self) -> NetworkErrorKind {
        match &self.state {
            State::Idle | State::Dispatched(_) => NetworkErrorKind::NotFinished,
            State::Succeeded(_) => NetworkErrorKind::NoError,
            State::Failed(error) => error.kind(),
        }
    }

    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        match &self.state {
            State::Succeeded(response) => Some(response),
            _ => None,
        }
    }

    #[must_use]
    pub fn failure(&self) -> Option<&TransportError> {
        match &self.state {
            State::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Consumes a terminal request. Returns `None` if it has not finished.
    #[must_use]
    pub fn into_outcome(self) -> Option<ExchangeOutcome> {
        match self.state {
            State::Succeeded(response) => Some(Ok(response)),
            State::Failed(error) => Some(Err(error)),
            State::Idle | State::Dispatched(_) => None,
        }
    }

    fn ensure_idle(&self) -> Result<(), StateError> {
        match self.phase() {
            Phase::Idle => Ok(()),
            phase => Err(StateError::NotIdle { phase }),
        }
    }

    fn settle(&mut self, outcome: ExchangeOutcome) {
        debug_assert_eq!(self.phase(), Phase::Dispatched);
        let next = match outcome {
            Ok(response) => State::Succeeded(response),
            Err(error) => State::Failed(error),
        };
        self.transition(next);
    }

    fn transition(&mut self, next: State) {
        let from = self.phase();
        let to = next.phase();
        debug!(%from, %to, "request transition");
        self.state = next;
        self.history.push(to);
    }
}
