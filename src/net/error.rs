//! Error types for the network layer.
//!
//! `TransportError` is the only failure an exchange can end with. It is
//! `Clone` because a terminal outcome is both handed to the caller and kept
//! by the request state machine, so it carries rendered text rather than the
//! underlying `reqwest::Error`.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use super::certificate::{CertificateIssue, certificate_issues};
use super::request::Phase;

/// Error kind reported for an exchange.
///
/// `NoError` and `NotFinished` are never carried by a `TransportError`; they
/// only appear from [`Request::error`](super::Request::error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkErrorKind {
    NoError,
    NotFinished,
    InvalidUrl,
    HostNotFound,
    ConnectionRefused,
    ConnectionReset,
    Timeout,
    Certificate,
    Proxy,
    HttpStatus(u16),
    ResponseTooLarge,
    Body,
    /// The exchange ended without reporting a result (runtime shut down).
    Aborted,
    Other,
}

impl NetworkErrorKind {
    /// Returns true for every kind except `NoError`.
    #[must_use]
    pub fn is_error(self) -> bool {
        self != Self::NoError
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoError => write!(f, "no error"),
            Self::NotFinished => write!(f, "not finished"),
            Self::InvalidUrl => write!(f, "invalid URL"),
            Self::HostNotFound => write!(f, "host not found"),
            Self::ConnectionRefused => write!(f, "connection refused"),
            Self::ConnectionReset => write!(f, "connection reset"),
            Self::Timeout => write!(f, "timed out"),
            Self::Certificate => write!(f, "certificate validation failed"),
            Self::Proxy => write!(f, "proxy failure"),
            Self::HttpStatus(status) => write!(f, "HTTP {status}"),
            Self::ResponseTooLarge => write!(f, "response too large"),
            Self::Body => write!(f, "body read failed"),
            Self::Aborted => write!(f, "aborted"),
            Self::Other => write!(f, "network error"),
        }
    }
}

/// Terminal failure of one exchange. Never retried by this layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} for {url}: {message}")]
pub struct TransportError {
    kind: NetworkErrorKind,
    url: String,
    message: String,
    certificate_issues: Vec<CertificateIssue>,
}

impl TransportError {
    /// Creates an error of the given kind.
    pub fn new(kind: NetworkErrorKind, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            message: message.into(),
            certificate_issues: Vec::new(),
        }
    }

    /// Creates an invalid URL error. No network activity happens for these.
    pub fn invalid_url(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        let url = url.into();
        let message = format!("invalid URL '{url}': {reason}");
        Self::new(NetworkErrorKind::InvalidUrl, url, message)
    }

    /// Creates an HTTP status error for a non-success reply.
    pub fn http_status(url: impl Into<String>, status: u16, reason: Option<&str>) -> Self {
        let message = match reason {
            Some(reason) => format!("server replied: {status} {reason}"),
            None => format!("server replied: {status}"),
        };
        Self::new(NetworkErrorKind::HttpStatus(status), url, message)
    }

    /// Creates a certificate validation error listing each failed check.
    pub fn certificate(
        url: impl Into<String>,
        issues: Vec<CertificateIssue>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: NetworkErrorKind::Certificate,
            url: url.into(),
            message: message.into(),
            certificate_issues: issues,
        }
    }

    /// Creates a response-too-large error.
    pub fn response_too_large(url: impl Into<String>, limit: u64) -> Self {
        Self::new(
            NetworkErrorKind::ResponseTooLarge,
            url,
            format!("response body exceeds {limit} bytes"),
        )
    }

    /// Creates an error for an exchange whose completion was never reported.
    pub fn aborted(url: impl Into<String>) -> Self {
        Self::new(
            NetworkErrorKind::Aborted,
            url,
            "exchange ended without a result",
        )
    }

    /// Maps a reqwest error onto the network error taxonomy.
    pub fn from_reqwest(url: impl Into<String>, source: &reqwest::Error) -> Self {
        let url = url.into();
        let message = error_chain_text(source);

        let issues = if url.starts_with("https:") {
            certificate_issues(source)
        } else {
            Vec::new()
        };
        if !issues.is_empty() {
            return Self::certificate(url, issues, message);
        }

        // Classify on the sources only; the top-level text embeds the URL.
        let lowered = source_chain_text(source).to_lowercase();
        let kind = if source.is_timeout() {
            NetworkErrorKind::Timeout
        } else if let Some(status) = source.status() {
            NetworkErrorKind::HttpStatus(status.as_u16())
        } else if source.is_connect() {
            classify_connect_failure(&lowered)
        } else if source.is_body() || source.is_decode() {
            NetworkErrorKind::Body
        } else if lowered.contains("connection reset") || lowered.contains("broken pipe") {
            NetworkErrorKind::ConnectionReset
        } else {
            NetworkErrorKind::Other
        };
        Self::new(kind, url, message)
    }

    #[must_use]
    pub fn kind(&self) -> NetworkErrorKind {
        self.kind
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Human readable text, suitable for a user-facing prompt.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Certificate checks that failed. Empty unless `kind` is `Certificate`.
    #[must_use]
    pub fn certificate_issues(&self) -> &[CertificateIssue] {
        &self.certificate_issues
    }
}

fn classify_connect_failure(lowered: &str) -> NetworkErrorKind {
    if lowered.contains("proxy") {
        NetworkErrorKind::Proxy
    } else if lowered.contains("dns")
        || lowered.contains("failed to lookup")
        || lowered.contains("name or service not known")
        || lowered.contains("no such host")
        || lowered.contains("nodename nor servname")
    {
        NetworkErrorKind::HostNotFound
    } else if lowered.contains("reset") {
        NetworkErrorKind::ConnectionReset
    } else if lowered.contains("timed out") {
        NetworkErrorKind::Timeout
    } else if lowered.contains("refused") {
        NetworkErrorKind::ConnectionRefused
    } else {
        NetworkErrorKind::Other
    }
}

/// Joins an error and all of its sources into one line.
pub(crate) fn error_chain_text(error: &(dyn std::error::Error + 'static)) -> String {
    let mut text = error.to_string();
    let mut current = error.source();
    while let Some(source) = current {
        let rendered = source.to_string();
        if !text.contains(&rendered) {
            text.push_str(": ");
            text.push_str(&rendered);
        }
        current = source.source();
    }
    text
}

fn source_chain_text(error: &(dyn std::error::Error + 'static)) -> String {
    error
        .source()
        .map(error_chain_text)
        .unwrap_or_default()
}

/// Illegal operation on a request state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    /// Configuration or start attempted after the request left `Idle`.
    #[error("request is {phase}; it can only be configured or started while idle")]
    NotIdle {
        /// Phase the request was in.
        phase: Phase,
    },

    /// `start` was called before `configure_get` / `configure_post`.
    #[error("request has no descriptor; configure a GET or POST first")]
    NotConfigured,

    /// A wait was attempted on a request that was never started.
    #[error("request was never dispatched")]
    NotDispatched,
}

/// Local I/O failure while persisting a response body.
#[derive(Debug, Error)]
#[error("IO error writing to {path}: {source}")]
pub struct SinkError {
    path: PathBuf,
    #[source]
    source: std::io::Error,
}

impl SinkError {
    /// Creates a sink error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

/// Failure of [`BlockingClient::fetch_to_file`](super::BlockingClient::fetch_to_file).
#[derive(Debug, Error)]
pub enum FetchFileError {
    #[error(transparent)]
    Fetch(#[from] TransportError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Failure to construct the shared transport.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// Blocking waits park the only worker of a current-thread runtime, so
    /// exchanges spawned on it would never be driven.
    #[error("transport needs a multi-thread runtime; got a current-thread handle")]
    CurrentThreadRuntime,
}
