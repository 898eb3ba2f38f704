//! Network request orchestration.
//!
//! - [`Transport`]: the shared client every request goes through
//! - [`Request`]: one GET or POST as an explicit state machine
//! - [`BlockingClient`]: blocking fetch/post/save helpers
//! - [`ErrorEscalation`]: user-facing handling of fire-and-forget failures
//! - [`FileSink`]: scratch and interactive saves of response bodies

mod blocking;
mod certificate;
mod connector;
mod constants;
mod error;
mod escalation;
mod proxy;
mod request;
mod sink;
mod transport;

pub use blocking::BlockingClient;
pub use certificate::{CertificateDecision, CertificateIssue, CertificatePolicy};
pub use connector::{Connector, HttpConnector, Verification};
pub use constants::{
    CONNECT_TIMEOUT, ESCALATION_TITLE, MAX_BUFFERED_RESPONSE_BYTES, RPC_CONTENT_TYPE,
    SCRATCH_DIR_NAME, SCRATCH_FILE_NAME, WRITE_ERROR_MESSAGE,
};
pub use error::{BuildError, FetchFileError, NetworkErrorKind, SinkError, StateError, TransportError};
pub use escalation::ErrorEscalation;
pub use proxy::{EnvironmentProxy, FixedProxy, NoProxy, ProxyChoice, ProxyPolicy, SwitchableProxy};
pub use request::{Method, Phase, Request, RequestDescriptor};
pub use sink::{FileSink, suggested_filename};
pub use transport::{
    ExchangeHandle, ExchangeId, ExchangeOutcome, Response, Transport, TransportBuilder,
    TransportConfig,
};
