//! The shared transport every request goes through.
//!
//! One [`Transport`] is built at start-up and passed to everything that
//! issues requests. It owns the pooled client (through its [`Connector`]),
//! the proxy and certificate policies, and the runtime handle exchanges are
//! spawned on. Cloning it is cheap and shares all of that.
//!
//! Two ways in:
//! - [`Transport::dispatch`] is fire-and-forget: a failed exchange is
//!   escalated to the user once it completes.
//! - the request state machine and the blocking facade use a non-escalating
//!   launch and return errors to their callers instead.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::instrument::WithSubscriber;
use tracing::{Instrument, debug, info, info_span, warn};
use url::Url;

use super::certificate::{CertificateDecision, CertificateIssue, CertificatePolicy};
use super::connector::{Connector, HttpConnector, Verification};
use super::constants::CONNECT_TIMEOUT;
use super::error::{BuildError, NetworkErrorKind, TransportError};
use super::escalation::ErrorEscalation;
use super::proxy::{EnvironmentProxy, ProxyPolicy};
use super::request::RequestDescriptor;
use crate::interaction::{HeadlessInteraction, Interaction};
use crate::user_agent;

/// Terminal result of one exchange.
pub type ExchangeOutcome = Result<Response, TransportError>;

/// A completed, successful reply.
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL after redirects.
    pub url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Certificate checks that failed and were overridden by policy.
    pub certificate_overrides: Vec<CertificateIssue>,
}

/// Settings for the shared transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    /// Overall exchange timeout. `None` leaves it to the underlying client.
    pub timeout: Option<Duration>,
    pub user_agent: String,
    pub certificate_policy: CertificatePolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            timeout: None,
            user_agent: user_agent::default_user_agent(),
            certificate_policy: CertificatePolicy::default(),
        }
    }
}

/// Process-unique exchange number, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeId(u64);

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to one in-flight exchange. Reports exactly one completion.
///
/// Dropping the handle does not abort the exchange; its result is discarded.
#[derive(Debug)]
pub struct ExchangeHandle {
    id: ExchangeId,
    url: String,
    receiver: Option<oneshot::Receiver<ExchangeOutcome>>,
    runtime: Handle,
}

impl ExchangeHandle {
    #[must_use]
    pub fn id(&self) -> ExchangeId {
        self.id
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Awaits the completion.
    pub async fn outcome(mut self) -> ExchangeOutcome {
        self.completion().await
    }

    /// Blocks the calling thread until the completion arrives.
    ///
    /// # Panics
    ///
    /// Panics when called from within an async task (including another
    /// exchange's completion handling); blocking waits are not re-entrant.
    pub fn wait(mut self) -> ExchangeOutcome {
        self.wait_in_place()
    }

    /// Returns the completion if it has already arrived. Never blocks.
    pub fn try_outcome(&mut self) -> Option<ExchangeOutcome> {
        let receiver = self.receiver.as_mut()?;
        let outcome = match receiver.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(TransportError::aborted(&self.url)),
        };
        self.receiver = None;
        Some(outcome)
    }

    pub(crate) async fn completion(&mut self) -> ExchangeOutcome {
        let Some(receiver) = self.receiver.as_mut() else {
            return Err(TransportError::aborted(&self.url));
        };
        let outcome = receiver
            .await
            .unwrap_or_else(|_| Err(TransportError::aborted(&self.url)));
        self.receiver = None;
        outcome
    }

    pub(crate) fn wait_in_place(&mut self) -> ExchangeOutcome {
        let runtime = self.runtime.clone();
        runtime.block_on(self.completion())
    }
}

/// Builder for [`Transport`].
#[derive(Debug)]
pub struct TransportBuilder {
    config: TransportConfig,
    proxy_policy: Arc<dyn ProxyPolicy>,
    interaction: Arc<dyn Interaction>,
    connector: Option<Arc<dyn Connector>>,
}

impl Default for TransportBuilder {
    fn default() -> Self {
        Self {
            config: TransportConfig::default(),
            proxy_policy: Arc::new(EnvironmentProxy),
            interaction: Arc::new(HeadlessInteraction),
            connector: None,
        }
    }
}

impl TransportBuilder {
    #[must_use]
    pub fn config(mut self, config: TransportConfig) -> Self {
        self.config = config;
        self
    }

    /// Proxy policy consulted for every request. Defaults to the proxy
    /// environment variables.
    #[must_use]
    pub fn proxy_policy(mut self, policy: Arc<dyn ProxyPolicy>) -> Self {
        self.proxy_policy = policy;
        self
    }

    /// Host interaction used for escalation. Defaults to headless.
    #[must_use]
    pub fn interaction(mut self, interaction: Arc<dyn Interaction>) -> Self {
        self.interaction = interaction;
        self
    }

    /// Replaces the reqwest connector. The proxy policy is ignored when set.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Builds the transport; exchanges will be spawned on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::CurrentThreadRuntime`] if `runtime` belongs to a
    /// current-thread runtime, and [`BuildError::Client`] if the HTTP client
    /// cannot be constructed.
    pub fn build(self, runtime: Handle) -> Result<Transport, BuildError> {
        if runtime.runtime_flavor() == RuntimeFlavor::CurrentThread {
            return Err(BuildError::CurrentThreadRuntime);
        }
        let connector = match self.connector {
            Some(connector) => connector,
            None => Arc::new(HttpConnector::new(&self.config, self.proxy_policy)?),
        };
        debug!(
            certificate_policy = ?self.config.certificate_policy,
            "transport ready"
        );
        Ok(Transport {
            shared: Arc::new(Shared {
                connector,
                certificate_policy: self.config.certificate_policy,
                escalation: ErrorEscalation::new(Arc::clone(&self.interaction)),
                interaction: self.interaction,
                runtime,
                next_id: AtomicU64::new(1),
            }),
        })
    }
}

/// Shared connection substrate and cross-cutting policies.
#[derive(Debug, Clone)]
pub struct Transport {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    connector: Arc<dyn Connector>,
    certificate_policy: CertificatePolicy,
    escalation: ErrorEscalation,
    interaction: Arc<dyn Interaction>,
    runtime: Handle,
    next_id: AtomicU64,
}

impl Transport {
    #[must_use]
    pub fn builder() -> TransportBuilder {
        TransportBuilder::default()
    }

    /// Starts an exchange and returns immediately. A failed exchange is
    /// escalated to the user after its completion is delivered.
    #[must_use = "dropping the handle discards the result; the exchange still runs"]
    pub fn dispatch(&self, descriptor: RequestDescriptor) -> ExchangeHandle {
        self.spawn_exchange(descriptor, true)
    }

    /// Starts an exchange whose errors are only returned to the caller.
    pub(crate) fn launch(&self, descriptor: RequestDescriptor) -> ExchangeHandle {
        self.spawn_exchange(descriptor, false)
    }

    #[must_use]
    pub fn interaction(&self) -> Arc<dyn Interaction> {
        Arc::clone(&self.shared.interaction)
    }

    #[must_use]
    pub fn certificate_policy(&self) -> CertificatePolicy {
        self.shared.certificate_policy
    }

    fn spawn_exchange(&self, descriptor: RequestDescriptor, escalate: bool) -> ExchangeHandle {
        let id = ExchangeId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = oneshot::channel();
        let handle = ExchangeHandle {
            id,
            url: descriptor.url().to_string(),
            receiver: Some(receiver),
            runtime: self.shared.runtime.clone(),
        };

        let url = match parse_request_url(descriptor.url()) {
            Ok(url) => url,
            Err(error) => {
                debug!(exchange = %id, error = %error, "rejected before dispatch");
                let failure = escalate.then(|| error.clone());
                let _ = sender.send(Err(error));
                if let Some(failure) = failure {
                    self.shared.escalate_detached(failure);
                }
                return handle;
            }
        };

        debug!(exchange = %id, method = %descriptor.method(), url = %url, escalate, "dispatching");
        let shared = Arc::clone(&self.shared);
        let span = info_span!("exchange", id = %id);
        self.shared.runtime.spawn(
            async move {
                let outcome = shared.perform(&url, &descriptor).await;
                match &outcome {
                    Ok(response) => info!(
                        url = %url,
                        status = response.status,
                        bytes = response.body.len(),
                        "exchange complete"
                    ),
                    Err(error) => debug!(url = %url, error = %error, "exchange failed"),
                }
                let failure = if escalate {
                    outcome.as_ref().err().cloned()
                } else {
                    None
                };
                if sender.send(outcome).is_err() {
                    debug!("result discarded; handle was dropped");
                }
                if let Some(failure) = failure {
                    shared.escalate_detached(failure);
                }
            }
            .instrument(span)
            .with_current_subscriber(),
        );
        handle
    }
}

impl Shared {
    async fn perform(&self, url: &Url, descriptor: &RequestDescriptor) -> ExchangeOutcome {
        let error = match self
            .connector
            .execute(url, descriptor, Verification::Strict)
            .await
        {
            Err(error) if error.kind() == NetworkErrorKind::Certificate => error,
            outcome => return outcome,
        };

        match self
            .certificate_policy
            .review(url.as_str(), error.certificate_issues())
        {
            CertificateDecision::Reject => {
                warn!(url = %url, error = %error, "certificate validation failed");
                Err(error)
            }
            CertificateDecision::Override(issues) => {
                let mut response = self
                    .connector
                    .execute(url, descriptor, Verification::Relaxed)
                    .await?;
                response.certificate_overrides = issues;
                Ok(response)
            }
        }
    }

    fn escalate_detached(&self, failure: TransportError) {
        let escalation = self.escalation.clone();
        self.runtime.spawn_blocking(move || {
            escalation.escalate(&failure);
        });
    }
}

fn parse_request_url(raw: &str) -> Result<Url, TransportError> {
    let url = Url::parse(raw).map_err(|e| TransportError::invalid_url(raw, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(TransportError::invalid_url(
            raw,
            format!("unsupported scheme '{scheme}'"),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::interaction::EscalationChoice;
    use crate::test_support::{CapturedLogs, RecordingInteraction, ScriptedConnector, eventually};

    fn transport_with(
        connector: Arc<ScriptedConnector>,
        interaction: Arc<RecordingInteraction>,
        policy: CertificatePolicy,
    ) -> Transport {
        Transport::builder()
            .config(TransportConfig {
                certificate_policy: policy,
                ..TransportConfig::default()
            })
            .connector(connector)
            .interaction(interaction)
            .build(Handle::current())
            .unwrap()
    }

    #[test]
    fn test_parse_request_url_rejects_non_http_schemes() {
        assert_eq!(
            parse_request_url("ftp://example.com/a").unwrap_err().kind(),
            NetworkErrorKind::InvalidUrl
        );
        assert_eq!(
            parse_request_url("no scheme here").unwrap_err().kind(),
            NetworkErrorKind::InvalidUrl
        );
        assert!(parse_request_url("https://example.com/a").is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_url_fails_without_network_activity() {
        let connector = Arc::new(ScriptedConnector::default());
        let interaction = Arc::new(RecordingInteraction::default());
        let transport = transport_with(
            connector.clone(),
            interaction.clone(),
            CertificatePolicy::default(),
        );

        let mut handle = transport.launch(RequestDescriptor::get("::not a url::"));
        let outcome = handle.try_outcome().unwrap();

        assert_eq!(outcome.unwrap_err().kind(), NetworkErrorKind::InvalidUrl);
        assert!(connector.calls().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_certificate_failure_is_overridden_and_recorded() {
        let connector = Arc::new(
            ScriptedConnector::default()
                .with_certificate_issues(vec![CertificateIssue::HostnameMismatch]),
        );
        let interaction = Arc::new(RecordingInteraction::default());
        let transport = transport_with(
            connector.clone(),
            interaction.clone(),
            CertificatePolicy::OverrideAndLog,
        );

        let response = transport
            .dispatch(RequestDescriptor::get("https://example.com/a"))
            .outcome()
            .await
            .unwrap();

        assert_eq!(
            response.certificate_overrides,
            vec![CertificateIssue::HostnameMismatch]
        );
        assert_eq!(
            connector.calls(),
            vec![Verification::Strict, Verification::Relaxed]
        );
        assert!(interaction.prompts().is_empty());
    }

    #[test]
    fn test_hostname_mismatch_is_logged_and_succeeds() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let connector = Arc::new(
            ScriptedConnector::default()
                .with_certificate_issues(vec![CertificateIssue::HostnameMismatch]),
        );
        let interaction = Arc::new(RecordingInteraction::default());
        let transport = Transport::builder()
            .connector(connector)
            .interaction(interaction.clone())
            .build(runtime.handle().clone())
            .unwrap();
        let captured = CapturedLogs::default();

        let outcome = tracing::subscriber::with_default(captured.subscriber(), || {
            runtime.block_on(
                transport
                    .dispatch(RequestDescriptor::get("https://example.com/notes/1"))
                    .outcome(),
            )
        });

        let response = outcome.unwrap();
        assert_eq!(&response.body[..], b"GET /notes/1");
        let logs = captured.text();
        assert!(logs.contains("WARN"), "logs: {logs}");
        assert!(logs.contains("overriding certificate validation failure"), "logs: {logs}");
        assert!(logs.contains("hostname mismatch"), "logs: {logs}");
        std::thread::sleep(Duration::from_millis(50));
        assert!(interaction.prompts().is_empty());
    }

    #[test]
    fn test_build_rejects_current_thread_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let error = Transport::builder()
            .connector(Arc::new(ScriptedConnector::default()))
            .build(runtime.handle().clone())
            .unwrap_err();

        assert!(matches!(error, BuildError::CurrentThreadRuntime));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_strict_policy_fails_certificate_errors() {
        let connector = Arc::new(
            ScriptedConnector::default().with_certificate_issues(vec![CertificateIssue::Expired]),
        );
        let interaction = Arc::new(RecordingInteraction::default());
        let transport = transport_with(
            connector.clone(),
            interaction.clone(),
            CertificatePolicy::Strict,
        );

        let error = transport
            .launch(RequestDescriptor::get("https://example.com/a"))
            .outcome()
            .await
            .unwrap_err();

        assert_eq!(error.kind(), NetworkErrorKind::Certificate);
        assert_eq!(error.certificate_issues(), &[CertificateIssue::Expired]);
        assert_eq!(connector.calls(), vec![Verification::Strict]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dispatch_escalates_failures_once() {
        let connector = Arc::new(
            ScriptedConnector::default().failing_with(NetworkErrorKind::ConnectionRefused),
        );
        let interaction = Arc::new(
            RecordingInteraction::default().answering(EscalationChoice::OpenNetworkSettings),
        );
        let transport = transport_with(
            connector,
            interaction.clone(),
            CertificatePolicy::default(),
        );

        let error = transport
            .dispatch(RequestDescriptor::get("https://example.com/a"))
            .outcome()
            .await
            .unwrap_err();
        assert_eq!(error.kind(), NetworkErrorKind::ConnectionRefused);

        assert!(eventually(|| interaction.opened_sections().len() == 1).await);
        assert_eq!(interaction.prompts().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dispatch_escalates_invalid_url() {
        let interaction = Arc::new(RecordingInteraction::default());
        let transport = transport_with(
            Arc::new(ScriptedConnector::default()),
            interaction.clone(),
            CertificatePolicy::default(),
        );

        let error = transport
            .dispatch(RequestDescriptor::get("mailto:someone@example.com"))
            .outcome()
            .await
            .unwrap_err();
        assert_eq!(error.kind(), NetworkErrorKind::InvalidUrl);
        assert!(eventually(|| interaction.prompts().len() == 1).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_launch_never_escalates() {
        let connector = Arc::new(
            ScriptedConnector::default().failing_with(NetworkErrorKind::HostNotFound),
        );
        let interaction = Arc::new(RecordingInteraction::default());
        let transport = transport_with(
            connector,
            interaction.clone(),
            CertificatePolicy::default(),
        );

        let error = transport
            .launch(RequestDescriptor::get("https://example.com/a"))
            .outcome()
            .await
            .unwrap_err();
        assert_eq!(error.kind(), NetworkErrorKind::HostNotFound);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(interaction.prompts().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exchange_ids_are_unique() {
        let transport = transport_with(
            Arc::new(ScriptedConnector::default()),
            Arc::new(RecordingInteraction::default()),
            CertificatePolicy::default(),
        );
        let first = transport.launch(RequestDescriptor::get("https://example.com/1"));
        let second = transport.launch(RequestDescriptor::post("https://example.com/2", vec![1_u8]));
        assert_ne!(first.id(), second.id());
        assert_eq!(second.url(), "https://example.com/2");

        let response = second.outcome().await.unwrap();
        assert_eq!(&response.body[..], b"POST /2");
        assert!(first.outcome().await.is_ok());
    }
}
