//! The exchange executor behind the transport.
//!
//! [`Connector`] is the seam between orchestration (dispatch, certificate
//! policy, escalation) and the wire. [`HttpConnector`] is the production
//! implementation on top of one pooled `reqwest::Client`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use reqwest::{Client, ClientBuilder};
use tracing::{debug, instrument};
use url::Url;

use super::error::{BuildError, TransportError};
use super::proxy::{ProxyPolicy, reqwest_proxy};
use super::request::{Method, RequestDescriptor};
use super::transport::{ExchangeOutcome, Response, TransportConfig};

/// Certificate verification mode for one attempt at an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Strict,
    /// Certificate checks disabled; used only after the policy overrode the
    /// failures of a strict handshake.
    Relaxed,
}

/// Performs one exchange on the wire.
///
/// Implementations report non-2xx replies as `HttpStatus` errors, certificate
/// handshake failures as `Certificate` errors with the failed checks, and
/// stop reading once `descriptor.response_limit()` is exceeded.
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    async fn execute(
        &self,
        url: &Url,
        descriptor: &RequestDescriptor,
        verification: Verification,
    ) -> ExchangeOutcome;
}

/// Connector backed by reqwest. Holds a verifying client and a relaxed
/// client sharing the same configuration and proxy policy.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    strict: Client,
    relaxed: Client,
}

impl HttpConnector {
    /// Builds both clients.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Client`] if reqwest rejects the configuration.
    pub fn new(
        config: &TransportConfig,
        proxy_policy: Arc<dyn ProxyPolicy>,
    ) -> Result<Self, BuildError> {
        let strict = base_client_builder(config, Arc::clone(&proxy_policy)).build()?;
        let relaxed = base_client_builder(config, proxy_policy)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self { strict, relaxed })
    }
}

fn base_client_builder(config: &TransportConfig, proxy_policy: Arc<dyn ProxyPolicy>) -> ClientBuilder {
    let mut builder = Client::builder()
        .connect_timeout(config.connect_timeout)
        .gzip(true)
        .user_agent(config.user_agent.clone())
        .proxy(reqwest_proxy(proxy_policy));
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    builder
}

#[async_trait]
impl Connector for HttpConnector {
    #[instrument(level = "debug", skip(self, descriptor), fields(url = %url, method = %descriptor.method()))]
    async fn execute(
        &self,
        url: &Url,
        descriptor: &RequestDescriptor,
        verification: Verification,
    ) -> ExchangeOutcome {
        let client = match verification {
            Verification::Strict => &self.strict,
            Verification::Relaxed => &self.relaxed,
        };
        let mut request = match descriptor.method() {
            Method::Get => client.get(url.clone()),
            Method::Post => client
                .post(url.clone())
                .body(descriptor.body().cloned().unwrap_or_default()),
        };
        for (name, value) in descriptor.headers() {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url.as_str(), &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::http_status(
                url.as_str(),
                status.as_u16(),
                status.canonical_reason(),
            ));
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let body = read_body(response, url, descriptor.response_limit()).await?;
        debug!(status = status.as_u16(), bytes = body.len(), "body received");

        Ok(Response {
            url: final_url,
            status: status.as_u16(),
            headers,
            body,
            certificate_overrides: Vec::new(),
        })
    }
}

/// Buffers the body, giving up as soon as it exceeds `limit`.
async fn read_body(
    response: reqwest::Response,
    url: &Url,
    limit: Option<u64>,
) -> Result<Bytes, TransportError> {
    if let (Some(limit), Some(announced)) = (limit, response.content_length())
        && announced > limit
    {
        return Err(TransportError::response_too_large(url.as_str(), limit));
    }

    let mut buffer = BytesMut::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| TransportError::from_reqwest(url.as_str(), &e))?;
        let received = u64::try_from(buffer.len() + chunk.len()).unwrap_or(u64::MAX);
        if limit.is_some_and(|limit| received > limit) {
            return Err(TransportError::response_too_large(
                url.as_str(),
                limit.unwrap_or_default(),
            ));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}
