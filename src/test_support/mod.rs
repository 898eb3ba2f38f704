//! Fakes shared by the unit tests.

pub mod socket_guard;

use std::path::{Path, PathBuf};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use url::Url;

use crate::interaction::{EscalationChoice, Interaction, SettingsSection};
use crate::net::{
    CertificateIssue, Connector, ExchangeOutcome, NetworkErrorKind, RequestDescriptor, Response,
    TransportError, Verification,
};

/// Records every interaction and answers with fixed choices.
#[derive(Debug)]
pub struct RecordingInteraction {
    choice: EscalationChoice,
    save_path: Option<Option<PathBuf>>,
    prompts: Mutex<Vec<(String, String)>>,
    opened: Mutex<Vec<SettingsSection>>,
    suggested: Mutex<Vec<PathBuf>>,
    io_errors: Mutex<Vec<String>>,
}

impl Default for RecordingInteraction {
    fn default() -> Self {
        Self {
            choice: EscalationChoice::Acknowledged,
            save_path: None,
            prompts: Mutex::new(Vec::new()),
            opened: Mutex::new(Vec::new()),
            suggested: Mutex::new(Vec::new()),
            io_errors: Mutex::new(Vec::new()),
        }
    }
}

#[allow(clippy::unwrap_used)]
impl RecordingInteraction {
    pub fn answering(mut self, choice: EscalationChoice) -> Self {
        self.choice = choice;
        self
    }

    /// Fixes the save dialog answer. Without this the suggestion is accepted.
    pub fn saving_to(mut self, path: Option<PathBuf>) -> Self {
        self.save_path = Some(path);
        self
    }

    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn opened_sections(&self) -> Vec<SettingsSection> {
        self.opened.lock().unwrap().clone()
    }

    pub fn suggested_paths(&self) -> Vec<PathBuf> {
        self.suggested.lock().unwrap().clone()
    }

    pub fn io_errors(&self) -> Vec<String> {
        self.io_errors.lock().unwrap().clone()
    }
}

#[allow(clippy::unwrap_used)]
impl Interaction for RecordingInteraction {
    fn confirm_network_error(&self, title: &str, message: &str) -> EscalationChoice {
        self.prompts
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
        self.choice
    }

    fn open_settings(&self, section: SettingsSection) {
        self.opened.lock().unwrap().push(section);
    }

    fn choose_save_path(&self, suggested: &Path) -> Option<PathBuf> {
        self.suggested.lock().unwrap().push(suggested.to_path_buf());
        match &self.save_path {
            Some(answer) => answer.clone(),
            None => Some(suggested.to_path_buf()),
        }
    }

    fn report_io_error(&self, message: &str) {
        self.io_errors.lock().unwrap().push(message.to_string());
    }
}

/// Connector that never touches the network.
///
/// Succeeds with a body of `"<METHOD> <path>"` unless configured to fail.
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    failure: Option<NetworkErrorKind>,
    certificate_issues: Vec<CertificateIssue>,
    calls: Mutex<Vec<Verification>>,
}

#[allow(clippy::unwrap_used)]
impl ScriptedConnector {
    /// Strict attempts fail certificate validation with `issues`; relaxed
    /// attempts succeed.
    pub fn with_certificate_issues(mut self, issues: Vec<CertificateIssue>) -> Self {
        self.certificate_issues = issues;
        self
    }

    pub fn failing_with(mut self, kind: NetworkErrorKind) -> Self {
        self.failure = Some(kind);
        self
    }

    pub fn calls(&self) -> Vec<Verification> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
#[allow(clippy::unwrap_used)]
impl Connector for ScriptedConnector {
    async fn execute(
        &self,
        url: &Url,
        descriptor: &RequestDescriptor,
        verification: Verification,
    ) -> ExchangeOutcome {
        self.calls.lock().unwrap().push(verification);
        if let Some(kind) = self.failure {
            return Err(TransportError::new(kind, url.as_str(), "scripted failure"));
        }
        if verification == Verification::Strict && !self.certificate_issues.is_empty() {
            return Err(TransportError::certificate(
                url.as_str(),
                self.certificate_issues.clone(),
                "invalid peer certificate",
            ));
        }
        Ok(Response {
            url: url.clone(),
            status: 200,
            headers: HeaderMap::new(),
            body: Bytes::from(format!("{} {}", descriptor.method(), url.path())),
            certificate_overrides: Vec::new(),
        })
    }
}

/// Polls `condition` for up to two seconds.
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// `fmt` subscriber writer that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

#[allow(clippy::unwrap_used)]
impl CapturedLogs {
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        let writer = self.clone();
        tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish()
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

#[allow(clippy::unwrap_used)]
impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
