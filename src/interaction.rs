//! User-facing decisions the network layer needs from its host.
//!
//! The library never draws dialogs. Escalation prompts, save-destination
//! prompts and I/O error notices go through [`Interaction`], which the host
//! implements (the CLI uses a terminal implementation; services can use
//! [`HeadlessInteraction`]).

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info};

/// Answer to a network error prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationChoice {
    Acknowledged,
    OpenNetworkSettings,
}

/// Settings section to pre-select when opening configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSection {
    Network,
}

impl SettingsSection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
        }
    }
}

impl fmt::Display for SettingsSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host-provided user interaction.
///
/// Methods may block until the user answers; the transport only calls them
/// from blocking-capable threads.
pub trait Interaction: Send + Sync + fmt::Debug {
    /// Shows a network failure and asks for acknowledgement or a jump to the
    /// network settings.
    fn confirm_network_error(&self, title: &str, message: &str) -> EscalationChoice;

    /// Opens configuration with `section` selected.
    fn open_settings(&self, section: SettingsSection);

    /// Asks where to save a download. `None` means the user cancelled.
    fn choose_save_path(&self, suggested: &Path) -> Option<PathBuf>;

    /// Tells the user a local write failed.
    fn report_io_error(&self, message: &str);
}

/// Non-interactive host: logs everything, acknowledges every error and
/// accepts the suggested save path.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessInteraction;

impl Interaction for HeadlessInteraction {
    fn confirm_network_error(&self, title: &str, message: &str) -> EscalationChoice {
        error!(title, message, "network error acknowledged without prompt");
        EscalationChoice::Acknowledged
    }

    fn open_settings(&self, section: SettingsSection) {
        info!(%section, "settings requested in headless mode; ignoring");
    }

    fn choose_save_path(&self, suggested: &Path) -> Option<PathBuf> {
        Some(suggested.to_path_buf())
    }

    fn report_io_error(&self, message: &str) {
        error!(message, "write failed");
    }
}
