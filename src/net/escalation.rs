//! Turns a failed exchange into a user decision.
//!
//! Only fire-and-forget dispatches reach this; the request state machine and
//! the blocking facade hand errors back to their callers. Certificate issues
//! never arrive here under the override policy, they are settled inside the
//! transport.

use std::sync::Arc;

use tracing::{error, info};

use super::constants::ESCALATION_TITLE;
use super::error::TransportError;
use crate::interaction::{EscalationChoice, Interaction, SettingsSection};

/// Presents failures through the host's [`Interaction`].
#[derive(Debug, Clone)]
pub struct ErrorEscalation {
    interaction: Arc<dyn Interaction>,
}

impl ErrorEscalation {
    pub fn new(interaction: Arc<dyn Interaction>) -> Self {
        Self { interaction }
    }

    /// Shows `failure` and blocks until the user answers. Opens the network
    /// settings when asked to. Nothing is retried.
    pub fn escalate(&self, failure: &TransportError) -> EscalationChoice {
        error!(
            kind = %failure.kind(),
            url = %failure.url(),
            message = %failure.message(),
            "network error"
        );
        let choice = self
            .interaction
            .confirm_network_error(ESCALATION_TITLE, failure.message());
        if choice == EscalationChoice::OpenNetworkSettings {
            info!("opening network settings");
            self.interaction.open_settings(SettingsSection::Network);
        }
        choice
    }
}
