//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod socket_guard;

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use netmanager_core::{EscalationChoice, Interaction, SettingsSection};

/// Records every prompt; acknowledges errors and accepts suggested paths.
#[derive(Debug, Default)]
pub struct RecordingInteraction {
    prompts: Mutex<Vec<(String, String)>>,
    opened: Mutex<Vec<SettingsSection>>,
    suggested: Mutex<Vec<PathBuf>>,
    io_errors: Mutex<Vec<String>>,
}

impl RecordingInteraction {
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn suggested_paths(&self) -> Vec<PathBuf> {
        self.suggested.lock().unwrap().clone()
    }

    pub fn io_errors(&self) -> Vec<String> {
        self.io_errors.lock().unwrap().clone()
    }
}

impl Interaction for RecordingInteraction {
    fn confirm_network_error(&self, title: &str, message: &str) -> EscalationChoice {
        self.prompts
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
        EscalationChoice::Acknowledged
    }

    fn open_settings(&self, section: SettingsSection) {
        self.opened.lock().unwrap().push(section);
    }

    fn choose_save_path(&self, suggested: &Path) -> Option<PathBuf> {
        self.suggested.lock().unwrap().push(suggested.to_path_buf());
        Some(suggested.to_path_buf())
    }

    fn report_io_error(&self, message: &str) {
        self.io_errors.lock().unwrap().push(message.to_string());
    }
}

/// Returns a localhost URL whose port is very likely closed.
pub fn closed_port_url(path: &str) -> String {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    format!("http://127.0.0.1:{port}{path}")
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
