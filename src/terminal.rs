//! Terminal implementation of the host interaction boundary.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use netmanager_core::{EscalationChoice, Interaction, SettingsSection};
use tracing::debug;

/// Prompts on stderr and reads answers from stdin.
///
/// Without a terminal on stdin every prompt takes its default: errors are
/// acknowledged and the suggested save path is used.
#[derive(Debug)]
pub struct TerminalInteraction {
    assume_yes: bool,
    config_path: Option<PathBuf>,
}

impl TerminalInteraction {
    pub fn new(assume_yes: bool, config_path: Option<PathBuf>) -> Self {
        Self {
            assume_yes,
            config_path,
        }
    }

    fn interactive(&self) -> bool {
        !self.assume_yes && io::stdin().is_terminal()
    }
}

fn ask(prompt: &str) -> Option<String> {
    let mut stderr = io::stderr().lock();
    let _ = write!(stderr, "{prompt}");
    let _ = stderr.flush();
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

impl Interaction for TerminalInteraction {
    fn confirm_network_error(&self, title: &str, message: &str) -> EscalationChoice {
        eprintln!("{title}\n{message}");
        if !self.interactive() {
            return EscalationChoice::Acknowledged;
        }
        match ask("Open network settings? [y/N] ").as_deref() {
            Some("y" | "Y" | "yes") => EscalationChoice::OpenNetworkSettings,
            _ => EscalationChoice::Acknowledged,
        }
    }

    fn open_settings(&self, section: SettingsSection) {
        match &self.config_path {
            Some(path) => eprintln!(
                "{section} settings live in {} (keys: proxy, connect_timeout_secs, timeout_secs, certificate_policy)",
                path.display()
            ),
            None => eprintln!("{section} settings: set XDG_CONFIG_HOME or HOME to use a config file"),
        }
    }

    fn choose_save_path(&self, suggested: &Path) -> Option<PathBuf> {
        if !self.interactive() {
            debug!(path = %suggested.display(), "using suggested save path");
            return Some(suggested.to_path_buf());
        }
        let answer = ask(&format!(
            "Save to [{}] (enter to accept, '-' to cancel): ",
            suggested.display()
        ))?;
        match answer.as_str() {
            "" => Some(suggested.to_path_buf()),
            "-" => None,
            other => Some(PathBuf::from(other)),
        }
    }

    fn report_io_error(&self, message: &str) {
        eprintln!("I/O Error: {message}");
    }
}
