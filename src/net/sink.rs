//! Persisting completed response bodies to disk.
//!
//! Two targets: a user-chosen destination (interactive save) and a fixed
//! scratch file that is overwritten on every use.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::{SCRATCH_DIR_NAME, SCRATCH_FILE_NAME, WRITE_ERROR_MESSAGE};
use super::error::SinkError;
use super::transport::Response;
use crate::interaction::Interaction;

const FALLBACK_FILENAME: &str = "download.bin";

/// Writes response bodies to the scratch file or a user-chosen path.
#[derive(Debug, Clone)]
pub struct FileSink {
    interaction: Arc<dyn Interaction>,
    scratch_dir: PathBuf,
    save_dir: PathBuf,
}

impl FileSink {
    /// Sink with the scratch file under the system temp dir and save
    /// suggestions in the user's home directory.
    pub fn new(interaction: Arc<dyn Interaction>) -> Self {
        Self {
            interaction,
            scratch_dir: std::env::temp_dir().join(SCRATCH_DIR_NAME),
            save_dir: home_dir(),
        }
    }

    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Directory the interactive save suggests by default.
    #[must_use]
    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = dir.into();
        self
    }

    /// Path of the scratch file. Fixed for the lifetime of the sink.
    #[must_use]
    pub fn scratch_path(&self) -> PathBuf {
        self.scratch_dir.join(SCRATCH_FILE_NAME)
    }

    /// Writes `body` to the scratch file, replacing any previous content.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the directory cannot be created or the file
    /// cannot be written.
    #[instrument(level = "debug", skip(self, body), fields(bytes = body.len()))]
    pub fn save_scratch(&self, body: &[u8]) -> Result<PathBuf, SinkError> {
        fs::create_dir_all(&self.scratch_dir).map_err(|e| SinkError::io(&self.scratch_dir, e))?;
        let path = self.scratch_path();
        write_truncating(&path, body)?;
        debug!(path = %path.display(), "scratch file written");
        Ok(path)
    }

    /// Asks for a destination and writes the whole body there.
    ///
    /// Returns `Ok(None)` when the user cancels. Write failures are reported
    /// to the user with a generic message before being returned.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the destination cannot be opened or written.
    #[instrument(level = "debug", skip(self, response), fields(url = %response.url))]
    pub fn save_interactive(&self, response: &Response) -> Result<Option<PathBuf>, SinkError> {
        let suggested = self.save_dir.join(suggested_filename(&response.url));
        let Some(destination) = self.interaction.choose_save_path(&suggested) else {
            debug!("save cancelled");
            return Ok(None);
        };

        match write_truncating(&destination, &response.body) {
            Ok(()) => {
                info!(
                    path = %destination.display(),
                    bytes = response.body.len(),
                    "response saved"
                );
                Ok(Some(destination))
            }
            Err(error) => {
                warn!(error = %error, "save failed");
                self.interaction.report_io_error(WRITE_ERROR_MESSAGE);
                Err(error)
            }
        }
    }
}

fn write_truncating(path: &Path, body: &[u8]) -> Result<(), SinkError> {
    let mut file = File::create(path).map_err(|e| SinkError::io(path, e))?;
    file.write_all(body).map_err(|e| SinkError::io(path, e))?;
    file.flush().map_err(|e| SinkError::io(path, e))
}

fn home_dir() -> PathBuf {
    ["HOME", "USERPROFILE"]
        .iter()
        .find_map(|name| std::env::var_os(name).filter(|value| !value.is_empty()))
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
}

/// Default file name for a URL: the last non-empty path segment,
/// percent-decoded. Query and fragment are ignored.
#[must_use]
pub fn suggested_filename(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|segment| !segment.is_empty()));

    if let Some(last) = segment {
        let decoded = urlencoding::decode(last).unwrap_or_else(|e| {
            debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
            last.into()
        });
        let cleaned = sanitize(&decoded);
        if !cleaned.is_empty() {
            return cleaned;
        }
    }

    url.host_str()
        .map(sanitize)
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

/// Replaces path separators and control characters so the name stays a
/// single component.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.trim() {
        "." | ".." => String::new(),
        trimmed => trimmed.to_string(),
    }
}
