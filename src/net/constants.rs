//! Fixed values for the network layer (wire headers, ceilings, scratch path).

use std::time::Duration;

/// Media type sent with every POST body (serialized RPC payload).
pub const RPC_CONTENT_TYPE: &str = "application/x-thrift";

/// Largest body `BlockingClient::fetch_to_buffer` accepts (inclusive).
pub const MAX_BUFFERED_RESPONSE_BYTES: u64 = 5_000_000;

/// Directory under the system temp dir holding the scratch file.
pub const SCRATCH_DIR_NAME: &str = "qEvernote";

/// Scratch file name, overwritten on every scratch save.
pub const SCRATCH_FILE_NAME: &str = "tmp.dat";

/// Default TCP connect timeout. No overall exchange timeout is applied by default.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Generic message shown when a save destination cannot be written.
pub const WRITE_ERROR_MESSAGE: &str = "An error occurred when writing to the file.";

/// Title of the escalation prompt.
pub const ESCALATION_TITLE: &str = "Network Error...";
