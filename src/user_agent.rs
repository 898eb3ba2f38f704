//! Default User-Agent for transport traffic.

/// Default User-Agent: crate name and version.
#[must_use]
pub fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("netmanager/{version}")
}
