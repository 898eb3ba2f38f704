//! Certificate validation failures and the policy applied to them.
//!
//! The transport never sees individual verifier callbacks; it sees a failed
//! handshake. Each message in the error's source chain is classified into a
//! [`CertificateIssue`], and [`CertificatePolicy::review`] decides whether the
//! exchange proceeds. Under the default `OverrideAndLog` policy every issue is
//! logged and the exchange is re-established with verification relaxed.

use std::fmt;

use serde::Serialize;
use tracing::warn;

/// One failed certificate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateIssue {
    UntrustedIssuer,
    SelfSigned,
    HostnameMismatch,
    Expired,
    NotYetValid,
    Revoked,
    InvalidSignature,
    /// A certificate failure that does not match a known check.
    Other,
}

impl CertificateIssue {
    /// Classifies one error message. Returns `None` for non-certificate text.
    #[must_use]
    pub fn classify(message: &str) -> Option<Self> {
        let lowered = message.to_lowercase();
        let has = |needle: &str| lowered.contains(needle);

        if has("self signed") || has("self-signed") || has("selfsigned") {
            Some(Self::SelfSigned)
        } else if has("unknownissuer")
            || has("unknown issuer")
            || has("unable to get local issuer")
            || has("unknown ca")
            || has("untrusted")
        {
            Some(Self::UntrustedIssuer)
        } else if has("notvalidforname")
            || has("not valid for name")
            || has("hostname mismatch")
            || has("name mismatch")
        {
            Some(Self::HostnameMismatch)
        } else if has("notvalidyet") || has("not yet valid") {
            Some(Self::NotYetValid)
        } else if has("expired") {
            Some(Self::Expired)
        } else if has("revoked") {
            Some(Self::Revoked)
        } else if has("badsignature") || has("bad signature") || has("invalid signature") {
            Some(Self::InvalidSignature)
        } else if has("certificate") {
            Some(Self::Other)
        } else {
            None
        }
    }
}

impl fmt::Display for CertificateIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UntrustedIssuer => "untrusted issuer",
            Self::SelfSigned => "self-signed certificate",
            Self::HostnameMismatch => "hostname mismatch",
            Self::Expired => "certificate expired",
            Self::NotYetValid => "certificate not yet valid",
            Self::Revoked => "certificate revoked",
            Self::InvalidSignature => "invalid signature",
            Self::Other => "certificate rejected",
        };
        f.write_str(text)
    }
}

/// Collects the distinct certificate issues found in the sources of `error`.
///
/// The top-level message is skipped: reqwest renders the request URL into
/// it, and a URL is not evidence of a failed handshake. `Other` is only
/// reported when nothing more specific was found.
pub(crate) fn certificate_issues(error: &(dyn std::error::Error + 'static)) -> Vec<CertificateIssue> {
    let mut issues = Vec::new();
    let mut current = error.source();
    while let Some(err) = current {
        if let Some(issue) = CertificateIssue::classify(&err.to_string())
            && !issues.contains(&issue)
        {
            issues.push(issue);
        }
        current = err.source();
    }
    if issues.len() > 1 {
        issues.retain(|issue| *issue != CertificateIssue::Other);
    }
    issues
}

/// What the transport does when a handshake fails certificate validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificatePolicy {
    /// Log each failed check, then let the exchange proceed.
    #[default]
    OverrideAndLog,
    /// Fail the exchange with `NetworkErrorKind::Certificate`.
    Strict,
}

/// Result of reviewing a certificate failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateDecision {
    /// Proceed; carries the overridden issues.
    Override(Vec<CertificateIssue>),
    Reject,
}

impl CertificatePolicy {
    /// Decides whether an exchange with `issues` may proceed, logging each
    /// overridden issue.
    pub fn review(self, url: &str, issues: &[CertificateIssue]) -> CertificateDecision {
        match self {
            Self::Strict => CertificateDecision::Reject,
            Self::OverrideAndLog => {
                for issue in issues {
                    warn!(url = %url, issue = %issue, "overriding certificate validation failure");
                }
                CertificateDecision::Override(issues.to_vec())
            }
        }
    }

    /// Parses a config label (`override` or `strict`).
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "override" => Some(Self::OverrideAndLog),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}
