//! Pluggable proxy selection, evaluated per request URL.
//!
//! The shared client is built once; the policy is consulted through
//! `reqwest::Proxy::custom` for every request, so replacing the policy behind
//! a [`SwitchableProxy`] takes effect on the next dispatch without rebuilding
//! the transport.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::Proxy;
use tracing::trace;
use url::Url;

/// Route chosen for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyChoice {
    Direct,
    Via(Url),
}

/// Chooses a proxy for a request URL.
pub trait ProxyPolicy: Send + Sync + fmt::Debug {
    fn proxy_for(&self, url: &Url) -> ProxyChoice;
}

/// Always connects directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProxy;

impl ProxyPolicy for NoProxy {
    fn proxy_for(&self, _url: &Url) -> ProxyChoice {
        ProxyChoice::Direct
    }
}

/// Routes every request through one proxy.
#[derive(Debug, Clone)]
pub struct FixedProxy {
    proxy: Url,
}

impl FixedProxy {
    #[must_use]
    pub fn new(proxy: Url) -> Self {
        Self { proxy }
    }
}

impl ProxyPolicy for FixedProxy {
    fn proxy_for(&self, _url: &Url) -> ProxyChoice {
        ProxyChoice::Via(self.proxy.clone())
    }
}

/// Follows the conventional proxy environment variables, read at request
/// time: `HTTPS_PROXY` / `HTTP_PROXY`, then `ALL_PROXY`, with `NO_PROXY`
/// exclusions.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentProxy;

impl ProxyPolicy for EnvironmentProxy {
    fn proxy_for(&self, url: &Url) -> ProxyChoice {
        let host = url.host_str().unwrap_or_default();
        if let Some(no_proxy) = find_first_var(&["NO_PROXY", "no_proxy"])
            && is_excluded(host, &no_proxy)
        {
            return ProxyChoice::Direct;
        }

        let names: &[&str] = match url.scheme() {
            "https" => &["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"],
            "http" => &["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"],
            _ => &["ALL_PROXY", "all_proxy"],
        };
        find_first_var(names)
            .and_then(|value| Url::parse(&value).ok())
            .map_or(ProxyChoice::Direct, ProxyChoice::Via)
    }
}

fn find_first_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

/// Matches `host` against a comma separated `NO_PROXY` list.
fn is_excluded(host: &str, no_proxy: &str) -> bool {
    no_proxy
        .split(',')
        .map(|entry| entry.trim().trim_start_matches('.'))
        .filter(|entry| !entry.is_empty())
        .any(|entry| {
            entry == "*"
                || host.eq_ignore_ascii_case(entry)
                || host
                    .to_ascii_lowercase()
                    .ends_with(&format!(".{}", entry.to_ascii_lowercase()))
        })
}

/// A policy that can be swapped at runtime, e.g. after the user edits the
/// network settings.
#[derive(Debug)]
pub struct SwitchableProxy {
    current: RwLock<Arc<dyn ProxyPolicy>>,
}

impl SwitchableProxy {
    pub fn new(initial: Arc<dyn ProxyPolicy>) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    /// Replaces the active policy. Requests dispatched afterwards use it.
    pub fn replace(&self, policy: Arc<dyn ProxyPolicy>) {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *current = policy;
    }
}

impl ProxyPolicy for SwitchableProxy {
    fn proxy_for(&self, url: &Url) -> ProxyChoice {
        let current = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        current.proxy_for(url)
    }
}

/// Adapts a policy into a reqwest proxy consulted on every request.
pub(crate) fn reqwest_proxy(policy: Arc<dyn ProxyPolicy>) -> Proxy {
    Proxy::custom(move |url| match policy.proxy_for(url) {
        ProxyChoice::Direct => None,
        ProxyChoice::Via(proxy) => {
            trace!(url = %url, proxy = %proxy, "routing through proxy");
            Some(proxy)
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn test_no_proxy_is_direct() {
        assert_eq!(
            NoProxy.proxy_for(&url("https://example.com/a")),
            ProxyChoice::Direct
        );
    }

    #[test]
    fn test_fixed_proxy_routes_everything() {
        let policy = FixedProxy::new(url("http://proxy.local:3128"));
        assert_eq!(
            policy.proxy_for(&url("https://example.com/a")),
            ProxyChoice::Via(url("http://proxy.local:3128"))
        );
    }

    #[test]
    fn test_switchable_proxy_takes_effect_immediately() {
        let switchable = SwitchableProxy::new(Arc::new(NoProxy));
        let target = url("https://example.com/a");
        assert_eq!(switchable.proxy_for(&target), ProxyChoice::Direct);

        switchable.replace(Arc::new(FixedProxy::new(url("http://proxy.local:8080"))));
        assert_eq!(
            switchable.proxy_for(&target),
            ProxyChoice::Via(url("http://proxy.local:8080"))
        );
    }

    #[test]
    fn test_no_proxy_list_matching() {
        assert!(is_excluded("example.com", "localhost, example.com"));
        assert!(is_excluded("api.example.com", ".example.com"));
        assert!(is_excluded("anything", "*"));
        assert!(!is_excluded("example.org", "example.com"));
        assert!(!is_excluded("badexample.com", "example.com"));
    }
}
