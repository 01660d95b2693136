//! Resolves an inbound request to an [`UpstreamProfile`] from the
//! client's real IP and the listening port, with `*:port` wildcard
//! fallback. A pure function over the configured profile map so it is
//! unit-testable without a live server.

use docscan_common::{ProxyError, UpstreamProfile};
use std::collections::HashMap;

/// Header a trusting fronting proxy is expected to set with the real
/// client IP. Read case-insensitively, matching every other inbound
/// header lookup.
pub const REAL_IP_HEADER: &str = "x-real-ip";

const DEFAULT_PORT: &str = "443";

/// Extract the port from a `Host` header value (`host:port` or bare
/// `host`), defaulting to 443.
#[must_use]
pub fn port_from_host(host: &str) -> &str {
    host.rsplit_once(':').map_or(DEFAULT_PORT, |(_, port)| port)
}

/// Resolve `(real_ip, host)` to the configured upstream profile.
///
/// # Errors
///
/// Returns [`ProxyError::Routing`] when neither `"<real_ip>:<port>"` nor
/// `"*:<port>"` has a configured profile.
pub fn resolve<'a>(
    profiles: &'a HashMap<String, UpstreamProfile>,
    real_ip: &str,
    host: &str,
) -> Result<&'a UpstreamProfile, ProxyError> {
    let port = port_from_host(host);
    let client_key = format!("{real_ip}:{port}");
    let fallback_key = format!("*:{port}");

    profiles
        .get(&client_key)
        .or_else(|| profiles.get(&fallback_key))
        .ok_or(ProxyError::Routing {
            client: client_key,
            fallback: fallback_key,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn profile(konnektor: &str) -> UpstreamProfile {
        UpstreamProfile {
            konnektor: konnektor.to_string(),
            ssl_cert: None,
            ssl_key: None,
            ssl_verify: true,
            proxy_all_services: false,
        }
    }

    #[test]
    fn port_defaults_to_443_without_explicit_port() {
        assert_eq!(port_from_host("proxy.local"), "443");
        assert_eq!(port_from_host("proxy.local:8443"), "8443");
    }

    #[test]
    fn exact_client_match_wins_over_wildcard() {
        let mut profiles = HashMap::new();
        profiles.insert("10.0.0.1:8443".to_string(), profile("https://kon.example"));
        profiles.insert("*:8443".to_string(), profile("https://fallback.example"));

        let resolved = resolve(&profiles, "10.0.0.1", "proxy.local:8443").unwrap();
        assert_eq!(resolved.konnektor, "https://kon.example");
    }

    #[test]
    fn falls_back_to_wildcard_when_client_unknown() {
        let mut profiles = HashMap::new();
        profiles.insert("*:8443".to_string(), profile("https://fallback.example"));

        let resolved = resolve(&profiles, "10.0.0.9", "proxy.local:8443").unwrap();
        assert_eq!(resolved.konnektor, "https://fallback.example");
    }

    #[test]
    fn no_match_and_no_wildcard_is_a_routing_error() {
        let profiles: HashMap<String, UpstreamProfile> = HashMap::new();
        let err = resolve(&profiles, "10.0.0.9", "proxy.local:8443").unwrap_err();
        assert!(matches!(err, ProxyError::Routing { .. }));
    }
}
