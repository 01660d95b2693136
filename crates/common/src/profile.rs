//! Per-client upstream configuration.

/// The upstream Konnektor and TLS identity to use for a given
/// `(source-IP, listening-port)` or `(*, listening-port)` key.
///
/// Constructed once at startup from the INI configuration and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamProfile {
    /// Base URL of the real Konnektor, e.g. `https://kon.example:443`.
    pub konnektor: String,
    /// Path to the client certificate used for mTLS, if configured.
    pub ssl_cert: Option<std::path::PathBuf>,
    /// Path to the client private key used for mTLS, if configured.
    pub ssl_key: Option<std::path::PathBuf>,
    /// Whether to verify the upstream's TLS certificate.
    pub ssl_verify: bool,
    /// Used only by the SDS rewriter: when set, every
    /// `ServiceInformation/Service//EndpointTLS` is rewritten, not just
    /// `PHRService`'s.
    pub proxy_all_services: bool,
}

impl UpstreamProfile {
    /// A client certificate and key are both required for mTLS; a
    /// profile with only one of the two is not usable as an identity.
    #[must_use]
    pub fn client_identity(&self) -> Option<(&std::path::Path, &std::path::Path)> {
        match (&self.ssl_cert, &self.ssl_key) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}
