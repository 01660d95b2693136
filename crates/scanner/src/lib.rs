//! The scanner abstraction: a `{Scan, Ping}` capability with two
//! interchangeable backends, selected once at startup from
//! [`docscan_common::policy::ScannerConfig`].

pub mod clamav;
pub mod icap;

use docscan_common::{ProxyError, ScanVerdict};

/// A scanning backend. Implementations own no long-lived connection:
/// each call opens, uses and tears down its own socket so the protocol
/// state machine never has to be shared across requests.
#[async_trait::async_trait]
pub trait Scanner: Send + Sync {
    /// Scan `bytes` and report the verdict.
    async fn scan(&self, bytes: &[u8]) -> Result<ScanVerdict, ProxyError>;

    /// Liveness probe used by the `/health` endpoint.
    async fn ping(&self) -> Result<(), ProxyError>;
}

/// Build the configured backend from policy.
#[must_use]
pub fn from_config(config: &docscan_common::policy::ScannerConfig) -> Box<dyn Scanner> {
    match config {
        docscan_common::policy::ScannerConfig::ClamAv { socket } => {
            Box::new(clamav::ClamAv::new(socket.clone()))
        }
        docscan_common::policy::ScannerConfig::Icap {
            host,
            port,
            service,
            tls,
        } => Box::new(icap::Icap::new(host.clone(), *port, service.clone(), *tls)),
    }
}
