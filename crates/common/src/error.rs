//! Crate-wide error type.
//!
//! Every fallible operation in the proxy eventually surfaces as one of
//! these variants; `docscan-proxy` is the only place that turns a
//! `ProxyError` into an HTTP status code.

/// Errors raised anywhere in the proxy.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Raised at startup: mutually exclusive or missing scanner
    /// configuration, or a missing `text/plain` replacement fallback.
    #[error("configuration error: {0}")]
    Config(String),

    /// The inbound request has no matching client profile and no
    /// wildcard profile for its port.
    #[error("no upstream profile for client {client:?} or fallback {fallback:?}")]
    Routing {
        /// `"<ip>:<port>"` key that was looked up.
        client: String,
        /// `"*:<port>"` fallback key that was also missing.
        fallback: String,
    },

    /// Transport, TLS, or timeout failure talking to the Konnektor.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// The scanner backend is unreachable or violated its wire protocol.
    #[error("scanner error: {0}")]
    Scan(String),

    /// Malformed MIME or XML in an upstream response that required a
    /// rewrite.
    #[error("failed to parse upstream response: {0}")]
    Parse(String),

    /// The EICAR signature was detected in the outbound body after a
    /// rewrite was supposed to have removed it.
    #[error("policy violation: EICAR signature present in rewritten body")]
    PolicyViolation,
}
