//! Process-wide immutable configuration values derived from the INI file.

/// Which scanner backend is active, and the parameters needed to reach
/// it. Exactly one variant is constructed by `docscan-config`; configuring
/// both or neither is a startup fatal (see `ProxyError::Config`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannerConfig {
    /// ClamAV INSTREAM over a Unix domain socket.
    ClamAv {
        /// Path to the `clamd` Unix socket.
        socket: std::path::PathBuf,
    },
    /// ICAP RESPMOD over TCP, optionally behind TLS.
    Icap {
        /// ICAP server host.
        host: String,
        /// ICAP server port.
        port: u16,
        /// ICAP service path, e.g. `avscan`.
        service: String,
        /// Whether to negotiate TLS before speaking ICAP.
        tls: bool,
    },
}

/// Process-wide immutable values derived from the `[config]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalPolicy {
    /// Active scanner backend and its connection parameters.
    pub scanner: ScannerConfig,
    /// Remove infected documents instead of replacing them in place.
    pub remove_malicious: bool,
    /// Test override: treat every PNG attachment as infected regardless
    /// of the scanner's verdict.
    pub all_png_malicious: bool,
    /// Test override: treat every PDF attachment as infected regardless
    /// of the scanner's verdict.
    pub all_pdf_malicious: bool,
    /// Maximum number of bytes of a body to include in a debug log line.
    pub content_max: usize,
}
