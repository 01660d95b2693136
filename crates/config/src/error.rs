//! Startup-time configuration errors. Every variant here is fatal: the
//! process logs it and exits non-zero before binding a listener.

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration file `{0}`: {1}")]
    Parse(std::path::PathBuf, ini::Error),

    #[error("configuration file `{0}` has no [config] section")]
    MissingConfigSection(std::path::PathBuf),

    #[error("exactly one of `clamd_socket` or `icap_host` must be set in [config]")]
    ScannerMisconfigured,

    #[error("client profile `{0}` is missing required key `Konnektor`")]
    MissingKonnektor(String),

    #[error("invalid value for `{key}` in section `{section}`: {value}")]
    InvalidValue {
        section: String,
        key: &'static str,
        value: String,
    },
}
