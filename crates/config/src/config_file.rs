//! The `[config]` + per-client-profile INI document.
//!
//! ```ini
//! [config]
//! log_level = INFO
//! content_max = 800
//! remove_malicious = true
//! clamd_socket = /var/run/clamav/clamd.ctl
//!
//! [10.0.0.1:8443]
//! Konnektor = https://kon.example:443
//! ssl_cert = /etc/docscan-proxy/client.pem
//! ssl_key = /etc/docscan-proxy/client.key
//!
//! [*:8443]
//! Konnektor = https://fallback.example:443
//! ```

use docscan_common::{GlobalPolicy, UpstreamProfile};
use docscan_common::policy::ScannerConfig;
use std::collections::HashMap;

use crate::error::ConfigError;

/// Parsed configuration: process-wide policy plus every client profile
/// keyed by its section name (`"<ip>:<port>"` or `"*:<port>"`).
pub struct ParsedConfig {
    pub policy: GlobalPolicy,
    pub profiles: HashMap<String, UpstreamProfile>,
    pub log_level: tracing_subscriber::filter::LevelFilter,
}

/// Load and validate an INI document at `path`.
pub fn load(path: &std::path::Path) -> Result<ParsedConfig, ConfigError> {
    let ini = ::ini::Ini::load_from_file(path)
        .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;

    let config = ini
        .section(Some("config"))
        .ok_or_else(|| ConfigError::MissingConfigSection(path.to_path_buf()))?;

    let log_level = crate::logs::parse_level(config.get("log_level"));
    let content_max = parse_usize(config.get("content_max")).unwrap_or(800);
    let remove_malicious = parse_bool(config.get("remove_malicious"));
    let all_png_malicious = parse_bool(config.get("all_png_malicious"));
    let all_pdf_malicious = parse_bool(config.get("all_pdf_malicious"));

    let scanner = parse_scanner(config)?;

    let policy = GlobalPolicy {
        scanner,
        remove_malicious,
        all_png_malicious,
        all_pdf_malicious,
        content_max,
    };

    let mut profiles = HashMap::new();
    for (name, props) in ini.iter() {
        let Some(name) = name else { continue };
        if name == "config" {
            continue;
        }

        let konnektor = props
            .get("Konnektor")
            .ok_or_else(|| ConfigError::MissingKonnektor(name.to_string()))?
            .to_string();

        let profile = UpstreamProfile {
            konnektor,
            ssl_cert: props.get("ssl_cert").map(Into::into),
            ssl_key: props.get("ssl_key").map(Into::into),
            ssl_verify: props.get("ssl_verify").map_or(true, parse_bool_str),
            proxy_all_services: props.get("proxy_all_services").map_or(false, parse_bool_str),
        };

        profiles.insert(name.to_string(), profile);
    }

    Ok(ParsedConfig {
        policy,
        profiles,
        log_level,
    })
}

fn parse_scanner(config: &::ini::Properties) -> Result<ScannerConfig, ConfigError> {
    let clamd_socket = config.get("clamd_socket");
    let icap_host = config.get("icap_host");

    match (clamd_socket, icap_host) {
        (Some(socket), None) => Ok(ScannerConfig::ClamAv {
            socket: socket.into(),
        }),
        (None, Some(host)) => {
            let port = parse_usize(config.get("icap_port"))
                .ok_or_else(|| ConfigError::InvalidValue {
                    section: "config".to_string(),
                    key: "icap_port",
                    value: config.get("icap_port").unwrap_or_default().to_string(),
                })
                .and_then(|v| {
                    u16::try_from(v).map_err(|_| ConfigError::InvalidValue {
                        section: "config".to_string(),
                        key: "icap_port",
                        value: v.to_string(),
                    })
                })?;
            Ok(ScannerConfig::Icap {
                host: host.to_string(),
                port,
                service: config.get("icap_service").unwrap_or("avscan").to_string(),
                tls: config.get("icap_tls").map_or(false, parse_bool_str),
            })
        }
        _ => Err(ConfigError::ScannerMisconfigured),
    }
}

fn parse_bool(raw: Option<&str>) -> bool {
    raw.map_or(false, parse_bool_str)
}

fn parse_bool_str(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_usize(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::load;
    use docscan_common::policy::ScannerConfig;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_ini(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn rejects_both_scanners_configured() {
        let file = write_ini(
            "[config]\nclamd_socket = /run/clamd.ctl\nicap_host = scanner\nicap_port = 1344\n",
        );
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, super::ConfigError::ScannerMisconfigured));
    }

    #[test]
    fn rejects_neither_scanner_configured() {
        let file = write_ini("[config]\nlog_level = INFO\n");
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, super::ConfigError::ScannerMisconfigured));
    }

    #[test]
    fn parses_clamav_backend_and_client_profiles() {
        let file = write_ini(
            "[config]\n\
             clamd_socket = /run/clamd.ctl\n\
             remove_malicious = true\n\
             \n\
             [10.0.0.1:8443]\n\
             Konnektor = https://kon.example:443\n\
             \n\
             [*:8443]\n\
             Konnektor = https://fallback.example:443\n",
        );
        let parsed = load(file.path()).unwrap();
        assert_eq!(
            parsed.policy.scanner,
            ScannerConfig::ClamAv {
                socket: "/run/clamd.ctl".into()
            }
        );
        assert!(parsed.policy.remove_malicious);
        assert_eq!(parsed.profiles.len(), 2);
        assert_eq!(
            parsed.profiles["*:8443"].konnektor,
            "https://fallback.example:443"
        );
    }

    #[test]
    fn missing_konnektor_is_fatal() {
        let file = write_ini(
            "[config]\nclamd_socket = /run/clamd.ctl\n\n[10.0.0.1:8443]\nssl_verify = true\n",
        );
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, super::ConfigError::MissingKonnektor(_)));
    }
}
