//! Logging setup: an `EnvFilter`-less `Targets` filter driven by the
//! `[config] log_level` key, over a plain `fmt` layer.
//!
//! The teacher dispatches log records to an AMQP broker via
//! `tracing-amqp`; this proxy has no broker, so the same
//! `Targets`-filtered-layer shape is kept with a console `fmt` layer in
//! its place.

use tracing_subscriber::prelude::*;

/// Per-module log level overrides layered on top of `default_level`.
pub type Levels = std::collections::HashMap<String, tracing_subscriber::filter::LevelFilter>;

/// Install the global tracing subscriber. Must be called at most once per
/// process, before the first log line.
pub fn init(default_level: tracing_subscriber::filter::LevelFilter, levels: Levels) {
    let filter = tracing_subscriber::filter::Targets::new()
        .with_targets(levels)
        .with_default(default_level);

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true).with_filter(filter))
        .init();
}

/// Parse a `log_level` INI value into a `LevelFilter`, defaulting to
/// `ERROR` as the reference implementation does.
#[must_use]
pub fn parse_level(raw: Option<&str>) -> tracing_subscriber::filter::LevelFilter {
    raw.and_then(|s| s.parse().ok())
        .unwrap_or(tracing_subscriber::filter::LevelFilter::ERROR)
}

#[cfg(test)]
mod tests {
    use super::parse_level;
    use pretty_assertions::assert_eq;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn defaults_to_error() {
        assert_eq!(parse_level(None), LevelFilter::ERROR);
        assert_eq!(parse_level(Some("not-a-level")), LevelFilter::ERROR);
    }

    #[test]
    fn parses_known_levels() {
        assert_eq!(parse_level(Some("DEBUG")), LevelFilter::DEBUG);
        assert_eq!(parse_level(Some("info")), LevelFilter::INFO);
    }
}
