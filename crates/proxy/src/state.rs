//! Process-wide immutable handle built once at startup and shared (via
//! `Arc`) across every request task.

use docscan_common::{GlobalPolicy, ProxyError, UpstreamProfile};
use docscan_replacements::ReplacementStore;
use docscan_scanner::Scanner;
use std::collections::HashMap;
use std::path::Path;

use crate::requester::Requester;

pub struct AppState {
    pub policy: GlobalPolicy,
    pub profiles: HashMap<String, UpstreamProfile>,
    pub scanner: Box<dyn Scanner>,
    pub replacements: ReplacementStore,
    pub requester: Requester,
}

impl AppState {
    /// Load the INI configuration, configure logging, build the scanner
    /// backend and the replacement store. Anything fallible here is a
    /// startup fatal.
    pub fn build(config_path: &Path, replacements_dir: &Path) -> Result<Self, ProxyError> {
        let parsed = docscan_config::load(config_path)
            .map_err(|e| ProxyError::Config(e.to_string()))?;

        docscan_config::logs::init(parsed.log_level, docscan_config::logs::Levels::new());

        let scanner = docscan_scanner::from_config(&parsed.policy.scanner);
        let replacements = ReplacementStore::load(replacements_dir)?;
        let requester = Requester::new()?;

        Ok(Self {
            policy: parsed.policy,
            profiles: parsed.profiles,
            scanner,
            replacements,
            requester,
        })
    }
}
