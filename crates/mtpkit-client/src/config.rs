//! Client configuration.

use std::path::PathBuf;

/// Everything the client needs from the environment.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Explicit `vid:pid` device selector; first matching device otherwise.
    pub device_selector: Option<String>,
    /// Path to the MTPZ key bundle; `$HOME/.mtpz-data` when unset.
    pub mtpz_bundle: Option<PathBuf>,
    /// Log filter directive (`info`, `mtpkit_ptp=trace`, ...).
    pub log_filter: Option<String>,
}

impl ClientConfig {
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.device_selector = Some(selector.into());
        self
    }

    pub fn with_mtpz_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.mtpz_bundle = Some(path.into());
        self
    }
}
