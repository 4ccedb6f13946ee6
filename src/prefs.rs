//! Saved defaults.
//!
//! Optional per-user defaults live in ~/.config/rping/config.toml:
//!
//! ```toml
//! count = 10
//! ttl = 128
//! timeout = 1.5
//! interval = 0.5
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::wait_from_secs;

/// User preferences (each field overrides the built-in default)
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prefs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u8>,
    /// Reply timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    /// Pause between probes in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<f64>,
}

impl Prefs {
    /// Get config file path: ~/.config/rping/config.toml
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("rping").join("config.toml"))
    }

    /// Load preferences from disk (returns default if missing/invalid)
    pub fn load() -> Self {
        Self::path()
            .map(|p| Self::load_from(&p))
            .unwrap_or_default()
    }

    /// Load preferences from a specific file
    pub fn load_from(path: &Path) -> Self {
        let Ok(contents) = fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str::<Self>(&contents) {
            Ok(prefs) => prefs.sanitized(),
            Err(e) => {
                debug!("Ignoring invalid preferences in {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Drop values that would fail argument validation
    fn sanitized(mut self) -> Self {
        if self.count == Some(0) {
            self.count = None;
        }
        if self.ttl == Some(0) {
            self.ttl = None;
        }
        if self
            .timeout
            .is_some_and(|t| !wait_from_secs(t).is_some_and(|t| !t.is_zero()))
        {
            self.timeout = None;
        }
        if self.interval.is_some_and(|i| wait_from_secs(i).is_none()) {
            self.interval = None;
        }
        self
    }
}
