//! Configuration management for TokenScope
//!
//! Handles persistent settings: the initial detection policy, scan cadence,
//! feed queue depth and where the collection mirror lives.
//! Supports Windows, macOS, and Linux.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::detection::{Policy, PolicySettings};
use crate::store::{FileMirror, MemoryMirror, MirrorStore};

/// Where the collection mirror is kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorSettings {
    /// Mirror to a file; when off the mirror stays in memory
    pub enabled: bool,
    /// Mirror file; defaults to a per-process file in the temp dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Policy applied when a session starts
    #[serde(default)]
    pub policy: PolicySettings,
    /// Seconds between background scans; 0 disables them
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
    /// Scan once as soon as the scan agent starts
    #[serde(default = "default_true")]
    pub scan_on_start: bool,
    /// Depth of the bounded event queue
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
    #[serde(default)]
    pub mirror: MirrorSettings,
}

fn default_scan_interval() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_feed_capacity() -> usize {
    256
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            policy: PolicySettings::default(),
            scan_interval_secs: default_scan_interval(),
            scan_on_start: true,
            feed_capacity: default_feed_capacity(),
            mirror: MirrorSettings::default(),
        }
    }
}

impl AppConfig {
    /// Gets the config directory path (cross-platform)
    fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA")
                .ok()
                .map(|p| PathBuf::from(p).join("TokenScope"))
        }

        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|p| PathBuf::from(p).join("Library/Application Support/TokenScope"))
        }

        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| std::env::var("HOME").ok().map(|p| PathBuf::from(p).join(".config")))
                .map(|p| p.join("tokenscope"))
        }

        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }

    /// Gets the config file path
    pub fn config_path() -> Option<PathBuf> {
        Some(Self::config_dir()?.join("config.json"))
    }

    /// Loads configuration from the platform config dir
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Loads configuration from `path`, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring unreadable config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Saves configuration to the platform config dir
    pub fn save(&self) -> Result<(), String> {
        let path = Self::config_path().ok_or("Could not determine config path")?;
        self.save_to(&path)
    }

    /// Saves configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config dir: {}", e))?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))?;
        Ok(())
    }

    /// Validated initial policy
    ///
    /// Stored settings that fail validation fall back to the default policy.
    pub fn policy(&self) -> Policy {
        Policy::try_from(self.policy.clone()).unwrap_or_else(|e| {
            tracing::warn!("Invalid stored policy ({}), using default", e);
            Policy::default()
        })
    }

    /// Builds the mirror store these settings describe
    pub fn mirror_store(&self) -> Arc<dyn MirrorStore> {
        if !self.mirror.enabled {
            return Arc::new(MemoryMirror::new());
        }
        match &self.mirror.path {
            Some(path) => Arc::new(FileMirror::new(path)),
            None => Arc::new(FileMirror::session_scoped()),
        }
    }
}
