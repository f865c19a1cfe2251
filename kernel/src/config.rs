//! Kernel configuration
//!
//! Loaded from TOML; every field has a default, so an empty document is a
//! valid configuration.
//!
//! ```toml
//! [memory]
//! total_bytes = 1048576
//! page_size = 4096
//!
//! [scheduler]
//! quantum_ms = 100
//! grace_period_ms = 1000
//! policy = "round-robin"   # or "priority"
//!
//! [interrupts]
//! enabled = true
//!
//! [fs]
//! seed = true
//! sync_env = "SYNC_DIRS"
//! overlays = ["/srv/share:/mnt/share"]
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{KernelError, Result};
use crate::memory::{DEFAULT_PAGE_SIZE, DEFAULT_TOTAL_BYTES};
use crate::scheduler::SchedulingPolicy;
use edukern_vfs::OverlayMapping;

/// Environment variable read for overlays unless configured otherwise
pub const DEFAULT_SYNC_ENV: &str = "SYNC_DIRS";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KernelConfig {
    pub memory: MemoryConfig,
    pub scheduler: SchedulerConfig,
    pub interrupts: InterruptConfig,
    pub fs: FsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    pub total_bytes: usize,
    pub page_size: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            total_bytes: DEFAULT_TOTAL_BYTES,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Tick period
    pub quantum_ms: u64,
    /// How long terminated records stay visible
    pub grace_period_ms: u64,
    pub policy: SchedulingPolicy,
    /// Start the periodic timer at boot
    pub autostart: bool,
    /// Spawn `init` at boot
    pub spawn_init: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            quantum_ms: 100,
            grace_period_ms: 1000,
            policy: SchedulingPolicy::RoundRobin,
            autostart: true,
            spawn_init: true,
        }
    }
}

impl SchedulerConfig {
    pub fn quantum(&self) -> Duration {
        Duration::from_millis(self.quantum_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterruptConfig {
    pub enabled: bool,
}

impl Default for InterruptConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FsConfig {
    /// Create the standard directories and seed files at mount
    pub seed: bool,
    /// Environment variable holding `host:virtual` overlay pairs
    pub sync_env: Option<String>,
    /// Overlay pairs, `host:virtual`
    pub overlays: Vec<String>,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            seed: true,
            sync_env: Some(DEFAULT_SYNC_ENV.to_string()),
            overlays: Vec::new(),
        }
    }
}

impl KernelConfig {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// `Config` on a syntax error, unknown key or invalid value
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: KernelConfig =
            toml::from_str(text).map_err(|e| KernelError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// `Io` if the file cannot be read, `Config` if it is invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        log::debug!("[config] loading {}", path.display());
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.memory.page_size == 0 {
            return Err(KernelError::Config("memory.page_size must be positive".into()));
        }
        if self.memory.total_bytes < self.memory.page_size {
            return Err(KernelError::Config(
                "memory.total_bytes must hold at least one page".into(),
            ));
        }
        if self.scheduler.quantum_ms == 0 {
            return Err(KernelError::Config("scheduler.quantum_ms must be positive".into()));
        }
        if let Some(bad) = self
            .fs
            .overlays
            .iter()
            .find(|pair| OverlayMapping::parse(pair).is_none())
        {
            return Err(KernelError::Config(format!(
                "fs.overlays: '{}' is not a host:virtual pair",
                bad
            )));
        }
        Ok(())
    }

    /// Overlays to register at boot: configured pairs, then the environment
    pub fn overlay_mappings(&self) -> Vec<OverlayMapping> {
        let mut mappings: Vec<OverlayMapping> = self
            .fs
            .overlays
            .iter()
            .filter_map(|pair| OverlayMapping::parse(pair))
            .collect();

        if let Some(var) = &self.fs.sync_env {
            if let Ok(list) = std::env::var(var) {
                mappings.extend(OverlayMapping::parse_list(&list));
            }
        }
        mappings
    }
}
