//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure.
///
/// This is the unified configuration after merging all layers.
///
/// # Example
///
/// ```
/// use twinguard_runtime::config::TwinguardConfig;
///
/// let config = TwinguardConfig::default();
/// assert_eq!(config.enforcement.ask_timeout_ms, 10_000);
/// assert_eq!(config.enforcement.always_visible_fields, vec!["thingId".to_string()]);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TwinguardConfig {
    /// Authorization and response settings.
    pub enforcement: EnforcementConfig,

    /// Enforcer cache bounds.
    pub cache: CacheConfig,

    /// Per-thing worker settings.
    pub worker: WorkerConfig,
}

impl TwinguardConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deserializes from TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Merges another config into this one.
    ///
    /// Values from `other` override values in `self` only if they
    /// differ from the default. This enables layered configuration.
    pub fn merge(&mut self, other: &Self) {
        self.enforcement.merge(&other.enforcement);
        self.cache.merge(&other.cache);
        self.worker.merge(&other.worker);
    }
}

/// Authorization and response settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EnforcementConfig {
    /// How long to wait for the persistence worker (milliseconds).
    pub ask_timeout_ms: u64,

    /// Top-level fields present in every filtered view.
    pub always_visible_fields: Vec<String>,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            ask_timeout_ms: 10_000,
            always_visible_fields: vec!["thingId".into()],
        }
    }
}

impl EnforcementConfig {
    /// Returns the ask timeout as a [`Duration`].
    #[must_use]
    pub fn ask_timeout(&self) -> Duration {
        Duration::from_millis(self.ask_timeout_ms)
    }

    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.ask_timeout_ms != default.ask_timeout_ms {
            self.ask_timeout_ms = other.ask_timeout_ms;
        }
        if other.always_visible_fields != default.always_visible_fields {
            self.always_visible_fields = other.always_visible_fields.clone();
        }
    }
}

/// Enforcer cache bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries per cache level.
    pub max_capacity: u64,

    /// Entries are dropped this long after being loaded (seconds).
    pub expire_after_write_secs: u64,

    /// Entries are dropped after not being read for this long (seconds).
    pub expire_after_access_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            expire_after_write_secs: 900,
            expire_after_access_secs: 300,
        }
    }
}

impl CacheConfig {
    /// Returns the write expiry as a [`Duration`].
    #[must_use]
    pub fn expire_after_write(&self) -> Duration {
        Duration::from_secs(self.expire_after_write_secs)
    }

    /// Returns the access expiry as a [`Duration`].
    #[must_use]
    pub fn expire_after_access(&self) -> Duration {
        Duration::from_secs(self.expire_after_access_secs)
    }

    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.max_capacity != default.max_capacity {
            self.max_capacity = other.max_capacity;
        }
        if other.expire_after_write_secs != default.expire_after_write_secs {
            self.expire_after_write_secs = other.expire_after_write_secs;
        }
        if other.expire_after_access_secs != default.expire_after_access_secs {
            self.expire_after_access_secs = other.expire_after_access_secs;
        }
    }
}

/// Per-thing worker settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Capacity of each worker's mailbox.
    pub mailbox_size: usize,

    /// Idle time after which a worker stops (seconds).
    pub passivate_after_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            mailbox_size: 64,
            passivate_after_secs: 120,
        }
    }
}

impl WorkerConfig {
    /// Returns the idle timeout as a [`Duration`].
    #[must_use]
    pub fn passivate_after(&self) -> Duration {
        Duration::from_secs(self.passivate_after_secs)
    }

    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.mailbox_size != default.mailbox_size {
            self.mailbox_size = other.mailbox_size;
        }
        if other.passivate_after_secs != default.passivate_after_secs {
            self.passivate_after_secs = other.passivate_after_secs;
        }
    }
}
