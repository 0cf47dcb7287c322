//! Configuration management with hierarchical layering.
//!
//! # Architecture
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌──────────────────────────────────────────────┐
//! │  1. Environment Variables (TWINGUARD_*)      │  Runtime override
//! ├──────────────────────────────────────────────┤
//! │  2. Explicit config file                    │  Deployment-specific
//! ├──────────────────────────────────────────────┤
//! │  3. Global Config (~/.twinguard/config.toml) │  User defaults
//! ├──────────────────────────────────────────────┤
//! │  4. Default Values (compile-time)            │  Fallback
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `TWINGUARD_ASK_TIMEOUT_MS` | `enforcement.ask_timeout_ms` | u64 |
//! | `TWINGUARD_CACHE_MAX_CAPACITY` | `cache.max_capacity` | u64 |
//! | `TWINGUARD_WORKER_MAILBOX_SIZE` | `worker.mailbox_size` | usize (> 0) |
//! | `TWINGUARD_WORKER_PASSIVATE_AFTER_SECS` | `worker.passivate_after_secs` | u64 |
//!
//! # Example Configuration
//!
//! ```toml
//! # ~/.twinguard/config.toml
//!
//! [enforcement]
//! ask_timeout_ms = 10000
//! always_visible_fields = ["thingId"]
//!
//! [cache]
//! max_capacity = 10000
//! expire_after_write_secs = 900
//! expire_after_access_secs = 300
//!
//! [worker]
//! mailbox_size = 64
//! passivate_after_secs = 120
//! ```

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::{CacheConfig, EnforcementConfig, TwinguardConfig, WorkerConfig};

/// Default global config directory.
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".twinguard")
}

/// Default global config file path.
pub fn default_config_path() -> std::path::PathBuf {
    default_config_dir().join("config.toml")
}
