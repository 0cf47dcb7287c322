//! Configuration loader with hierarchical merging.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. Global config (`~/.twinguard/config.toml`)
//! 3. Explicit config file (`with_config_file`)
//! 4. Environment variables (`TWINGUARD_*`)
//!
//! Each layer overrides the previous.

use super::{default_config_path, ConfigError, TwinguardConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Helper macro for parsing numeric environment variables.
macro_rules! parse_env_num {
    ($field:expr, $var:literal, $ty:ty) => {
        if let Ok(val) = std::env::var($var) {
            $field = val.trim().parse::<$ty>().map_err(|_| {
                ConfigError::invalid_env_var($var, concat!("expected ", stringify!($ty)))
            })?;
        }
    };
}

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```ignore
/// use twinguard_runtime::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_config_file("/etc/twinguard/config.toml")
///     .skip_env_vars()  // For testing
///     .load()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Global config file path (defaults to ~/.twinguard/config.toml).
    global_config_path: Option<PathBuf>,

    /// Explicit config file, applied after the global one.
    config_file: Option<PathBuf>,

    /// Skip environment variable loading.
    skip_env: bool,

    /// Skip global config loading.
    skip_global: bool,
}

impl ConfigLoader {
    /// Creates a new loader with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom global config path.
    #[must_use]
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Sets an explicit config file layered over the global one.
    #[must_use]
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Skips environment variable loading.
    ///
    /// Useful for testing with deterministic config.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Skips global config loading.
    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.skip_global = true;
        self
    }

    /// Loads and merges configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any config file exists but cannot be parsed,
    /// or an environment variable holds an invalid value.
    /// Missing config files are silently ignored.
    pub fn load(&self) -> Result<TwinguardConfig, ConfigError> {
        let mut config = TwinguardConfig::default();

        if !self.skip_global {
            let global_path = self
                .global_config_path
                .clone()
                .unwrap_or_else(default_config_path);

            if let Some(global_config) = load_file(&global_path)? {
                debug!(path = %global_path.display(), "Loaded global config");
                config.merge(&global_config);
            }
        }

        if let Some(ref path) = self.config_file {
            if let Some(file_config) = load_file(path)? {
                debug!(path = %path.display(), "Loaded config file");
                config.merge(&file_config);
            }
        }

        if !self.skip_env {
            apply_env_vars(&mut config)?;
        }

        Ok(config)
    }
}

/// Loads a config file, returning None if it doesn't exist.
fn load_file(path: &Path) -> Result<Option<TwinguardConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

    let config =
        TwinguardConfig::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;

    Ok(Some(config))
}

/// Applies environment variable overrides.
fn apply_env_vars(config: &mut TwinguardConfig) -> Result<(), ConfigError> {
    parse_env_num!(config.enforcement.ask_timeout_ms, "TWINGUARD_ASK_TIMEOUT_MS", u64);
    parse_env_num!(config.cache.max_capacity, "TWINGUARD_CACHE_MAX_CAPACITY", u64);
    parse_env_num!(config.worker.mailbox_size, "TWINGUARD_WORKER_MAILBOX_SIZE", usize);
    parse_env_num!(
        config.worker.passivate_after_secs,
        "TWINGUARD_WORKER_PASSIVATE_AFTER_SECS",
        u64
    );

    if config.worker.mailbox_size == 0 {
        return Err(ConfigError::invalid_env_var(
            "TWINGUARD_WORKER_MAILBOX_SIZE",
            "must be greater than zero",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn load_defaults_only() {
        let config = ConfigLoader::new()
            .skip_global_config()
            .skip_env_vars()
            .load()
            .unwrap();

        assert_eq!(config, TwinguardConfig::default());
    }

    #[test]
    fn explicit_file_overrides_global() {
        let global_temp = TempDir::new().unwrap();
        let file_temp = TempDir::new().unwrap();

        let global_path = create_config_file(
            global_temp.path(),
            r#"
[enforcement]
ask_timeout_ms = 3000

[cache]
max_capacity = 50
"#,
        );
        let file_path = create_config_file(
            file_temp.path(),
            r#"
[enforcement]
ask_timeout_ms = 500
"#,
        );

        let config = ConfigLoader::new()
            .with_global_config(&global_path)
            .with_config_file(&file_path)
            .skip_env_vars()
            .load()
            .unwrap();

        // capacity from global (not overridden)
        assert_eq!(config.cache.max_capacity, 50);
        // timeout from explicit file
        assert_eq!(config.enforcement.ask_timeout_ms, 500);
    }

    #[test]
    fn missing_config_files_ok() {
        let config = ConfigLoader::new()
            .with_global_config("/nonexistent/path/config.toml")
            .with_config_file("/nonexistent/other.toml")
            .skip_env_vars()
            .load()
            .unwrap();

        assert_eq!(config, TwinguardConfig::default());
    }

    #[test]
    fn invalid_toml_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = create_config_file(temp.path(), "[enforcement\nask_timeout_ms = ");

        let err = ConfigLoader::new()
            .with_global_config(&path)
            .skip_env_vars()
            .load()
            .unwrap_err();

        assert!(matches!(err, ConfigError::ParseToml { .. }));
    }

    #[test]
    fn env_overrides_are_applied_and_validated() {
        // Single test touching process env to avoid cross-test races.
        std::env::set_var("TWINGUARD_ASK_TIMEOUT_MS", "1234");
        std::env::set_var("TWINGUARD_WORKER_MAILBOX_SIZE", "4");
        let config = ConfigLoader::new().skip_global_config().load().unwrap();
        assert_eq!(config.enforcement.ask_timeout_ms, 1234);
        assert_eq!(config.worker.mailbox_size, 4);

        std::env::set_var("TWINGUARD_ASK_TIMEOUT_MS", "soon");
        let err = ConfigLoader::new().skip_global_config().load().unwrap_err();
        assert!(err.to_string().contains("TWINGUARD_ASK_TIMEOUT_MS"));

        std::env::set_var("TWINGUARD_ASK_TIMEOUT_MS", "1234");
        std::env::set_var("TWINGUARD_WORKER_MAILBOX_SIZE", "0");
        let err = ConfigLoader::new().skip_global_config().load().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { .. }));

        std::env::remove_var("TWINGUARD_ASK_TIMEOUT_MS");
        std::env::remove_var("TWINGUARD_WORKER_MAILBOX_SIZE");
    }
}
