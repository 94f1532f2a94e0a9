//! Config file discovery for the CLI

use std::path::{Path, PathBuf};

use kuba_burst::config::{Config, CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE};
use kuba_burst::error::ConfigError;

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// `--config` flag
    Flag(PathBuf),
    /// `BURST_CONFIG` environment variable
    Env(PathBuf),
    /// `./burst.toml`
    WorkingDir(PathBuf),
    /// Built-in defaults plus environment overrides
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Flag(path) => write!(f, "{} (--config)", path.display()),
            ConfigSource::Env(path) => write!(f, "{} ({})", path.display(), CONFIG_ENV_VAR),
            ConfigSource::WorkingDir(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => write!(f, "defaults"),
        }
    }
}

/// Pick the config source
///
/// Priority:
/// 1. `--config`
/// 2. `BURST_CONFIG` environment variable
/// 3. `./burst.toml` in the current directory
/// 4. Default configuration
pub fn resolve_source(flag: Option<&Path>) -> ConfigSource {
    if let Some(path) = flag {
        return ConfigSource::Flag(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return ConfigSource::Env(PathBuf::from(path));
    }
    let local = Path::new(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return ConfigSource::WorkingDir(local.to_path_buf());
    }
    ConfigSource::Defaults
}

/// Load the configuration from the resolved source
///
/// A named file that fails to load is an error; there is no silent fallback
/// to defaults.
pub fn load(flag: Option<&Path>) -> Result<(Config, ConfigSource), ConfigError> {
    let source = resolve_source(flag);
    let config = match &source {
        ConfigSource::Flag(path) | ConfigSource::Env(path) | ConfigSource::WorkingDir(path) => {
            Config::load(path)?
        }
        ConfigSource::Defaults => {
            let config = Config::from_env()?;
            config.validate()?;
            config
        }
    };
    Ok((config, source))
}
