pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{
    DEFAULT_BASE_URL, EnvSnapshot, PollingSettings, ProviderConfig, RateLimitSettings, RetrySettings,
};

use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file directly
pub const CONFIG_PATH_ENV: &str = "AIPLANE_CONFIG_PATH";

const CANDIDATES: [&str; 2] = ["aiplane.local.yaml", "aiplane.yaml"];

/// aiplane's global configuration directory (`~/.config/aiplane`)
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("aiplane"))
}

/// Locate the configuration file.
///
/// Search order:
/// 1. `AIPLANE_CONFIG_PATH` (direct path)
/// 2. current directory: aiplane.local.yaml, aiplane.yaml
/// 3. `./.aiplane/config.yaml`
/// 4. `~/.config/aiplane/config.yaml` (global)
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points to missing file {}", CONFIG_PATH_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let local = current_dir.join(".aiplane").join("config.yaml");
    if local.exists() {
        return Ok(local);
    }

    if let Ok(config_dir) = get_config_dir() {
        let global_config = config_dir.join("config.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Load and validate a configuration file.
pub fn load_from(path: &Path) -> Result<ProviderConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = ProviderConfig::from_yaml(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Load the discovered configuration, or defaults when there is none.
pub fn load() -> Result<ProviderConfig> {
    match find_config_file() {
        Ok(path) => load_from(&path),
        Err(ConfigError::ConfigFileNotFound) => {
            tracing::debug!("No configuration file found, using defaults");
            Ok(ProviderConfig::default())
        }
        Err(e) => Err(e),
    }
}
