use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ReleaseToolError, Result};
use crate::oci::{Credentials, RegistryOptions};

const CONFIG_FILE_NAME: &str = "release-tool.toml";

pub const USERNAME_ENV: &str = "RELEASE_TOOL_REGISTRY_USERNAME";
pub const PASSWORD_ENV: &str = "RELEASE_TOOL_REGISTRY_PASSWORD";

/// Represents the complete configuration for release-tool.
///
/// Every section is optional; missing keys take their defaults.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub git: GitConfig,

    #[serde(default)]
    pub registry: RegistryConfig,
}

fn default_remote() -> String {
    "origin".to_string()
}

/// Settings for the version-control side of a release.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GitConfig {
    /// Remote whose branches are listed and to which refs are pushed
    #[serde(default = "default_remote")]
    pub remote: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        GitConfig {
            remote: default_remote(),
        }
    }
}

/// Settings for pushing images.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct RegistryConfig {
    #[serde(default)]
    pub insecure: bool,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl Config {
    /// Registry client options from configuration, the environment and the
    /// `--insecure` flag
    ///
    /// Environment credentials take precedence over the file. Credentials
    /// are only used when both a username and a password are known.
    pub fn registry_options(&self, insecure_flag: bool) -> RegistryOptions {
        let username = env::var(USERNAME_ENV)
            .ok()
            .or_else(|| self.registry.username.clone());
        let password = env::var(PASSWORD_ENV)
            .ok()
            .or_else(|| self.registry.password.clone());

        RegistryOptions {
            insecure: insecure_flag || self.registry.insecure,
            credentials: username
                .zip(password)
                .map(|(username, password)| Credentials { username, password }),
        }
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `release-tool.toml` in current directory
/// 3. `release-tool.toml` in user config directory
/// 4. Default configuration if no file found
///
/// # Arguments
/// * `config_path` - Optional path to custom configuration file
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err` - If a file exists but cannot be read or parsed, or an explicit
///   path does not exist
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    let path = match config_path {
        Some(path) => Some(PathBuf::from(path)),
        None => discover_config_file(),
    };

    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading configuration");
            parse_config_file(&path)
        }
        None => Ok(Config::default()),
    }
}

fn discover_config_file() -> Option<PathBuf> {
    let local = Path::new(".").join(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

fn parse_config_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path).map_err(|e| {
        ReleaseToolError::config(format!("Failed to read {}: {}", path.display(), e))
    })?;

    toml::from_str(&contents).map_err(|e| {
        ReleaseToolError::config(format!("Failed to parse {}: {}", path.display(), e))
    })
}
