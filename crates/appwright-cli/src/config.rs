//! Configuration file management for appwright.
//!
//! Provides a TOML config file at `~/.config/appwright/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default. Provider
//! and deploy credentials resolve lazily so spec-only commands never demand
//! an API key; commands that will call out fail fast before any call.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use appwright_core::DataLayout;
use appwright_core::deploy::{GithubProvisioner, PushCredentials};
use appwright_core::provider::AnthropicConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub deploy: DeploySection,
    #[serde(default)]
    pub data: DataSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProviderSection {
    /// Anthropic API key.
    pub api_key: Option<String>,
    /// Model override.
    pub model: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DeploySection {
    pub github_username: Option<String>,
    pub github_token: Option<String>,
    /// Provisioning-agent endpoint that creates remote repositories.
    pub provisioner_endpoint: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DataSection {
    /// Artifact store root.
    pub dir: Option<PathBuf>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the appwright config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/appwright` or
/// `~/.config/appwright`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("appwright");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("appwright")
}

/// Return the path to the appwright config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix (it may hold credentials).
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Resolved configuration for one invocation.
#[derive(Debug)]
pub struct AppwrightConfig {
    pub layout: DataLayout,
    file: ConfigFile,
}

impl AppwrightConfig {
    /// Resolve the data layout eagerly; credentials stay lazy.
    ///
    /// Data dir: CLI flag > `APPWRIGHT_DATA_DIR` env > config file >
    /// `data/` default.
    pub fn resolve(cli_data_dir: Option<&Path>) -> Self {
        let file = load_config().unwrap_or_default();

        let data_dir = if let Some(dir) = cli_data_dir {
            dir.to_path_buf()
        } else if let Ok(dir) = std::env::var("APPWRIGHT_DATA_DIR") {
            PathBuf::from(dir)
        } else if let Some(dir) = &file.data.dir {
            dir.clone()
        } else {
            PathBuf::from(DataLayout::DEFAULT_ROOT)
        };

        Self {
            layout: DataLayout::new(data_dir),
            file,
        }
    }

    /// Resolve the generation-provider configuration, failing fast when no
    /// API key is available.
    ///
    /// API key: `ANTHROPIC_API_KEY` env > config file > error.
    /// Model: `APPWRIGHT_MODEL` env > config file > built-in default.
    pub fn provider(&self) -> Result<AnthropicConfig> {
        let api_key = if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            key
        } else if let Some(key) = self.file.provider.api_key.clone() {
            key
        } else {
            bail!(
                "provider API key not found; set ANTHROPIC_API_KEY or run `appwright init --api-key <key>`"
            );
        };

        let mut config = AnthropicConfig::new(api_key);
        if let Ok(model) = std::env::var("APPWRIGHT_MODEL") {
            config = config.with_model(model);
        } else if let Some(model) = self.file.provider.model.clone() {
            config = config.with_model(model);
        }
        Ok(config)
    }

    /// Resolve deploy credentials and the provisioner, failing fast on any
    /// missing piece.
    pub fn deploy(&self) -> Result<(PushCredentials, GithubProvisioner)> {
        let username = std::env::var("GITHUB_USERNAME")
            .ok()
            .or_else(|| self.file.deploy.github_username.clone())
            .context("GITHUB_USERNAME not set (env or config file)")?;
        let token = std::env::var("GITHUB_TOKEN")
            .ok()
            .or_else(|| self.file.deploy.github_token.clone())
            .context("GITHUB_TOKEN not set (env or config file)")?;
        let endpoint = std::env::var("PROVISIONER_ENDPOINT")
            .ok()
            .or_else(|| self.file.deploy.provisioner_endpoint.clone())
            .context("PROVISIONER_ENDPOINT not set (env or config file)")?;

        let credentials = PushCredentials {
            username: username.clone(),
            token: token.clone(),
        };
        let provisioner = GithubProvisioner::new(endpoint, username, token);
        Ok((credentials, provisioner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_round_trips_through_toml() {
        let config = ConfigFile {
            provider: ProviderSection {
                api_key: Some("sk-test".to_string()),
                model: Some("claude-sonnet-4-5".to_string()),
            },
            deploy: DeploySection {
                github_username: Some("octo".to_string()),
                github_token: None,
                provisioner_endpoint: None,
            },
            data: DataSection {
                dir: Some(PathBuf::from("/var/appwright")),
            },
        };

        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed: ConfigFile = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.provider.api_key.as_deref(), Some("sk-test"));
        assert_eq!(parsed.deploy.github_username.as_deref(), Some("octo"));
        assert_eq!(parsed.data.dir, Some(PathBuf::from("/var/appwright")));
    }

    #[test]
    fn empty_config_file_parses_with_defaults() {
        let parsed: ConfigFile = toml::from_str("").unwrap();
        assert!(parsed.provider.api_key.is_none());
        assert!(parsed.deploy.github_token.is_none());
        assert!(parsed.data.dir.is_none());
    }
}
