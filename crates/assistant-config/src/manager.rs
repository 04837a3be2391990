use crate::config::{parse_bool, Config, ConfigError, ConfigResult};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Base URL override, the counterpart of the widget's `VITE_API_URL`
pub const ENV_API_URL: &str = "ASSISTANT_API_URL";

/// Mock mode switch, the counterpart of the widget's `VITE_USE_MOCK_API`
pub const ENV_USE_MOCK: &str = "ASSISTANT_USE_MOCK_API";

/// Configuration manager
#[derive(Clone)]
pub struct ConfigManager {
    path: PathBuf,
    config: Arc<RwLock<Config>>,
}

impl ConfigManager {
    /// Load the config file, writing a default one when it does not exist
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let config = if path.exists() {
            info!("Loading config from {:?}", path);
            let content = tokio::fs::read_to_string(path).await?;
            let content = Self::expand_env_vars(&content)?;
            serde_json::from_str(&content)?
        } else {
            info!("Config file not found, creating default config at {:?}", path);
            let default_config = Config::default();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let content = serde_json::to_string_pretty(&default_config)?;
            tokio::fs::write(path, &content).await?;
            default_config
        };

        Ok(Self {
            path: path.to_path_buf(),
            config: Arc::new(RwLock::new(config)),
        })
    }

    pub fn default_config_path() -> ConfigResult<PathBuf> {
        crate::default_config_path()
            .ok_or_else(|| ConfigError::InvalidPath("Could not find home directory".to_string()))
    }

    pub fn get(&self) -> Arc<RwLock<Config>> {
        Arc::clone(&self.config)
    }

    /// Copy of the current config
    pub async fn snapshot(&self) -> Config {
        self.config.read().await.clone()
    }

    pub async fn save(&self) -> ConfigResult<()> {
        let config = self.config.read().await;
        let content = serde_json::to_string_pretty(&*config)?;
        drop(config);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, content).await?;
        info!("Config saved to {:?}", self.path);
        Ok(())
    }

    /// Modify, validate and persist; the current config is kept when the edit fails
    pub async fn update<F>(&self, f: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config) -> ConfigResult<()>,
    {
        let mut config = self.config.write().await;
        let mut edited = config.clone();
        f(&mut edited)?;
        Self::validate(&edited)?;
        *config = edited;
        drop(config);
        self.save().await
    }

    /// Set one dotted key and persist it
    pub async fn set_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        self.update(|config| config.set_value(key, value)).await
    }

    /// Apply `ASSISTANT_API_URL` / `ASSISTANT_USE_MOCK_API` from the process environment
    pub async fn apply_env_overrides(&self) {
        let mut config = self.config.write().await;
        Self::apply_overrides(&mut config, |key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides<F>(config: &mut Config, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            info!("Using API base URL from {}", ENV_API_URL);
            config.api.base_url = url.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_USE_MOCK) {
            match parse_bool(&raw) {
                Some(use_mock) => config.api.use_mock = use_mock,
                None => warn!("Ignoring {}={:?}: not a boolean", ENV_USE_MOCK, raw),
            }
        }
    }

    pub fn validate(config: &Config) -> ConfigResult<()> {
        let base_url = config.api.base_url.trim();
        if !config.api.use_mock {
            if base_url.is_empty() {
                return Err(ConfigError::Validation(
                    "api.base_url is required unless mock mode is enabled".to_string(),
                ));
            }
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                return Err(ConfigError::Validation(format!(
                    "api.base_url must start with http:// or https://: {}",
                    base_url
                )));
            }
        }

        if config.api.user_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "api.user_id cannot be empty".to_string(),
            ));
        }

        if config.api.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "api.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Expand `${VAR}` and `${VAR:-default}`
    fn expand_env_vars(content: &str) -> ConfigResult<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::Validation(format!("Invalid pattern: {}", e)))?;
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let full_match = &cap[0];
            let var_expr = &cap[1];

            let (var_name, default_value) = match var_expr.split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (var_expr, None),
            };

            let replacement = match std::env::var(var_name) {
                Ok(val) => val,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    None => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
                },
            };

            result = result.replace(full_match, &replacement);
        }

        Ok(result)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
