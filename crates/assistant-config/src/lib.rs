pub mod config;
pub mod manager;

pub use config::{
    parse_bool, ApiConfig, Config, ConfigError, ConfigResult, LogLevel, LoggingConfig,
    WidgetConfig,
};
pub use manager::{ConfigManager, ENV_API_URL, ENV_USE_MOCK};

use std::path::PathBuf;

/// `~/.assistant`
pub fn assistant_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".assistant"))
}

/// `~/.assistant/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    assistant_dir().map(|dir| dir.join("config.json"))
}

/// Expand a leading `~/` to the home directory
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_dir() {
        let dir = assistant_dir();
        assert!(dir.is_some());
        assert!(dir.unwrap().to_string_lossy().contains(".assistant"));
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/.assistant/config.json");
        assert!(expanded.is_some());
        assert!(!expanded.unwrap().to_string_lossy().starts_with("~"));

        assert_eq!(expand_tilde("/tmp/a.log"), Some(PathBuf::from("/tmp/a.log")));
    }
}
