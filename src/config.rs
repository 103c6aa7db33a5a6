use crate::error::{PdiError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub token: Option<String>,
    pub username: Option<String>,
    pub timeout_seconds: u64,
    pub search_debounce_ms: u64,
    pub search_min_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".into(),
            token: None,
            username: None,
            timeout_seconds: 30,
            search_debounce_ms: 300,
            search_min_chars: 3,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)
                .map_err(|e| PdiError::Config(format!("{}: {}", path.display(), e)))?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| PdiError::Config("Home directory not found".into()))?;
        Ok(home.join(".config").join("pdi-inspect").join("config.json"))
    }

    // environment wins over the file
    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("PDI_API_URL") {
            if !url.trim().is_empty() {
                self.api_base_url = url;
            }
        }
        if let Ok(token) = std::env::var("PDI_TOKEN") {
            if !token.trim().is_empty() {
                self.token = Some(token);
            }
        }
    }

    pub fn token(&self) -> Result<&str> {
        self.token.as_deref().ok_or(PdiError::MissingToken)
    }

    pub fn username(&self) -> Result<&str> {
        self.username.as_deref().ok_or(PdiError::MissingToken)
    }

    pub fn set_session(&mut self, username: String, token: String) {
        self.username = Some(username);
        self.token = Some(token);
    }

    pub fn clear_session(&mut self) {
        self.username = None;
        self.token = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().expect("Failed to create temp dir");
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.search_min_chars, 3);
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.api_base_url = "https://pdi.example.com/api".into();
        config.set_session("inspector".into(), "tok".into());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.username.as_deref(), Some("inspector"));
        assert_eq!(loaded.search_debounce_ms, 300);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"search_min_chars": 5}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.search_min_chars, 5);
        assert_eq!(config.search_debounce_ms, 300);
    }

    #[test]
    fn test_corrupt_file_is_config_error() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(Config::load_from(&path), Err(PdiError::Config(_))));
    }

    #[test]
    fn test_missing_token() {
        let mut config = Config::default();
        config.token = None;
        config.clear_session();
        assert!(matches!(config.username(), Err(PdiError::MissingToken)));
    }
}
