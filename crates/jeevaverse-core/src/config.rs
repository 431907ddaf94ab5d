use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

use crate::ai::GeminiClient;
use crate::transcript::DEFAULT_UTC_OFFSET_MINUTES;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Alternate endpoint root, e.g. a proxy that holds the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// TTS program and its arguments; the text is written to its stdin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_command: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset_minutes: Option<i32>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::get_config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Persist a key entered in the app, leaving other file settings alone.
    pub fn save_api_key(key: &str) -> Result<()> {
        let path = Self::get_config_path()?;
        let mut config = Self::load_from(&path).unwrap_or_else(|_| Self::new());
        config.api_key = Some(key.to_string());
        config.save_to(&path)
    }

    /// `GEMINI_API_KEY`, `GEMINI_MODEL` and `JEEVAVERSE_BASE_URL` win over the file.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("GEMINI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(model) = non_empty("GEMINI_MODEL") {
            self.model = Some(model);
        }
        if let Some(url) = non_empty("JEEVAVERSE_BASE_URL") {
            self.base_url = Some(url);
        }
    }

    /// A direct connection needs a key; a proxy may supply its own.
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() || self.base_url.is_some()
    }

    pub fn utc_offset_minutes(&self) -> i32 {
        self.utc_offset_minutes.unwrap_or(DEFAULT_UTC_OFFSET_MINUTES)
    }

    pub fn gemini_client(&self) -> GeminiClient {
        GeminiClient::new(
            self.base_url.as_deref(),
            self.model.as_deref(),
            self.api_key.as_deref(),
        )
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("jeevaverse").join("config.json"))
    }
}
