use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chat::OrchestratorOptions;
use crate::llm::client::{DEFAULT_BASE_URL, DEFAULT_MODEL};

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub model: String,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Seconds to wait for the next chunk before failing the turn.
    pub chunk_timeout_secs: Option<u64>,
    pub tool_timeout_secs: Option<u64>,
    pub max_tool_rounds: usize,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            chunk_timeout_secs: None,
            tool_timeout_secs: Some(30),
            max_tool_rounds: 8,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl ChatConfig {
    /// Loads the config file if present and applies environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: ChatConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn apply_env(&mut self) {
        if let Some(key) = env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            chunk_timeout: self.chunk_timeout_secs.map(Duration::from_secs),
            tool_timeout: self.tool_timeout_secs.map(Duration::from_secs),
            max_tool_rounds: self.max_tool_rounds,
            ..OrchestratorOptions::default()
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_file.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("streamchat")
                .join("streamchat.log")
        })
    }

    pub fn config_path() -> PathBuf {
        if cfg!(test) || env::var("STREAMCHAT_TEST_MODE").is_ok() {
            env::temp_dir().join("streamchat_test_config.json")
        } else {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("streamchat")
                .join("config.json")
        }
    }
}
