use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ai::DEFAULT_GEMINI_MODEL;
use crate::error::{AppError, Result};
use crate::models::Topic;

const APP_DIR: &str = "topic-buffer";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub gemini_api_key: Option<String>,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default)]
    pub buffer: BufferSettings,

    #[serde(default = "default_seed_topics")]
    pub seed_topics: Vec<Topic>,
}

/// Knobs of the replenish/evict engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSettings {
    /// Minimum number of Active articles to keep around.
    pub target_active: u64,
    /// Total words tolerated across all stored articles.
    pub word_budget: u64,
    /// How many recent articles of a topic are shown to the generator.
    pub context_window: usize,
    pub generation_timeout_secs: u64,
    /// Default page size of `GET /feed`.
    pub feed_limit: usize,
}

impl BufferSettings {
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            target_active: 5,
            word_budget: 5000,
            context_window: 5,
            generation_timeout_secs: 60,
            feed_limit: 50,
        }
    }
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("articles.db").to_string_lossy().to_string()
}

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_seed_topics() -> Vec<Topic> {
    vec![
        Topic {
            id: "ai-research".to_string(),
            query: "Latest breakthroughs in artificial intelligence research".to_string(),
            icon: "🤖".to_string(),
        },
        Topic {
            id: "climate-tech".to_string(),
            query: "New developments in climate and energy technology".to_string(),
            icon: "🌍".to_string(),
        },
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            gemini_api_key: None,
            gemini_model: default_gemini_model(),
            bind_addr: default_bind_addr(),
            buffer: BufferSettings::default(),
            seed_topics: default_seed_topics(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Reads `path`, writing defaults there first if it does not exist, then applies
    /// environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save_to(path)?;
            config
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.gemini_api_key = Some(key);
        }
        if let Some(addr) = lookup("TOPIC_BUFFER_BIND").filter(|a| !a.trim().is_empty()) {
            self.bind_addr = addr;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.buffer.generation_timeout_secs == 0 {
            return Err(AppError::Config(
                "buffer.generation_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.buffer.feed_limit == 0 {
            return Err(AppError::Config("buffer.feed_limit must be greater than zero".to_string()));
        }
        Ok(())
    }
}
