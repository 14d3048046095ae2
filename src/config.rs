//! TOML configuration with environment overrides.
//!
//! Every setting has a default, so a missing config file is not an error.
//! Endpoint settings are re-read through [`ConfigSource::load`] on every
//! completion call, so editing the file or the environment takes effect on
//! the next build without a restart.
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `PAGEINDEX_INDEX_DIR` | `index.dir` |
//! | `PAGEINDEX_LLM_BASE_URL` / `_API_KEY` / `_MODEL` | `llm.*` |
//! | `PAGEINDEX_OCR_BASE_URL` / `_API_KEY` / `_MODEL` | `ocr.*` |

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default = "default_llm")]
    pub llm: EndpointConfig,
    /// Vision endpoint. Has no default model, so it stays off until one is set.
    #[serde(default)]
    pub ocr: EndpointConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
        }
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("~/.pageindex")
}

/// An OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Deserialize, Clone)]
pub struct EndpointConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Empty for `[llm]` means `gpt-4o-mini`.
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            model: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EndpointConfig {
    /// Endpoint and key are both set.
    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty() && !self.api_key.trim().is_empty()
    }
}

fn default_llm() -> EndpointConfig {
    EndpointConfig {
        model: default_llm_model(),
        ..EndpointConfig::default()
    }
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index: IndexConfig::default(),
            llm: default_llm(),
            ocr: EndpointConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Completion endpoint is usable.
    pub fn is_llm_configured(&self) -> bool {
        self.llm.is_configured()
    }

    /// Vision endpoint is usable; unlike the completion endpoint it has no default model.
    pub fn is_ocr_configured(&self) -> bool {
        self.ocr.is_configured() && !self.ocr.model.trim().is_empty()
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("PAGEINDEX_INDEX_DIR") {
            self.index.dir = PathBuf::from(dir);
        }
        let endpoints = [("LLM", &mut self.llm), ("OCR", &mut self.ocr)];
        for (prefix, endpoint) in endpoints {
            if let Some(v) = lookup(&format!("PAGEINDEX_{}_BASE_URL", prefix)) {
                endpoint.base_url = v;
            }
            if let Some(v) = lookup(&format!("PAGEINDEX_{}_API_KEY", prefix)) {
                endpoint.api_key = v;
            }
            if let Some(v) = lookup(&format!("PAGEINDEX_{}_MODEL", prefix)) {
                endpoint.model = v;
            }
        }
    }
}

/// Loads the config file (if present) and applies environment overrides.
pub fn load_config(path: &Path) -> Result<Config> {
    load_config_with(path, |key| std::env::var(key).ok())
}

fn load_config_with(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let mut config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    config.apply_env(lookup);
    config.index.dir = expand_home(&config.index.dir);
    if config.llm.model.trim().is_empty() {
        config.llm.model = default_llm_model();
    }

    if config.llm.timeout_secs == 0 {
        anyhow::bail!("llm.timeout_secs must be > 0");
    }
    if config.ocr.timeout_secs == 0 {
        anyhow::bail!("ocr.timeout_secs must be > 0");
    }

    Ok(config)
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

/// Re-readable handle on the configuration.
///
/// Cloned into every component that talks to an external service; each
/// call to [`load`](ConfigSource::load) sees the current file and environment.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    path: PathBuf,
}

impl ConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Config> {
        load_config(&self.path)
    }

    /// [`load`](ConfigSource::load) on the blocking pool.
    pub async fn load_async(&self) -> Result<Config> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || load_config(&path))
            .await
            .context("config load task failed")?
    }
}
