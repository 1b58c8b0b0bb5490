use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::app::RateLimits;
use crate::core::ChatId;
use crate::infrastructure::tonapi::ProviderConfig;
use crate::modules::engine::EngineSettings;
use crate::modules::export::ExportSettings;
use crate::modules::throttle::Cadence;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bot: BotConfig,
    pub provider: ProviderSection,
    pub store: StoreConfig,
    pub throttle: ThrottleConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub token: Option<String>,
    /// Chat that receives fatal error reports
    pub operator_chat_id: Option<ChatId>,
    pub poll_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: None,
            operator_chat_id: None,
            poll_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    /// Shared key used for users without their own
    pub api_key: Option<String>,
    pub mainnet_url: String,
    pub testnet_url: String,
    pub timeout_secs: u64,
}

impl Default for ProviderSection {
    fn default() -> Self {
        let defaults = ProviderConfig::default();
        Self {
            api_key: None,
            mainnet_url: defaults.mainnet_url,
            testnet_url: defaults.testnet_url,
            timeout_secs: defaults.timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
    pub ttl_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            ttl_secs: 30 * 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub text_rate_secs: f64,
    pub key_rate_secs: f64,
    pub button_rate_secs: f64,
    pub cadence_secs: f64,
    /// Defaults to the cadence plus two seconds
    pub stop_grace_secs: Option<f64>,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            text_rate_secs: 2.0,
            key_rate_secs: 1.0,
            button_rate_secs: 0.3,
            cadence_secs: 3.0,
            stop_grace_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub page_size: usize,
    pub listing_page_size: usize,
    pub page_pause_ms: u64,
    pub max_pages: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            listing_page_size: 10,
            page_pause_ms: 1000,
            max_pages: 500,
        }
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or_default()
}

impl Config {
    /// Overlay `BOT_TOKEN`, `OPERATOR_CHAT_ID`, `TONAPI_KEY`, `TONVIEW_SESSION_DB`
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());
        if let Some(token) = var("BOT_TOKEN") {
            self.bot.token = Some(token);
        }
        if let Some(chat) = var("OPERATOR_CHAT_ID").and_then(|v| v.trim().parse().ok()) {
            self.bot.operator_chat_id = Some(chat);
        }
        if let Some(key) = var("TONAPI_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(path) = var("TONVIEW_SESSION_DB") {
            self.store.path = Some(PathBuf::from(path));
        }
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.bot.poll_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.store.ttl_secs)
    }

    pub fn session_db_path(&self) -> Option<PathBuf> {
        self.store
            .path
            .clone()
            .or_else(|| data_dir().map(|dir| dir.join("sessions.sqlite3")))
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            api_key: self.provider.api_key.clone(),
            mainnet_url: self.provider.mainnet_url.clone(),
            testnet_url: self.provider.testnet_url.clone(),
            timeout: Duration::from_secs(self.provider.timeout_secs),
        }
    }

    pub fn rate_limits(&self) -> RateLimits {
        RateLimits {
            text: secs(self.throttle.text_rate_secs),
            key: secs(self.throttle.key_rate_secs),
            button: secs(self.throttle.button_rate_secs),
        }
    }

    pub fn cadence(&self) -> Cadence {
        let interval = secs(self.throttle.cadence_secs);
        let stop_grace = self
            .throttle
            .stop_grace_secs
            .map(secs)
            .unwrap_or(interval + Duration::from_secs(2));
        Cadence {
            interval,
            initial_delay: Duration::ZERO,
            stop_grace,
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            listing_page_size: self.export.listing_page_size.max(1),
            cadence: self.cadence(),
        }
    }

    pub fn export_settings(&self) -> ExportSettings {
        ExportSettings {
            page_size: self.export.page_size.max(1),
            page_pause: Duration::from_millis(self.export.page_pause_ms),
            max_pages: self.export.max_pages.max(1),
        }
    }
}

/// Load the config file (defaults when there is none) and overlay the environment
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = explicit.map(Path::to_path_buf).or_else(config_path);
    let mut config = match path {
        Some(path) if path.exists() => load_from(&path)?,
        Some(path) if explicit.is_some() => {
            anyhow::bail!("config file {} does not exist", path.display())
        }
        _ => Config::default(),
    };
    config.apply_env();
    Ok(config)
}

pub fn load_from(path: &Path) -> Result<Config> {
    let content =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    toml::from_str::<Config>(&content).with_context(|| format!("parse config {}", path.display()))
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("TONVIEW_CONFIG").map(PathBuf::from) {
        return Some(path);
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
        return Some(xdg.join("tonview").join("config.toml"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".config").join("tonview").join("config.toml"));
    }

    directories::ProjectDirs::from("io", "tonview", "tonview")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

pub fn data_dir() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").map(PathBuf::from) {
        return Some(xdg.join("tonview"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".local").join("share").join("tonview"));
    }
    directories::ProjectDirs::from("io", "tonview", "tonview")
        .map(|dirs| dirs.data_dir().to_path_buf())
}
