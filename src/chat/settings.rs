use std::sync::{PoisonError, RwLock};

use anyhow::{Error, Result};
use tokio_rusqlite::Connection;

use crate::core::db::{kv_get, kv_set};

pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_TEMPERATURE: f64 = 1.0;
/// Used when a temperature can't be parsed
pub const FALLBACK_TEMPERATURE: f64 = 0.7;
/// Key the system prompt is persisted under
pub const SYSTEM_PROMPT_KEY: &str = "chat_system_prompt";

/// Settings that shape a single request. A turn takes one snapshot
/// when it starts and never looks at the settings again.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f64>,
    pub system_prompt: String,
}

impl RequestConfig {
    /// The credential if one is set and not blank
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: Some(DEFAULT_TEMPERATURE),
            system_prompt: String::new(),
        }
    }
}

pub trait SettingsProvider: Send + Sync {
    fn snapshot(&self) -> RequestConfig;
}

impl SettingsProvider for RequestConfig {
    fn snapshot(&self) -> RequestConfig {
        self.clone()
    }
}

pub fn parse_temperature(input: &str) -> f64 {
    input
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
        .unwrap_or(FALLBACK_TEMPERATURE)
}

/// Mutable settings for the lifetime of one client session.
///
/// The credential only ever lives in memory. The system prompt is
/// written through to the store on every edit when one is attached.
pub struct SessionSettings {
    config: RwLock<RequestConfig>,
    db: Option<Connection>,
}

impl SessionSettings {
    pub fn new(config: RequestConfig) -> Self {
        Self {
            config: RwLock::new(config),
            db: None,
        }
    }

    /// Attaches a store and restores the persisted system prompt, if
    /// there is one.
    pub async fn with_store(config: RequestConfig, db: Connection) -> Result<Self, Error> {
        let mut config = config;
        if let Some(prompt) = kv_get(&db, SYSTEM_PROMPT_KEY).await?
            && !prompt.is_empty()
        {
            config.system_prompt = prompt;
        }
        Ok(Self {
            config: RwLock::new(config),
            db: Some(db),
        })
    }

    pub fn set_api_key(&self, api_key: &str) {
        let api_key = api_key.trim();
        self.update(|config| {
            config.api_key = (!api_key.is_empty()).then(|| api_key.to_string());
        });
    }

    pub fn set_model(&self, model: &str) {
        let model = model.trim();
        self.update(|config| config.model = model.to_string());
    }

    /// Parses free form input the way the settings form does and
    /// returns the value that was stored.
    pub fn set_temperature(&self, input: &str) -> f64 {
        let temperature = parse_temperature(input);
        self.update(|config| config.temperature = Some(temperature));
        temperature
    }

    pub async fn set_system_prompt(&self, prompt: &str) -> Result<(), Error> {
        let prompt = prompt.trim().to_string();
        self.update(|config| config.system_prompt = prompt.clone());
        if let Some(db) = &self.db {
            kv_set(db, SYSTEM_PROMPT_KEY, &prompt).await?;
        }
        tracing::debug!("System prompt updated ({} chars)", prompt.len());
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut RequestConfig)) {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut config);
    }
}

impl SettingsProvider for SessionSettings {
    fn snapshot(&self) -> RequestConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
