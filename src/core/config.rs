use std::env;

use crate::chat::settings::{DEFAULT_MODEL, DEFAULT_TEMPERATURE, RequestConfig, parse_temperature};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub db_path: String,
    pub openai_api_hostname: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub temperature: f64,
    pub keep_partial_on_abort: bool,
}

impl AppConfig {
    /// Builds the config from any key lookup so it can be tested
    /// without touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let storage_path = lookup("STREAMCHAT_STORAGE_PATH").unwrap_or("./".to_string());
        let db_path = format!("{}/streamchat.db", storage_path.trim_end_matches("/"));
        let openai_api_hostname = lookup("STREAMCHAT_API_HOST")
            .unwrap_or_else(|| "https://api.openai.com".to_string());
        let openai_api_key = lookup("OPENAI_API_KEY")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        let openai_model = lookup("STREAMCHAT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let temperature = lookup("STREAMCHAT_TEMPERATURE")
            .map(|t| parse_temperature(&t))
            .unwrap_or(DEFAULT_TEMPERATURE);
        let keep_partial_on_abort = lookup("STREAMCHAT_KEEP_PARTIAL_ON_ABORT")
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        Self {
            storage_path,
            db_path,
            openai_api_hostname,
            openai_api_key,
            openai_model,
            temperature,
            keep_partial_on_abort,
        }
    }

    /// Initial request settings for a new session
    pub fn request_config(&self) -> RequestConfig {
        RequestConfig {
            api_key: self.openai_api_key.clone(),
            model: self.openai_model.clone(),
            temperature: Some(self.temperature),
            system_prompt: String::new(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }
}
