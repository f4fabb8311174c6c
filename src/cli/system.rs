use std::fs;

use anyhow::Result;

use crate::chat::settings::SYSTEM_PROMPT_KEY;
use crate::core::AppConfig;
use crate::core::db::{async_db, kv_get, kv_set};

pub async fn run(config: &AppConfig, prompt: Option<String>, clear: bool) -> Result<()> {
    fs::create_dir_all(&config.storage_path)?;
    let db = async_db(&config.db_path).await?;

    if clear {
        kv_set(&db, SYSTEM_PROMPT_KEY, "").await?;
        println!("System prompt cleared");
        return Ok(());
    }

    match prompt {
        Some(prompt) => {
            kv_set(&db, SYSTEM_PROMPT_KEY, prompt.trim()).await?;
            println!("System prompt saved");
        }
        None => match kv_get(&db, SYSTEM_PROMPT_KEY).await? {
            Some(prompt) if !prompt.is_empty() => println!("{}", prompt),
            _ => println!("No system prompt set"),
        },
    }

    Ok(())
}
