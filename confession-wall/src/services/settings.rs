//! Settings service
//!
//! Manages tunable limits persisted as `settings.json` in the data
//! directory. Missing fields fall back to the defaults in `config`.

use crate::config::{
    DEFAULT_CHAT_HISTORY_LIMIT, DEFAULT_REPLY_PAGE_SIZE, DEFAULT_UNLOCK_CACHE_CAPACITY,
    DEFAULT_UNLOCK_TTL_DAYS, MAX_PIN_ATTEMPTS, MAX_REPLY_PAGE_SIZE,
};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// PIN gate and unlock memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessSettings {
    /// Incorrect submissions before lock-out
    #[serde(default = "default_max_pin_attempts")]
    pub max_pin_attempts: u32,
    /// Remembered unlocks kept per device
    #[serde(default = "default_unlock_cache_capacity")]
    pub unlock_cache_capacity: usize,
    /// Days a remembered unlock stays valid (0 = no expiry)
    #[serde(default = "default_unlock_ttl_days")]
    pub unlock_ttl_days: u32,
}

fn default_max_pin_attempts() -> u32 {
    MAX_PIN_ATTEMPTS
}

fn default_unlock_cache_capacity() -> usize {
    DEFAULT_UNLOCK_CACHE_CAPACITY
}

fn default_unlock_ttl_days() -> u32 {
    DEFAULT_UNLOCK_TTL_DAYS
}

impl Default for AccessSettings {
    fn default() -> Self {
        Self {
            max_pin_attempts: default_max_pin_attempts(),
            unlock_cache_capacity: default_unlock_cache_capacity(),
            unlock_ttl_days: default_unlock_ttl_days(),
        }
    }
}

impl AccessSettings {
    pub fn unlock_ttl(&self) -> Option<chrono::Duration> {
        match self.unlock_ttl_days {
            0 => None,
            days => Some(chrono::Duration::days(i64::from(days))),
        }
    }
}

/// Reply listing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplySettings {
    #[serde(default = "default_reply_page_size")]
    pub page_size: u32,
}

fn default_reply_page_size() -> u32 {
    DEFAULT_REPLY_PAGE_SIZE
}

impl Default for ReplySettings {
    fn default() -> Self {
        Self {
            page_size: default_reply_page_size(),
        }
    }
}

/// Global chat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    #[serde(default = "default_chat_history_limit")]
    pub history_limit: u32,
}

fn default_chat_history_limit() -> u32 {
    DEFAULT_CHAT_HISTORY_LIMIT
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            history_limit: default_chat_history_limit(),
        }
    }
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppSettings {
    #[serde(default)]
    pub access: AccessSettings,
    #[serde(default)]
    pub replies: ReplySettings,
    #[serde(default)]
    pub chat: ChatSettings,
}

impl AppSettings {
    /// Reject values that would disable a gate or an unbounded listing
    pub fn validate(&self) -> Result<()> {
        if self.access.max_pin_attempts == 0 {
            return Err(AppError::Validation(
                "max_pin_attempts must be at least 1".to_string(),
            ));
        }
        if self.access.unlock_cache_capacity == 0 {
            return Err(AppError::Validation(
                "unlock_cache_capacity must be at least 1".to_string(),
            ));
        }
        if self.replies.page_size == 0 || self.replies.page_size > MAX_REPLY_PAGE_SIZE {
            return Err(AppError::Validation(format!(
                "reply page_size must be between 1 and {}",
                MAX_REPLY_PAGE_SIZE
            )));
        }
        if self.chat.history_limit == 0 {
            return Err(AppError::Validation(
                "chat history_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Service for managing application settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self {
            settings_path: app_data_dir.join("settings.json"),
        }
    }

    /// Load settings from disk or create default if not exists
    pub async fn load(&self) -> Result<AppSettings> {
        if !self.settings_path.exists() {
            tracing::info!("Settings file not found, creating default settings");
            let default = AppSettings::default();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| AppError::Generic(format!("Failed to parse settings: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to disk
    pub async fn save(&self, settings: &AppSettings) -> Result<()> {
        settings.validate()?;

        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| AppError::Generic(format!("Failed to serialize settings: {}", e)))?;

        fs::write(&self.settings_path, content).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }
}
