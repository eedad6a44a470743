use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use teloxide::types::{ChatId, UserId};

use crate::moderation::WordListDetector;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Trigger words could not be compiled.
    InvalidTriggers { source: regex::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::InvalidTriggers { source } => write!(f, "invalid trigger words: {}", source),
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::InvalidTriggers { source } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    /// Super-actors: pass every admin check, used to appoint the first admins.
    owner_ids: Vec<u64>,
    telegram_bot_token: String,
    #[serde(default)]
    allowed_groups: Vec<i64>,
    /// Directory for the database and logs. Defaults to current directory.
    data_dir: Option<String>,
    #[serde(default = "default_trigger_words")]
    trigger_words: Vec<String>,
    #[serde(default = "default_trigger_penalty")]
    trigger_penalty: u32,
    #[serde(default = "default_top_limit")]
    top_limit: usize,
    /// Ignore forbidden commands instead of answering them.
    #[serde(default)]
    silent_denials: bool,
}

fn default_trigger_words() -> Vec<String> {
    ["клоун", "дурак", "блинк"].into_iter().map(String::from).collect()
}

fn default_trigger_penalty() -> u32 {
    1
}

fn default_top_limit() -> usize {
    10
}

pub struct Config {
    pub owner_ids: HashSet<UserId>,
    pub telegram_bot_token: String,
    pub allowed_groups: HashSet<ChatId>,
    /// Directory for the database and logs.
    pub data_dir: PathBuf,
    pub triggers: WordListDetector,
    pub trigger_penalty: u32,
    pub top_limit: usize,
    pub silent_denials: bool,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        if file.owner_ids.is_empty() {
            return Err(ConfigError::Validation("owner_ids must contain at least one owner ID".into()));
        }
        if file.telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation("telegram_bot_token is required".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = file.telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
            ));
        }
        if !(1..=crate::moderation::command::MAX_TOP_LIMIT).contains(&file.top_limit) {
            return Err(ConfigError::Validation(format!(
                "top_limit must be between 1 and {}",
                crate::moderation::command::MAX_TOP_LIMIT
            )));
        }

        let triggers = WordListDetector::new(&file.trigger_words)
            .map_err(|e| ConfigError::InvalidTriggers { source: e })?;

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            owner_ids: file.owner_ids.into_iter().map(UserId).collect(),
            telegram_bot_token: file.telegram_bot_token,
            allowed_groups: file.allowed_groups.into_iter().map(ChatId).collect(),
            data_dir,
            triggers,
            trigger_penalty: file.trigger_penalty,
            top_limit: file.top_limit,
            silent_denials: file.silent_denials,
        })
    }

    pub fn is_allowed_group(&self, chat_id: ChatId) -> bool {
        self.allowed_groups.is_empty() || self.allowed_groups.contains(&chat_id)
    }

    /// Only supergroups are served; private chats and basic groups are dropped.
    pub fn is_served(&self, is_supergroup: bool, chat_id: ChatId) -> bool {
        is_supergroup && self.is_allowed_group(chat_id)
    }
}
