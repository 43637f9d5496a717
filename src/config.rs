use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::errors::BotError;

const DEFAULT_DB_PATH: &str = "calendar_bot.db";

/// Plain KEY=VALUE configuration file. Blank lines and '#' comments are
/// skipped; `export ` prefixes and single or double quotes around values
/// are tolerated so a shell env file can be reused as-is.
#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BotError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| BotError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, BotError> {
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(BotError::Config(format!(
                    "invalid config line {}: {}",
                    idx + 1,
                    line
                )));
            };
            let key = key.trim();
            let mut value = value.trim().to_string();
            if (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
                || (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
            {
                value = value[1..value.len() - 1].to_string();
            }
            values.insert(key.to_string(), value);
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    pub fn db_path(&self) -> String {
        self.get("DB_PATH")
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
    }

    /// Identity the console front end speaks as.
    pub fn console_user_id(&self) -> i64 {
        self.get("CONSOLE_USER_ID")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1)
    }

    pub fn console_username(&self) -> Option<String> {
        self.get("CONSOLE_USERNAME")
    }

    pub fn console_full_name(&self) -> String {
        self.get("CONSOLE_FULL_NAME")
            .unwrap_or_else(|| "Console User".to_string())
    }
}
