use std::env;
use std::io;
use std::path::PathBuf;

use crate::database::DEFAULT_DB_PATH;
use crate::outreach::DEFAULT_REMINDER_DAYS;

pub const DB_PATH_ENV: &str = "OUTREACH_DB_PATH";
pub const REMINDER_DAYS_ENV: &str = "OUTREACH_REMINDER_DAYS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub reminder_days: u32,
}

impl AppConfig {
    /// Load `.env` if present, then read settings from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let db_path = resolve_path(
            env::var(DB_PATH_ENV)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
        )?;
        let reminder_days = match env::var(REMINDER_DAYS_ENV) {
            Ok(value) if !value.trim().is_empty() => value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|days| *days >= 1)
                .ok_or(ConfigError::InvalidValue {
                    key: REMINDER_DAYS_ENV,
                    value,
                })?,
            _ => DEFAULT_REMINDER_DAYS,
        };

        Ok(Self {
            db_path,
            reminder_days,
        })
    }
}

fn resolve_path(raw: String) -> Result<PathBuf, io::Error> {
    let expanded = shellexpand::tilde(&raw).into_owned();
    let path = PathBuf::from(expanded);
    if path.is_absolute() {
        Ok(path)
    } else {
        let cwd = env::current_dir()?;
        Ok(cwd.join(path))
    }
}
