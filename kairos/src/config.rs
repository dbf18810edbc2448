use crate::notifier::NotifierKind;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub timer: TimerConfig,
    pub notifier: NotifierConfig,
    pub socket_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TimerConfig {
    /// Minutes.
    #[serde(deserialize_with = "positive")]
    pub work_period: u64,
    /// Minutes.
    #[serde(deserialize_with = "positive")]
    pub rest_period: u64,
    /// Minutes.
    #[serde(deserialize_with = "positive")]
    pub long_rest_period: u64,
    #[serde(deserialize_with = "positive_u32")]
    pub max_work_streak: u32,
    pub progress_symbol: String,
    /// Appended to the task when a work period is cut short; empty disables it.
    pub squash_symbol: String,
    #[serde(deserialize_with = "positive")]
    pub poll_interval_ms: u64,
    #[serde(deserialize_with = "positive")]
    pub reply_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct NotifierConfig {
    pub kind: NotifierKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timer: TimerConfig::default(),
            notifier: NotifierConfig::default(),
            socket_path: PathBuf::from(kairos_ipc::SOCKET_PATH),
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_period: 25,
            rest_period: 5,
            long_rest_period: 15,
            max_work_streak: 4,
            progress_symbol: "*".to_string(),
            squash_symbol: String::new(),
            poll_interval_ms: 200,
            reply_timeout_ms: 5000,
        }
    }
}

impl TimerConfig {
    pub fn work_period(&self) -> Duration {
        minutes(self.work_period)
    }

    pub fn rest_period(&self) -> Duration {
        minutes(self.rest_period)
    }

    pub fn long_rest_period(&self) -> Duration {
        minutes(self.long_rest_period)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

/// Saturates instead of overflowing for absurdly long periods.
fn minutes(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(60))
}

fn positive<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let n: u64 = serde::Deserialize::deserialize(deserializer)?;
    if n == 0 {
        return Err(serde::de::Error::custom("value must be positive"));
    }
    Ok(n)
}

fn positive_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let n = positive(deserializer)?;
    u32::try_from(n).map_err(serde::de::Error::custom)
}

pub fn load_from(path: &Path) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {:?}", path))?;
    toml::from_str(&config_str).with_context(|| format!("Failed to parse config file at {:?}", path))
}

pub fn load_config() -> Result<Config> {
    match ProjectDirs::from("com", "kairos", "Kairos") {
        Some(proj_dirs) => {
            let path = proj_dirs.config_dir().join("kairos.toml");
            if path.exists() {
                load_from(&path)
            } else {
                Ok(Config::default())
            }
        }
        None => Ok(Config::default()),
    }
}
