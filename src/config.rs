use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Orchestrator configuration, loaded from environment variables.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Paths
    pub audio_dir: PathBuf,
    pub idle_music_dir: PathBuf,
    pub cache_dir: PathBuf,

    // Límites
    pub max_queue_size: usize,

    // Idle watchdog
    pub idle_tick_secs: u64,
    pub idle_threshold_secs: u64,
    pub idle_backoff_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Paths
            audio_dir: std::env::var("AUDIO_DIR")
                .unwrap_or_else(|_| "audio_files".to_string())
                .into(),
            idle_music_dir: std::env::var("IDLE_MUSIC_DIR")
                .unwrap_or_else(|_| "background_music".to_string())
                .into(),
            cache_dir: std::env::var("CACHE_DIR")
                .unwrap_or_else(|_| "media_cache".to_string())
                .into(),

            // Límites
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,

            // Idle watchdog
            idle_tick_secs: std::env::var("IDLE_TICK_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            idle_threshold_secs: std::env::var("IDLE_THRESHOLD_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            idle_backoff_secs: std::env::var("IDLE_BACKOFF_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Sanity checks on configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.idle_tick_secs == 0 {
            anyhow::bail!("Idle tick interval must be greater than 0");
        }

        if self.idle_threshold_secs < self.idle_tick_secs {
            anyhow::bail!(
                "Idle threshold ({}s) must not be shorter than the tick interval ({}s)",
                self.idle_threshold_secs,
                self.idle_tick_secs
            );
        }

        Ok(())
    }

    pub fn idle_tick(&self) -> Duration {
        Duration::from_secs(self.idle_tick_secs)
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_secs(self.idle_backoff_secs)
    }

    /// Returns a summary of the current configuration for logging.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Paths: audio={}, idle={}, cache={}\n  \
            Queue: {} max\n  \
            Idle: tick {}s, threshold {}s, backoff {}s",
            self.audio_dir.display(),
            self.idle_music_dir.display(),
            self.cache_dir.display(),
            self.max_queue_size,
            self.idle_tick_secs,
            self.idle_threshold_secs,
            self.idle_backoff_secs,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio_dir: "audio_files".into(),
            idle_music_dir: "background_music".into(),
            cache_dir: "media_cache".into(),
            max_queue_size: 1000,
            idle_tick_secs: 5,
            idle_threshold_secs: 30,
            idle_backoff_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_tick() {
        let config = Config {
            idle_tick_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_threshold_shorter_than_tick() {
        let config = Config {
            idle_tick_secs: 5,
            idle_threshold_secs: 2,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
