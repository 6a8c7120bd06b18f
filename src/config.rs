use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tickpoll::poller::{DEFAULT_RATE_PER_MIN, PollerConfig};
use tickpoll::scheduler::{DEFAULT_JITTER_MAX_MS, DEFAULT_JITTER_MIN_MS, DEFAULT_TICK_INTERVAL_MS, SchedulerConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub scheduler: SchedulerSection,
    pub poller: PollerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub tick_interval_ms: u64,
    pub random_start: bool,
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            random_start: true,
            jitter_min_ms: DEFAULT_JITTER_MIN_MS,
            jitter_max_ms: DEFAULT_JITTER_MAX_MS,
        }
    }
}

impl From<&SchedulerSection> for SchedulerConfig {
    fn from(section: &SchedulerSection) -> Self {
        SchedulerConfig::new(Duration::from_millis(section.tick_interval_ms), section.random_start)
            .with_jitter(section.jitter_min_ms, section.jitter_max_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerSection {
    pub rate_per_min: f64,
}

impl Default for PollerSection {
    fn default() -> Self {
        Self {
            rate_per_min: DEFAULT_RATE_PER_MIN,
        }
    }
}

impl From<&PollerSection> for PollerConfig {
    fn from(section: &PollerSection) -> Self {
        PollerConfig::new(section.rate_per_min)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            scheduler: SchedulerSection::default(),
            poller: PollerSection::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // ~/.config/tickpoll/tickpoll.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // ./tickpoll.yml
        let fallback_config = PathBuf::from(format!("{}.yml", env!("CARGO_PKG_NAME")));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject values the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        eyre::ensure!(self.scheduler.tick_interval_ms > 0, "scheduler.tick_interval_ms must be greater than 0");
        eyre::ensure!(
            self.scheduler.jitter_min_ms <= self.scheduler.jitter_max_ms,
            "scheduler.jitter_min_ms must not exceed scheduler.jitter_max_ms"
        );
        eyre::ensure!(
            self.poller.rate_per_min.is_finite() && self.poller.rate_per_min > 0.0,
            "poller.rate_per_min must be a positive number"
        );
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::from(&self.scheduler)
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig::from(&self.poller)
    }
}
