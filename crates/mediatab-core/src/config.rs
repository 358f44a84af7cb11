use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::MediaTabError;

const DEFAULT_CONFIG: &str = include_str!("../data/default.toml");

/// Tuning for the tab-side media observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverConfig {
    pub polling: PollingConfig,
    pub progress: ProgressConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    pub interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressConfig {
    pub milliseconds_epsilon_ms: f64,
    pub seconds_epsilon_ms: f64,
    pub stall_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaConfig {
    pub selection: MediaSelection,
}

/// Which `<audio>`/`<video>` elements the media source reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSelection {
    /// Every loaded media element, in document order.
    All,
    /// Only the first loaded element that is playing and unmuted.
    FirstAudible,
}

impl ObserverConfig {
    /// Parse a full config from a TOML string and validate it.
    pub fn from_toml(toml_str: &str) -> Result<Self, MediaTabError> {
        let config: ObserverConfig =
            toml::from_str(toml_str).map_err(|e| MediaTabError::Config(e.to_string()))?;
        if let Err(e) = config.validate() {
            warn!(error = %e, "Rejected observer config");
            return Err(e);
        }
        Ok(config)
    }

    /// Load config from a file on disk.
    pub fn load(path: &Path) -> Result<Self, MediaTabError> {
        debug!(path = %path.display(), "Loading observer config");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject values the observer cannot run with.
    pub fn validate(&self) -> Result<(), MediaTabError> {
        if self.polling.interval_ms == 0 {
            return Err(MediaTabError::Config(
                "polling.interval_ms must be greater than zero".into(),
            ));
        }
        if !(self.progress.milliseconds_epsilon_ms > 0.0 && self.progress.seconds_epsilon_ms > 0.0)
        {
            return Err(MediaTabError::Config(
                "progress epsilons must be positive".into(),
            ));
        }
        if !(self.progress.stall_factor > 1.0) {
            return Err(MediaTabError::Config(
                "progress.stall_factor must be greater than 1".into(),
            ));
        }
        Ok(())
    }

    /// Polling interval as milliseconds on the observer clock.
    pub fn poll_interval_ms(&self) -> f64 {
        self.polling.interval_ms as f64
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}
