// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Runtime configuration of the master control.

use anyhow::Context;
use arbor_core::ArborError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration of a [`MasterControl`](crate::MasterControl).
///
/// Loaded from RON; missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArborConfig {
    /// Ticks per second.
    pub tick_rate: u32,
    /// Polling period of non-blocking input devices, in milliseconds.
    pub device_sample_time_ms: u64,
    /// Polling period of the sound scheduler, in milliseconds.
    pub sound_sample_time_ms: u64,
    /// Arms the recurring sound poll when the control starts.
    pub start_sound_polling: bool,
    /// Default `env_logger` filter.
    pub log_filter: String,
}

impl Default for ArborConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            device_sample_time_ms: 5,
            sound_sample_time_ms: 20,
            start_sound_polling: false,
            log_filter: "info".to_string(),
        }
    }
}

impl ArborConfig {
    /// Parses RON text.
    pub fn from_ron_str(text: &str) -> arbor_core::Result<Self> {
        let config: Self = ron::de::from_str(text).map_err(|e| ArborError::Config(e.to_string()))?;
        if config.tick_rate == 0 {
            return Err(ArborError::Config("tick_rate must be at least 1".into()));
        }
        Ok(config)
    }

    /// Reads and parses a RON file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_ron_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Pretty-printed RON.
    pub fn to_ron_string(&self) -> anyhow::Result<String> {
        let pretty = ron::ser::PrettyConfig::default().indentor("  ".to_string());
        ron::ser::to_string_pretty(self, pretty).context("failed to serialize config")
    }

    /// Duration of one tick.
    pub fn tick_period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.tick_rate.max(1)))
    }

    /// Polling period of non-blocking input devices.
    pub fn device_sample_time(&self) -> Duration {
        Duration::from_millis(self.device_sample_time_ms)
    }

    /// Polling period of the sound scheduler.
    pub fn sound_sample_time(&self) -> Duration {
        Duration::from_millis(self.sound_sample_time_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_keep_defaults() {
        let config = ArborConfig::from_ron_str("(tick_rate: 30, start_sound_polling: true)").unwrap();
        assert_eq!(config.tick_rate, 30);
        assert!(config.start_sound_polling);
        assert_eq!(config.device_sample_time_ms, 5);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn round_trips_through_ron() {
        let config = ArborConfig {
            log_filter: "arbor_data=debug".into(),
            ..ArborConfig::default()
        };
        let text = config.to_ron_string().unwrap();
        assert_eq!(ArborConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn invalid_text_is_a_config_error() {
        assert!(matches!(
            ArborConfig::from_ron_str("(tick_rate: \"fast\")"),
            Err(ArborError::Config(_))
        ));
        assert!(ArborConfig::from_ron_str("(tick_rate: 0)").is_err());
        assert!(ArborConfig::load("/nonexistent/arbor.ron").is_err());
    }

    #[test]
    fn periods_follow_rates() {
        let config = ArborConfig {
            tick_rate: 50,
            ..ArborConfig::default()
        };
        assert_eq!(config.tick_period(), Duration::from_millis(20));
        assert_eq!(config.sound_sample_time(), Duration::from_millis(20));
    }
}
