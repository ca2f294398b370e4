//! Tunables for the passport engine
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_CONFIG_DATA: &str = include_str!("../data/config.json");

/// Number of stamps that unlocks the ritual in the shipped dataset.
pub const DEFAULT_RITUAL_THRESHOLD: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassportConfig {
    /// Ledger size that makes the ritual reachable.
    #[serde(default = "default_threshold")]
    pub ritual_threshold: usize,
    #[serde(default)]
    pub timings: Timings,
    #[serde(default)]
    pub storage: StorageKeys,
}

fn default_threshold() -> usize {
    DEFAULT_RITUAL_THRESHOLD
}

/// Presentation delays, in milliseconds, for the scheduled transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    pub fact_reveal_ms: u64,
    pub retry_reset_ms: u64,
    pub collect_cleanup_ms: u64,
    pub ritual_cast_ms: u64,
    pub welcome_delay_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            fact_reveal_ms: 800,
            retry_reset_ms: 1_500,
            collect_cleanup_ms: 1_200,
            ritual_cast_ms: 1_500,
            welcome_delay_ms: 1_200,
        }
    }
}

impl Timings {
    #[must_use]
    pub const fn fact_reveal(&self) -> Duration {
        Duration::from_millis(self.fact_reveal_ms)
    }

    #[must_use]
    pub const fn retry_reset(&self) -> Duration {
        Duration::from_millis(self.retry_reset_ms)
    }

    #[must_use]
    pub const fn collect_cleanup(&self) -> Duration {
        Duration::from_millis(self.collect_cleanup_ms)
    }

    #[must_use]
    pub const fn ritual_cast(&self) -> Duration {
        Duration::from_millis(self.ritual_cast_ms)
    }

    #[must_use]
    pub const fn welcome_delay(&self) -> Duration {
        Duration::from_millis(self.welcome_delay_ms)
    }
}

/// Keys used in the durable and session-scoped stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageKeys {
    pub stamps_key: String,
    pub welcome_key: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            stamps_key: String::from("tw_odyssey_stamps"),
            welcome_key: String::from("tw_odyssey_welcome_v2"),
        }
    }
}

impl Default for PassportConfig {
    fn default() -> Self {
        serde_json::from_str(DEFAULT_CONFIG_DATA).unwrap_or_else(|err| {
            log::warn!("embedded passport config unreadable ({err}); using built-in values");
            Self {
                ritual_threshold: DEFAULT_RITUAL_THRESHOLD,
                timings: Timings::default(),
                storage: StorageKeys::default(),
            }
        })
    }
}

impl PassportConfig {
    #[must_use]
    pub fn load_from_static() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a configuration.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub const fn with_ritual_threshold(mut self, threshold: usize) -> Self {
        self.ritual_threshold = threshold;
        self
    }
}
