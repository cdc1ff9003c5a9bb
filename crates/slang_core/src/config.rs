//! Feed controller configuration.
//!
//! # Invariants
//! - Sizes and the refresh interval are non-zero.
//! - `intermix_probability` lies in `[0, 1]`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Tunables for deck loading, shuffling and refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Words fetched by `load_all`, newest first.
    pub page_size: u32,
    /// Upper bound for one `check_for_new` fetch.
    pub new_words_limit: u32,
    /// Leaderboard size used when no explicit `n` is supplied.
    pub top_limit: u32,
    /// Prefetch fires once the cursor is this close to the end.
    pub prefetch_threshold: usize,
    pub refresh_interval_secs: u64,
    /// User words younger than this are tier 1.
    pub recent_window_secs: u64,
    /// Chance of intermixing older user words with system words.
    pub intermix_probability: f64,
    /// Fixed RNG seed; `None` seeds from OS entropy.
    pub shuffle_seed: Option<u64>,
    /// Buffered events per subscriber before lagging.
    pub event_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            new_words_limit: 20,
            top_limit: 10,
            prefetch_threshold: 5,
            refresh_interval_secs: 60,
            recent_window_secs: 24 * 60 * 60,
            intermix_probability: 0.5,
            shuffle_seed: None,
            event_capacity: 64,
        }
    }
}

impl FeedConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Zero("page_size"));
        }
        if self.new_words_limit == 0 {
            return Err(ConfigError::Zero("new_words_limit"));
        }
        if self.top_limit == 0 {
            return Err(ConfigError::Zero("top_limit"));
        }
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::Zero("refresh_interval_secs"));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Zero("event_capacity"));
        }
        if !(0.0..=1.0).contains(&self.intermix_probability) {
            return Err(ConfigError::ProbabilityOutOfRange(
                self.intermix_probability,
            ));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn recent_window_ms(&self) -> i64 {
        i64::try_from(self.recent_window_secs.saturating_mul(1000)).unwrap_or(i64::MAX)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Zero(&'static str),
    ProbabilityOutOfRange(f64),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Zero(field) => write!(f, "feed config `{field}` must be greater than zero"),
            Self::ProbabilityOutOfRange(value) => write!(
                f,
                "feed config `intermix_probability` must be within [0, 1], got {value}"
            ),
        }
    }
}

impl Error for ConfigError {}
