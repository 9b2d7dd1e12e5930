//! Engine tuning knobs.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```
//! use dnd_engine::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{ "flee_dc": 12 }"#).unwrap();
//! assert_eq!(config.flee_dc, 12);
//! assert_eq!(config.max_enemies, 8);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors from loading a config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Retry schedule for narrator calls: exponential backoff capped at
/// `max_delay_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts. Useful in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (1-based: the wait after the
    /// first failure is `delay_for(1)`).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// Configuration for a game session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// DC of the Dexterity check to escape combat.
    pub flee_dc: i32,

    /// Fraction of max HP below which companions switch to support abilities.
    pub critical_hp_ratio: f32,

    /// Largest enemy roster a single encounter (or wave) may declare.
    pub max_enemies: usize,

    /// Companions allowed alongside the player.
    pub max_party_size: usize,

    /// Idle time after which the session store drops a session.
    pub session_ttl_secs: u64,

    pub retry: RetryPolicy,

    /// Fixed RNG seed for reproducible sessions.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flee_dc: 10,
            critical_hp_ratio: 0.3,
            max_enemies: 8,
            max_party_size: 3,
            session_ttl_secs: 60 * 60,
            retry: RetryPolicy::default(),
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from JSON; missing fields take their defaults.
    ///
    /// `critical_hp_ratio` is clamped into `[0, 1]` as the builder does.
    /// A NaN ratio or a zero enemy cap is an error.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        if config.critical_hp_ratio.is_nan() {
            return Err(ConfigError::Invalid {
                field: "critical_hp_ratio",
                reason: "not a number",
            });
        }
        if config.max_enemies == 0 {
            return Err(ConfigError::Invalid {
                field: "max_enemies",
                reason: "must be at least 1",
            });
        }
        let ratio = config.critical_hp_ratio;
        Ok(config.with_critical_hp_ratio(ratio))
    }

    pub fn with_flee_dc(mut self, dc: i32) -> Self {
        self.flee_dc = dc;
        self
    }

    pub fn with_critical_hp_ratio(mut self, ratio: f32) -> Self {
        self.critical_hp_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_enemies(mut self, max: usize) -> Self {
        self.max_enemies = max;
        self
    }

    pub fn with_max_party_size(mut self, max: usize) -> Self {
        self.max_party_size = max;
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Seed the session RNG for deterministic play.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}
