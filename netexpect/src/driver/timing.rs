//! Timing policy: delay factors, read timeouts, and idle constants.
//!
//! Two regimes exist. The modern one uses an absolute `read_timeout`. The
//! legacy one derives the timeout from `max_loops × delay_factor ×
//! loop_delay`. Each call uses exactly one of them.

use std::time::Duration;

use serde::Deserialize;

use crate::channel::ReadConfig;

/// Connection-wide timing settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TimingPolicy {
    /// Scale applied to every delay on the connection.
    #[serde(deserialize_with = "factor::deserialize")]
    pub global_delay_factor: f64,

    /// When true, `global_delay_factor` caps the per-call factor instead of flooring it.
    pub fast_cli: bool,

    /// Default absolute timeout for pattern reads.
    #[serde(with = "secs_f64")]
    pub read_timeout: Duration,

    /// Granularity of the legacy loop.
    #[serde(with = "secs_f64")]
    pub loop_delay: Duration,

    /// Legacy iteration bound.
    pub max_loops: u32,

    /// Idle period ending a timing read.
    #[serde(with = "secs_f64")]
    pub last_read: Duration,

    /// Sleep between drains while waiting for a pattern.
    #[serde(with = "secs_f64")]
    pub poll_interval: Duration,

    /// First backoff step of timing reads.
    #[serde(with = "secs_f64")]
    pub timing_poll_start: Duration,

    /// Backoff ceiling of timing reads.
    #[serde(with = "secs_f64")]
    pub timing_poll_max: Duration,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            global_delay_factor: 1.0,
            fast_cli: false,
            read_timeout: Duration::from_secs(10),
            loop_delay: Duration::from_millis(200),
            max_loops: 500,
            last_read: Duration::from_secs(2),
            poll_interval: Duration::from_millis(10),
            timing_poll_start: Duration::from_millis(100),
            timing_poll_max: Duration::from_secs(2),
        }
    }
}

impl TimingPolicy {
    /// Effective delay factor for one call.
    ///
    /// Without `fast_cli` the larger of the two factors wins; with it the
    /// smaller wins, so a global factor below one speeds everything up.
    pub fn select_delay_factor(&self, delay_factor: f64) -> f64 {
        if self.fast_cli {
            delay_factor.min(self.global_delay_factor)
        } else {
            delay_factor.max(self.global_delay_factor)
        }
    }

    /// Legacy timeout: `max_loops × delay_factor × loop_delay`.
    pub fn legacy_timeout(&self, delay_factor: f64, max_loops: Option<u32>) -> Duration {
        let loops = max_loops.unwrap_or(self.max_loops);
        saturating_mul(self.loop_delay, self.select_delay_factor(delay_factor) * f64::from(loops))
    }

    /// Pick the authoritative timeout for one call.
    ///
    /// A legacy argument (`delay_factor` or `max_loops`) switches the call
    /// to the legacy regime; otherwise the explicit or default
    /// `read_timeout` governs.
    pub fn resolve(
        &self,
        read_timeout: Option<Duration>,
        delay_factor: Option<f64>,
        max_loops: Option<u32>,
    ) -> Duration {
        if delay_factor.is_some() || max_loops.is_some() {
            self.legacy_timeout(delay_factor.unwrap_or(1.0), max_loops)
        } else {
            read_timeout.unwrap_or(self.read_timeout)
        }
    }

    /// Scale a fixed sleep by the connection's global factor.
    pub fn scaled(&self, delay: Duration) -> Duration {
        saturating_mul(delay, self.select_delay_factor(1.0))
    }

    /// Read engine constants derived from this policy.
    pub fn read_config(&self) -> ReadConfig {
        ReadConfig {
            poll_interval: self.poll_interval,
            timing_poll_start: self.timing_poll_start,
            timing_poll_max: self.timing_poll_max,
            ..ReadConfig::default()
        }
    }
}

/// `delay × factor`, saturating at `Duration::MAX`. NaN and negative factors give zero.
fn saturating_mul(delay: Duration, factor: f64) -> Duration {
    let secs = delay.as_secs_f64() * factor;
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Whether `factor` is usable as a delay factor.
pub(crate) fn valid_factor(factor: f64) -> bool {
    factor.is_finite() && factor >= 0.0
}

mod factor {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let factor = f64::deserialize(deserializer)?;
        if super::valid_factor(factor) {
            Ok(factor)
        } else {
            Err(serde::de::Error::custom(format!(
                "delay factor must be finite and non-negative, got {factor}"
            )))
        }
    }
}

mod secs_f64 {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
