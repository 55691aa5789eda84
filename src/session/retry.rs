//! Retry policy applied by [`Session`](super::Session) on timeouts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// How many times to resend after a timeout, and how long to wait between.
///
/// `max_attempts` counts retries, so `Retry::fixed(2, ..)` sends a request at
/// most three times.
#[derive(Clone, Debug, PartialEq)]
pub struct Retry {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Backoff {
    /// Resend immediately.
    #[default]
    None,
    Fixed { delay: Duration },
    /// `initial * 2^attempt`, capped at `max`, scaled by `1 ± jitter`.
    Exponential {
        initial: Duration,
        max: Duration,
        jitter: f64,
    },
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::None,
        }
    }
}

impl Retry {
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            backoff: Backoff::None,
        }
    }

    /// Immediate resends, the classic manager behavior.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            backoff: Backoff::None,
        }
    }

    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: attempts,
            backoff: Backoff::Fixed { delay },
        }
    }

    /// Exponential backoff starting at `initial`.
    pub fn exponential(attempts: u32, initial: Duration, max: Duration, jitter: f64) -> Self {
        Self {
            max_attempts: attempts,
            backoff: Backoff::Exponential {
                initial,
                max,
                jitter: jitter.clamp(0.0, 1.0),
            },
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed { delay } => *delay,
            Backoff::Exponential {
                initial,
                max,
                jitter,
            } => {
                let multiplier = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
                let capped = initial.saturating_mul(multiplier).min(*max);
                Duration::from_secs_f64(capped.as_secs_f64() * jitter_factor(*jitter))
            }
        }
    }
}

static JITTER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Factor in `[1 - jitter, 1 + jitter]` from a hashed counter.
///
/// Desynchronizing retries only needs spread, not unpredictability.
fn jitter_factor(jitter: f64) -> f64 {
    if jitter <= 0.0 {
        return 1.0;
    }
    let counter = JITTER_COUNTER.fetch_add(1, Ordering::Relaxed);
    let hash = counter.wrapping_mul(0x5851f42d4c957f2d);
    let unit = (hash >> 11) as f64 / ((1u64 << 53) as f64);
    1.0 + (unit - 0.5) * 2.0 * jitter
}
