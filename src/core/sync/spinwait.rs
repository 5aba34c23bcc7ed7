/*!
 * Adaptive Spin-Wait with Exponential Backoff
 *
 * Bakery waiters must not block on a native primitive, so every wait loop
 * goes through `SpinBackoff`:
 *
 * 1. **Tight spin phase** (0..spin_limit): just `spin_loop()` hint
 * 2. **Yield phase** (spin_limit..yield_limit): `yield_now()` every iteration
 * 3. **Sleep phase** (yield_limit+): exponentially increasing sleep, capped
 *
 * The sleep phase keeps oversubscribed hosts (more units than cores) from
 * burning a whole core per waiter.
 */

use crate::core::limits::{DEFAULT_MAX_SLEEP, DEFAULT_SPIN_LIMIT, DEFAULT_YIELD_LIMIT};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

/// Spin strategy configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinConfig {
    /// Iterations of tight spinning
    pub spin_limit: u32,
    /// Iterations (cumulative) before the sleep phase starts
    pub yield_limit: u32,
    /// Sleep cap in microseconds
    pub max_sleep_us: u64,
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self {
            spin_limit: DEFAULT_SPIN_LIMIT,
            yield_limit: DEFAULT_YIELD_LIMIT,
            max_sleep_us: DEFAULT_MAX_SLEEP.as_micros() as u64,
        }
    }
}

impl SpinConfig {
    /// Configuration for short critical sections on an idle host
    pub const fn low_latency() -> Self {
        Self {
            spin_limit: 100,
            yield_limit: 1_000,
            max_sleep_us: 50,
        }
    }

    /// Yield immediately, never spin (useful on single-core hosts)
    pub const fn yielding() -> Self {
        Self {
            spin_limit: 0,
            yield_limit: 0,
            max_sleep_us: 100,
        }
    }

    #[inline]
    pub fn max_sleep(&self) -> Duration {
        Duration::from_micros(self.max_sleep_us.max(1))
    }
}

/// Per-wait backoff state
///
/// Create one per wait loop and call [`SpinBackoff::snooze`] each time the
/// awaited condition is still false.
#[derive(Debug)]
pub struct SpinBackoff {
    config: SpinConfig,
    step: u32,
    sleep_ns: u64,
}

impl SpinBackoff {
    #[inline]
    pub fn new(config: SpinConfig) -> Self {
        Self {
            config,
            step: 0,
            sleep_ns: 1_000,
        }
    }

    /// Wait a little, escalating from spinning to yielding to sleeping
    #[inline]
    pub fn snooze(&mut self) {
        if self.step < self.config.spin_limit {
            std::hint::spin_loop();
        } else if self.step < self.config.yield_limit {
            thread::yield_now();
        } else {
            let cap = self.config.max_sleep().as_nanos() as u64;
            thread::sleep(Duration::from_nanos(self.sleep_ns.min(cap)));
            self.sleep_ns = (self.sleep_ns * 2).min(cap);
        }
        self.step = self.step.saturating_add(1);
    }

    /// Number of snoozes so far
    #[inline]
    pub fn steps(&self) -> u32 {
        self.step
    }

    /// Whether the backoff has moved past pure spinning
    #[inline]
    pub fn is_yielding(&self) -> bool {
        self.step >= self.config.spin_limit
    }
}
