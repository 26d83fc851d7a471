//! Reconnect delays for the device socket.
//!
//! Exponential growth from `initial_delay`, capped at `max_delay`, with a
//! symmetric random jitter so a rebooted device is not hit by every client at
//! the same instant.

use crate::config::ReconnectConfig;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: f64,
    /// 0 = unlimited
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// `None` when reconnecting is disabled
    pub fn from_config(config: &ReconnectConfig) -> Option<Self> {
        config.enabled.then(|| Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
            jitter: config.jitter,
            max_attempts: config.max_attempts,
        })
    }
}

#[derive(Debug)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next attempt, or `None` once `max_attempts` is used up
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.policy.max_attempts > 0 && self.attempt > self.policy.max_attempts {
            return None;
        }

        let capped = self.base_delay_ms(self.attempt);
        let jitter_range = capped * self.policy.jitter;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };

        Some(Duration::from_millis((capped + jitter).max(0.0) as u64))
    }

    /// Start over after a successful connect
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    fn base_delay_ms(&self, attempt: u32) -> f64 {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = self.policy.initial_delay.as_millis() as f64 * self.policy.multiplier.powi(exponent);
        base.min(self.policy.max_delay.as_millis() as f64)
    }
}
