// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bounded retry policy for destination-chain submission

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff schedule with a fixed attempt budget
///
/// The first attempt runs immediately; each retry sleeps `multiplier`
/// times the previous delay, starting at `base_delay_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep before the given 1-based attempt. The first attempt
    /// has no delay.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = self.multiplier.powi(attempt as i32 - 2);
        let ms = (self.base_delay_ms as f64 * factor).min(Duration::from_secs(120).as_millis() as f64);
        Duration::from_millis(ms as u64)
    }

    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}
