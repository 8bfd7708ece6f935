//! 传输层重试的退避计算。
//! Backoff computation for transport-level retries.

use crate::config::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// The jittered backoff before attempt `attempt + 1` (attempts count from 1).
///
/// The exponential delay is capped at `max_backoff`, then scaled by a factor
/// drawn uniformly from `[0.5, 1.0]` so that synchronized callers spread out.
///
/// 第 `attempt + 1` 次尝试之前的抖动退避（尝试从1开始计数）。
///
/// 指数延迟以 `max_backoff` 为上限，再乘以从 `[0.5, 1.0]` 均匀抽取的因子，
/// 使同步的调用方相互错开。
pub(crate) fn backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let exponent = attempt.saturating_sub(1) as i32;
    let raw = config.initial_backoff.as_secs_f64() * config.backoff_multiplier.powi(exponent);
    let capped = raw.min(config.max_backoff.as_secs_f64());
    let jitter = rand::rng().random_range(0.5..=1.0);
    Duration::from_secs_f64(capped * jitter)
}
