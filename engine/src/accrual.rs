//! Accrual clock: earnings as a pure function of elapsed wall-clock time.
//!
//! Earnings are always `(now − reference) × rate`, recomputed from the
//! session start on every observation. Nothing here keeps a running total,
//! so scheduling jitter between observations cannot introduce drift.

use std::time::Duration;

use accrue_types::Timestamp;

pub const SECONDS_PER_HOUR: f64 = 3_600.0;

/// Per-second rate for an hourly rate. Non-positive or non-finite rates
/// accrue nothing.
pub fn tokens_per_second(rate_per_hour: f64) -> f64 {
    if rate_per_hour.is_finite() && rate_per_hour > 0.0 {
        rate_per_hour / SECONDS_PER_HOUR
    } else {
        0.0
    }
}

/// Tokens earned over `elapsed` at `rate_per_second`.
pub fn accrue(rate_per_second: f64, elapsed: Duration) -> f64 {
    if !rate_per_second.is_finite() || rate_per_second <= 0.0 {
        return 0.0;
    }
    rate_per_second * elapsed.as_secs_f64()
}

/// Elapsed session time between `reference` and `now`, clamped to `cap`.
///
/// A reference in the future (clock skew) yields zero.
pub fn elapsed_capped(reference: Timestamp, now: Timestamp, cap: Duration) -> Duration {
    reference.duration_until(now).min(cap)
}

/// Earnings between `reference` and `now`, with elapsed time clamped to `cap`.
pub fn earnings_between(
    rate_per_second: f64,
    reference: Timestamp,
    now: Timestamp,
    cap: Duration,
) -> f64 {
    accrue(rate_per_second, elapsed_capped(reference, now, cap))
}

/// Session duration backed out from earnings: `total_earned / tokens_per_second`.
///
/// Returns 0 when the rate is zero, since the quotient is undefined.
pub fn session_duration_ms(total_earned: f64, tokens_per_second: f64) -> u64 {
    if !tokens_per_second.is_finite() || tokens_per_second <= 0.0 || total_earned <= 0.0 {
        return 0;
    }
    let millis = (total_earned / tokens_per_second * 1_000.0).round();
    if millis.is_finite() {
        millis as u64
    } else {
        0
    }
}
