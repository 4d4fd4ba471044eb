//! Per-worker request pacing.
//!
//! A [`Pacer`] wraps a Tokio [`Interval`] whose first tick fires one period
//! after the pacer is created. Missed ticks are never queued: if a worker is
//! still busy when a tick was due, that single tick fires as soon as the worker
//! asks for it and the schedule restarts one period later. A slow worker sees
//! at most one immediate tick, never a burst.

use core::time::Duration;
use fleetcmd_core::{ConfigError, MAX_PERIOD};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Converts a rate in requests per second into the interval between requests.
///
/// # Errors
///
/// - [`ConfigError::InvalidRate`] if `rate` is not a finite number above zero.
/// - [`ConfigError::RateTooHigh`] if `1 / rate` rounds down to zero.
/// - [`ConfigError::RateTooLow`] if `1 / rate` is longer than [`MAX_PERIOD`].
pub fn period_for_rate(rate: f64) -> Result<Duration, ConfigError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(ConfigError::InvalidRate(rate));
    }

    let period =
        Duration::try_from_secs_f64(rate.recip()).map_err(|_| ConfigError::RateTooLow(rate))?;
    if period.is_zero() {
        return Err(ConfigError::RateTooHigh(rate));
    }
    if period > MAX_PERIOD {
        return Err(ConfigError::RateTooLow(rate));
    }
    Ok(period)
}

/// Fixed-rate trigger owned by exactly one worker.
///
/// Dropping the pacer releases its timer.
#[derive(Debug)]
pub struct Pacer {
    interval: Interval,
}

impl Pacer {
    /// Starts a pacer that ticks every `period`, first at `now + period`.
    ///
    /// `period` must be non-zero and is capped at [`MAX_PERIOD`]; use
    /// [`period_for_rate`] or [`Pacer::from_rate`] to obtain one from a rate.
    pub fn new(period: Duration) -> Self {
        let period = period.min(MAX_PERIOD);
        let now = Instant::now();
        let start = now.checked_add(period).unwrap_or(now);
        let mut interval = interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub fn from_rate(rate: f64) -> Result<Self, ConfigError> {
        period_for_rate(rate).map(Self::new)
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    /// Waits for the next tick.
    ///
    /// Cancel-safe: dropping the returned future before it completes does not
    /// consume a tick.
    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[test]
    fn rate_maps_to_reciprocal_period() {
        assert_eq!(period_for_rate(1.0).unwrap(), Duration::from_secs(1));
        assert_eq!(period_for_rate(2.0).unwrap(), Duration::from_millis(500));
        assert_eq!(period_for_rate(0.25).unwrap(), Duration::from_secs(4));
        assert_eq!(period_for_rate(1_000_000_000.0).unwrap(), Duration::from_nanos(1));
    }

    #[test]
    fn invalid_rates_are_rejected() {
        for rate in [0.0, -0.0, -1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(
                matches!(period_for_rate(rate), Err(ConfigError::InvalidRate(_))),
                "rate {rate}"
            );
        }
        assert_eq!(period_for_rate(1e12), Err(ConfigError::RateTooHigh(1e12)));
        for rate in [1e-6, 1e-19, 1e-310] {
            assert_eq!(period_for_rate(rate), Err(ConfigError::RateTooLow(rate)), "rate {rate}");
        }
    }

    #[test]
    fn one_request_a_day_is_allowed() {
        let rate = 1.0 / 86_400.0;
        let period = period_for_rate(rate).unwrap();
        assert!(period <= MAX_PERIOD);
        assert!((period.as_secs_f64() - 86_400.0).abs() < 1e-3, "{period:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_period_is_capped() {
        let pacer = Pacer::new(Duration::MAX);
        assert_eq!(pacer.period(), MAX_PERIOD);
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_one_period() {
        let start = Instant::now();
        let mut pacer = Pacer::from_rate(2.0).unwrap();

        pacer.tick().await;
        assert_eq!(Instant::now() - start, Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_follow_the_period() {
        let period = Duration::from_millis(100);
        let start = Instant::now();
        let mut pacer = Pacer::new(period);

        for n in 1..=10_u32 {
            pacer.tick().await;
            assert_eq!(Instant::now() - start, period * n);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_worker_gets_one_tick_not_a_burst() {
        let period = Duration::from_millis(100);
        let mut pacer = Pacer::new(period);

        pacer.tick().await;
        // Busy for three and a half periods: three ticks were missed.
        sleep(period * 7 / 2).await;

        let late = Instant::now();
        pacer.tick().await;
        assert_eq!(Instant::now(), late, "the pending tick fires immediately");

        pacer.tick().await;
        assert_eq!(Instant::now() - late, period, "missed ticks are not replayed");
    }

    #[tokio::test(start_paused = true)]
    async fn spacing_never_drops_below_the_period() {
        let period = Duration::from_millis(50);
        let mut pacer = Pacer::new(period);
        let mut last = Instant::now();

        // Bodies of 0, 0.5, 1 and 1.5 periods: the last one makes a tick late.
        for n in 0..20_u32 {
            pacer.tick().await;
            let now = Instant::now();
            assert!(now - last >= period, "tick {n} came after {:?}", now - last);
            last = now;
            sleep(period * (n % 4) / 2).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn period_is_exposed() {
        let pacer = Pacer::from_rate(4.0).unwrap();
        assert_eq!(pacer.period(), Duration::from_millis(250));
    }
}
