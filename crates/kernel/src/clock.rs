use parking_lot::Mutex;
use std::time::Instant;
use wayfarer_common::ClockConfig;

/// Source of wall-clock time in seconds.
///
/// Only differences between readings matter; the origin is arbitrary.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> f64;
}

/// Monotonic wall clock measured from its creation.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock for tests and offline simulation.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: f64) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, dt: f64) {
        *self.now.lock() += dt;
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}

/// Smooths the server-reported timeline against local wall-clock time.
///
/// The raw clock is a straight extrapolation from the last server report.
/// The reconciled clock advances at the same rate but only drifts toward the
/// raw clock when the two disagree by more than the jump threshold, and the
/// pull gets stronger the longer the gap between calls.
#[derive(Debug, Clone)]
pub struct TimeReconciler {
    time_ratio: f64,
    jump_threshold: f64,
    correction_base: f64,
    server_epoch: f64,
    local_epoch: f64,
    last_call: Option<f64>,
    reconciled: f64,
}

impl TimeReconciler {
    pub fn new(config: &ClockConfig, now: f64) -> Self {
        Self {
            time_ratio: config.time_ratio,
            jump_threshold: config.jump_threshold,
            correction_base: config.correction_base,
            server_epoch: 0.0,
            local_epoch: now,
            last_call: None,
            reconciled: 0.0,
        }
    }

    /// Record a server time report received at wall-clock `now`.
    ///
    /// A non-incremental report discards the smoothing state; the next
    /// reading reseeds from the raw clock.
    pub fn report(&mut self, server_time: f64, now: f64, incremental: bool) {
        self.server_epoch = server_time;
        self.local_epoch = now;
        if !incremental {
            self.last_call = None;
        }
    }

    pub fn server_epoch(&self) -> f64 {
        self.server_epoch
    }

    pub fn local_epoch(&self) -> f64 {
        self.local_epoch
    }

    pub fn time_ratio(&self) -> f64 {
        self.time_ratio
    }

    /// Straight extrapolation from the last report.
    pub fn raw(&self, now: f64) -> f64 {
        (now - self.local_epoch) * self.time_ratio + self.server_epoch
    }

    /// Reconciled in-world time at wall-clock `now`.
    ///
    /// Never decreases between resets: when the raw clock falls behind, the
    /// reconciled clock holds until the raw clock catches up.
    pub fn globtime(&mut self, now: f64) -> f64 {
        let raw = self.raw(now);
        match self.last_call {
            None => self.reconciled = raw,
            Some(last) => {
                let dt = (now - last).max(0.0);
                let previous = self.reconciled;
                let mut advanced = previous + dt * self.time_ratio;
                if (advanced - raw).abs() > self.jump_threshold {
                    advanced += (raw - advanced) * (1.0 - self.correction_base.powf(-dt));
                }
                self.reconciled = advanced.max(previous);
            }
        }
        self.last_call = Some(now);
        self.reconciled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconciler() -> TimeReconciler {
        TimeReconciler::new(&ClockConfig::default(), 0.0)
    }

    #[test]
    fn first_call_after_full_report_equals_raw() {
        let mut r = reconciler();
        r.report(100.0, 5.0, false);
        assert_eq!(r.globtime(5.0), 100.0);
    }

    #[test]
    fn one_second_later_advances_by_ratio() {
        let mut r = reconciler();
        r.report(100.0, 0.0, false);
        r.globtime(0.0);
        let t = r.globtime(1.0);
        assert!((t - (100.0 + 3.29)).abs() < 1e-9);
    }

    #[test]
    fn consecutive_calls_differ_by_scaled_wallclock() {
        let mut r = reconciler();
        r.report(50.0, 10.0, false);
        let a = r.globtime(10.1);
        let b = r.globtime(10.3);
        assert!((b - a - 0.2 * 3.29).abs() < 1e-9);
    }

    #[test]
    fn small_jitter_is_not_corrected() {
        let mut r = reconciler();
        r.report(100.0, 0.0, false);
        r.globtime(0.0);
        // Incremental report half an in-world second ahead of extrapolation.
        r.report(100.0 + 3.29 + 0.5, 1.0, true);
        let t = r.globtime(1.0);
        assert!((t - (100.0 + 3.29)).abs() < 1e-9);
    }

    #[test]
    fn large_jump_is_pulled_toward_raw() {
        let mut r = reconciler();
        r.report(100.0, 0.0, false);
        r.globtime(0.0);
        r.report(200.0, 1.0, true);
        let t = r.globtime(1.0);
        let advanced = 100.0 + 3.29;
        let expected = advanced + (200.0 - advanced) * (1.0 - 10f64.powf(-1.0));
        assert!((t - expected).abs() < 1e-9);
    }

    #[test]
    fn jump_converges_within_bounded_calls() {
        let mut r = reconciler();
        r.report(0.0, 0.0, false);
        r.globtime(0.0);
        r.report(500.0, 0.0, true);
        let mut now = 0.0;
        let mut t = 0.0;
        for _ in 0..20 {
            now += 0.5;
            t = r.globtime(now);
        }
        assert!((t - r.raw(now)).abs() <= 1.0);
    }

    #[test]
    fn backward_report_never_decreases_reconciled_time() {
        let mut r = reconciler();
        r.report(1000.0, 0.0, false);
        let mut prev = r.globtime(0.0);
        r.report(900.0, 0.5, true);
        let mut now = 0.5;
        for _ in 0..400 {
            now += 0.1;
            let t = r.globtime(now);
            assert!(t >= prev);
            prev = t;
        }
        assert!((prev - r.raw(now)).abs() <= 1.0);
    }

    #[test]
    fn full_report_resets_smoothing() {
        let mut r = reconciler();
        r.report(100.0, 0.0, false);
        r.globtime(0.0);
        r.report(5000.0, 1.0, false);
        assert_eq!(r.globtime(1.0), 5000.0);
    }

    #[test]
    fn manual_clock_advances() {
        let c = ManualClock::new(1.0);
        c.advance(0.5);
        assert_eq!(c.now(), 1.5);
        c.set(10.0);
        assert_eq!(c.now(), 10.0);
    }
}
