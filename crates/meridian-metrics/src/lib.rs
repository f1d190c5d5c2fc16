//! Latency tracking with HdrHistogram.
//!
//! Provides nanosecond-precision latency measurement.

use core::fmt;

use hdrhistogram::{CreationError, Histogram};
use thiserror::Error;

/// Largest trackable latency (60 s); longer samples are clamped to it.
pub const MAX_TRACKABLE_NANOS: u64 = 60_000_000_000;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("cannot create histogram: {0}")]
    Histogram(#[from] CreationError),
}

/// High-precision latency histogram.
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    histogram: Histogram<u64>,
}

impl LatencyHistogram {
    /// Create with 3 significant digits.
    pub fn new() -> Result<Self, MetricsError> {
        Self::with_precision(3)
    }

    /// Create with custom precision (0-5 significant digits).
    ///
    /// Tracks 1 ns up to `MAX_TRACKABLE_NANOS` with fixed bounds.
    pub fn with_precision(sigfig: u8) -> Result<Self, MetricsError> {
        Ok(Self {
            histogram: Histogram::new_with_bounds(1, MAX_TRACKABLE_NANOS, sigfig)?,
        })
    }

    /// Record a latency value in nanoseconds.
    ///
    /// Values above `MAX_TRACKABLE_NANOS` count as that maximum.
    #[inline(always)]
    pub fn record(&mut self, nanos: u64) {
        self.histogram.saturating_record(nanos);
    }

    /// Get value at percentile (0.0 - 100.0).
    pub fn percentile(&self, percentile: f64) -> u64 {
        self.histogram.value_at_quantile(percentile / 100.0)
    }

    /// Get maximum latency.
    pub fn max(&self) -> u64 {
        self.histogram.max()
    }

    /// Get minimum latency.
    pub fn min(&self) -> u64 {
        self.histogram.min()
    }

    /// Get mean latency.
    pub fn mean(&self) -> f64 {
        self.histogram.mean()
    }

    /// Number of recorded values.
    pub fn count(&self) -> u64 {
        self.histogram.len()
    }

    /// Fold another histogram's samples into this one.
    pub fn merge(&mut self, other: &LatencyHistogram) {
        // Both sides share the same bounds, so the add cannot go out of range.
        let _ = self.histogram.add(&other.histogram);
    }

    /// Drop every recorded value.
    pub fn reset(&mut self) {
        self.histogram.reset();
    }

    /// Snapshot the usual percentiles.
    pub fn summary(&self) -> LatencySummary {
        LatencySummary {
            count: self.count(),
            mean: self.mean(),
            p50: self.percentile(50.0),
            p90: self.percentile(90.0),
            p99: self.percentile(99.0),
            p999: self.percentile(99.9),
            max: self.max(),
        }
    }
}

/// Percentile digest of a `LatencyHistogram`, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub count: u64,
    pub mean: f64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
    pub max: u64,
}

impl fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} mean={} p50={} p90={} p99={} p99.9={} max={}",
            self.count,
            format_latency(self.mean as u64),
            format_latency(self.p50),
            format_latency(self.p90),
            format_latency(self.p99),
            format_latency(self.p999),
            format_latency(self.max),
        )
    }
}

/// Format latency with appropriate units.
pub fn format_latency(nanos: u64) -> String {
    if nanos < 1_000 {
        format!("{} ns", nanos)
    } else if nanos < 1_000_000 {
        format!("{:.2} μs", nanos as f64 / 1_000.0)
    } else if nanos < 1_000_000_000 {
        format!("{:.2} ms", nanos as f64 / 1_000_000.0)
    } else {
        format!("{:.2} s", nanos as f64 / 1_000_000_000.0)
    }
}

/// TSC-backed timer for lowest overhead timing.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    clock: quanta::Clock,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::with_clock(quanta::Clock::new())
    }

    /// Use a specific clock (e.g. `quanta::Clock::mock()` in tests).
    pub fn with_clock(clock: quanta::Clock) -> Self {
        Self { clock }
    }

    /// Raw start mark.
    #[inline(always)]
    pub fn start(&self) -> u64 {
        self.clock.raw()
    }

    /// Nanoseconds since `start`.
    #[inline(always)]
    pub fn elapsed_nanos(&self, start: u64) -> u64 {
        self.clock.delta_as_nanos(start, self.clock.raw())
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_basic() {
        let mut h = LatencyHistogram::new().unwrap();

        for i in 1..=100 {
            h.record(i * 100);
        }

        assert_eq!(h.count(), 100);
        let p50 = h.percentile(50.0);
        assert!((4900..=5100).contains(&p50));
        assert_eq!(h.min(), 100);
        // HdrHistogram may round max value slightly
        assert!(h.max() >= 10000 && h.max() <= 10100);
    }

    #[test]
    fn test_large_values_keep_their_magnitude() {
        let mut h = LatencyHistogram::new().unwrap();
        h.record(250);
        h.record(1_000_000);
        h.record(5_000_000_000);

        assert_eq!(h.min(), 250);
        let p50 = h.percentile(50.0);
        assert!((999_000..=1_001_000).contains(&p50));
        assert!(h.max() >= 4_990_000_000);

        // Out of range samples clamp to the ceiling instead of being lost
        h.record(u64::MAX);
        assert_eq!(h.count(), 4);
        assert!(h.max() >= MAX_TRACKABLE_NANOS - MAX_TRACKABLE_NANOS / 1_000);
    }

    #[test]
    fn test_summary_and_merge() {
        let mut a = LatencyHistogram::new().unwrap();
        let mut b = LatencyHistogram::new().unwrap();
        a.record(100);
        b.record(300);
        a.merge(&b);

        let summary = a.summary();
        assert_eq!(summary.count, 2);
        assert!((summary.mean - 200.0).abs() < 1.0);
        assert_eq!(summary.p50, 100);
        assert!(summary.to_string().starts_with("n=2 mean=200 ns"));
    }

    #[test]
    fn test_invalid_precision() {
        assert!(LatencyHistogram::with_precision(9).is_err());
    }

    #[test]
    fn test_format_latency() {
        assert_eq!(format_latency(500), "500 ns");
        assert_eq!(format_latency(5000), "5.00 μs");
        assert_eq!(format_latency(5_000_000), "5.00 ms");
        assert_eq!(format_latency(2_500_000_000), "2.50 s");
    }

    #[test]
    fn test_stopwatch_with_mock_clock() {
        let (clock, mock) = quanta::Clock::mock();
        let stopwatch = Stopwatch::with_clock(clock);

        let start = stopwatch.start();
        mock.increment(1_500u64);
        assert_eq!(stopwatch.elapsed_nanos(start), 1_500);
    }
}
