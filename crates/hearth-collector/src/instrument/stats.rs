//! Rolling statistics over a bounded window of observations.

use crate::buffer::RingBuffer;
use serde::Serialize;

/// Default number of observations a rolling window keeps.
pub const DEFAULT_WINDOW: usize = 1000;

/// Nearest-rank percentile of an ascending slice.
///
/// The rank is `ceil(p / 100 * n) - 1`, clamped into `[0, n - 1]`. With
/// fewer than three observations every percentile is the largest one.
/// Returns `None` for an empty slice.
///
/// # Examples
///
/// ```
/// use hearth_collector::instrument::stats::percentile;
///
/// let sorted: Vec<f64> = (1..=10).map(|v| v as f64 * 10.0).collect();
/// assert_eq!(percentile(&sorted, 50.0), Some(50.0));
/// assert_eq!(percentile(&sorted, 95.0), Some(100.0));
/// assert_eq!(percentile(&[], 50.0), None);
/// ```
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n < 3 {
        return sorted.last().copied();
    }
    let rank = (p / 100.0 * n as f64).ceil() as i64 - 1;
    let idx = rank.clamp(0, n as i64 - 1) as usize;
    Some(sorted[idx])
}

/// `part / total * 100`, or 0 when `total` is 0.
pub fn rate(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentiles {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Bounded window of `(value, flag)` observations, e.g. request duration and
/// whether it errored.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: RingBuffer<(f64, bool)>,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: RingBuffer::new(capacity),
        }
    }

    pub fn record(&mut self, value: f64, flagged: bool) {
        self.values.push((value, flagged));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn flagged(&self) -> u64 {
        self.values.iter().filter(|(_, f)| *f).count() as u64
    }

    /// Percentage of flagged observations in the window.
    pub fn flagged_rate(&self) -> f64 {
        rate(self.flagged(), self.len() as u64)
    }

    pub fn sorted_values(&self) -> Vec<f64> {
        let mut values: Vec<f64> = self.values.iter().map(|(v, _)| *v).collect();
        values.sort_by(f64::total_cmp);
        values
    }

    pub fn percentiles(&self) -> Option<Percentiles> {
        let sorted = self.sorted_values();
        Some(Percentiles {
            p50: percentile(&sorted, 50.0)?,
            p95: percentile(&sorted, 95.0)?,
            p99: percentile(&sorted, 99.0)?,
        })
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_rank_on_ten_values() {
        let sorted: Vec<f64> = (1..=10).map(|v| v as f64 * 10.0).collect();
        assert_eq!(percentile(&sorted, 50.0), Some(50.0));
        assert_eq!(percentile(&sorted, 95.0), Some(100.0));
        assert_eq!(percentile(&sorted, 99.0), Some(100.0));
        assert_eq!(percentile(&sorted, 0.0), Some(10.0));
    }

    #[test]
    fn few_samples_degrade_to_one_value() {
        assert_eq!(percentile(&[7.0], 50.0), Some(7.0));
        assert_eq!(percentile(&[7.0], 99.0), Some(7.0));
        assert_eq!(percentile(&[3.0, 9.0], 50.0), Some(9.0));
        assert_eq!(percentile(&[3.0, 9.0], 95.0), Some(9.0));
    }

    #[test]
    fn rate_with_zero_total_is_zero() {
        assert_eq!(rate(0, 0), 0.0);
        assert_eq!(rate(1, 4), 25.0);
    }

    #[test]
    fn window_percentiles_ignore_insertion_order() {
        let mut window = RollingWindow::new(20);
        for v in [100.0, 10.0, 90.0, 20.0, 80.0, 30.0, 70.0, 40.0, 60.0, 50.0] {
            window.record(v, v >= 90.0);
        }
        let p = window.percentiles().unwrap();
        assert_eq!(p.p50, 50.0);
        assert_eq!(p.p95, 100.0);
        assert_eq!(window.flagged(), 2);
        assert_eq!(window.flagged_rate(), 20.0);
    }

    #[test]
    fn window_evicts_oldest_observations() {
        let mut window = RollingWindow::new(2);
        window.record(1.0, true);
        window.record(2.0, false);
        window.record(3.0, false);
        assert_eq!(window.sorted_values(), vec![2.0, 3.0]);
        assert_eq!(window.flagged_rate(), 0.0);
        assert!(RollingWindow::new(4).percentiles().is_none());
    }
}
