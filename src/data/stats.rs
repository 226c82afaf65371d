//! Batch statistics over the forwarded sample stream.

use serde::{Deserialize, Serialize};

use super::sample::TransformedSample;

/// Samples per statistics batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Inputs are volts, snapshots are reported in millivolts.
pub const DEFAULT_SCALE: f64 = 1000.0;
pub const DEFAULT_UNIT: &str = "mV";

/// Summary of one completed batch, already scaled to the display unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub max: f64,
    pub min: f64,
    pub mean: f64,
    pub rms: f64,
    pub unit: String,
    /// Index of the last sample in the batch.
    pub last_index: u64,
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let u = &self.unit;
        write!(
            f,
            "max {:.2} {u}, min {:.2} {u}, mean {:.2} {u}, rms {:.2} {u}",
            self.max, self.min, self.mean, self.rms
        )
    }
}

#[derive(Debug, Clone)]
pub struct StatisticsAggregator {
    batch: Vec<(u64, f64)>,
    batch_size: usize,
    scale: f64,
    unit: String,
}

impl Default for StatisticsAggregator {
    fn default() -> Self {
        Self::with_unit(DEFAULT_BATCH_SIZE, DEFAULT_SCALE, DEFAULT_UNIT)
    }
}

impl StatisticsAggregator {
    /// Unitless aggregator: values are multiplied by `scale` only.
    pub fn new(batch_size: usize, scale: f64) -> Self {
        Self::with_unit(batch_size, scale, "")
    }

    pub fn with_unit(batch_size: usize, scale: f64, unit: impl Into<String>) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch: Vec::with_capacity(batch_size),
            batch_size,
            scale,
            unit: unit.into(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    /// Drop the partial batch without emitting.
    pub fn start(&mut self) {
        self.batch.clear();
    }

    /// Add one sample; returns the snapshot when the batch completes.
    pub fn process(&mut self, sample: &TransformedSample) -> Option<StatsSnapshot> {
        self.batch.push((sample.index, sample.value));
        if self.batch.len() < self.batch_size {
            return None;
        }
        let snapshot = self.summarize();
        self.batch.clear();
        Some(snapshot)
    }

    fn summarize(&self) -> StatsSnapshot {
        let n = self.batch.len() as f64;
        let mut max = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for &(_, v) in &self.batch {
            let v = v * self.scale;
            max = max.max(v);
            min = min.min(v);
            sum += v;
            sum_sq += v * v;
        }
        StatsSnapshot {
            max,
            min,
            mean: sum / n,
            rms: (sum_sq / n).sqrt(),
            unit: self.unit.clone(),
            last_index: self.batch.last().map(|&(i, _)| i).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(index: u64, value: f64) -> TransformedSample {
        TransformedSample {
            index,
            raw: value,
            value,
        }
    }

    #[test]
    fn one_to_hundred() {
        let mut agg = StatisticsAggregator::new(100, 1.0);
        let mut out = None;
        for i in 1..=100u64 {
            let r = agg.process(&ts(i, i as f64));
            if i < 100 {
                assert!(r.is_none());
            } else {
                out = r;
            }
        }
        let s = out.expect("snapshot after 100 samples");
        assert_eq!(s.max, 100.0);
        assert_eq!(s.min, 1.0);
        assert!((s.mean - 50.5).abs() < 1e-12);
        let mean_sq: f64 = (1..=100).map(|v| (v * v) as f64).sum::<f64>() / 100.0;
        assert!((s.rms - mean_sq.sqrt()).abs() < 1e-9);
        assert_eq!(s.last_index, 100);
        assert_eq!(agg.pending(), 0);
    }

    #[test]
    fn default_reports_millivolts() {
        let mut agg = StatisticsAggregator::default();
        let mut last = None;
        for i in 0..100 {
            last = agg.process(&ts(i, 0.5));
        }
        let s = last.unwrap();
        assert_eq!(s.max, 500.0);
        assert_eq!(s.rms, 500.0);
        assert_eq!(s.unit, "mV");
        assert_eq!(
            s.to_string(),
            "max 500.00 mV, min 500.00 mV, mean 500.00 mV, rms 500.00 mV"
        );
    }

    #[test]
    fn no_sample_counted_twice() {
        let mut agg = StatisticsAggregator::new(3, 1.0);
        let emitted: Vec<_> = (0..9)
            .filter_map(|i| agg.process(&ts(i, i as f64)))
            .collect();
        assert_eq!(emitted.len(), 3);
        assert_eq!(emitted[1].min, 3.0);
        assert_eq!(emitted[1].max, 5.0);
    }

    #[test]
    fn start_discards_partial_batch() {
        let mut agg = StatisticsAggregator::new(4, 1.0);
        agg.process(&ts(0, 9.0));
        agg.process(&ts(1, 9.0));
        agg.start();
        assert_eq!(agg.pending(), 0);
        let s = (0..4).filter_map(|i| agg.process(&ts(i, 1.0))).next().unwrap();
        assert_eq!(s.max, 1.0);
    }
}
