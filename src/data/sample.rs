use serde::{Deserialize, Serialize};

/// A single generated or device-read sample: `index` counts ticks since the stream began.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub index: u64,
    pub value: f64,
}

impl Sample {
    pub fn new(index: u64, value: f64) -> Self {
        Self { index, value }
    }
}

/// A sample after offset, smoothing and formula evaluation.
///
/// `index` is always the raw input index; decimation never renumbers samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformedSample {
    pub index: u64,
    /// Value as it arrived on the wire.
    pub raw: f64,
    /// Value after offset, filter and formula.
    pub value: f64,
}

impl TransformedSample {
    pub fn as_point(&self) -> [f64; 2] {
        [self.index as f64, self.value]
    }
}
