//! Client-side ingestion: offset, smoothing, formula, decimation, then fan-out to the
//! window, the statistics batch and the recorder.

use tracing::{debug, warn};

use crate::controllers::TransformController;
use crate::data::export::{Recorder, Recording};
use crate::data::filter::LeakyIntegrator;
use crate::data::formula::{Formula, FormulaError};
use crate::data::sample::{Sample, TransformedSample};
use crate::data::stats::{StatisticsAggregator, StatsSnapshot};
use crate::data::window::WindowBuffer;
use crate::protocol;
use crate::sink::EventSink;

/// Outcome of feeding one sample or message into the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ingest {
    /// Passed decimation; now in the window.
    Forwarded(TransformedSample),
    /// Consumed by decimation.
    Skipped,
    /// Ignored while paused.
    Paused,
    /// Message could not be decoded.
    Dropped,
}

/// Compiled formula plus the text it came from, recompiled only when the text changes.
struct CachedFormula {
    source: String,
    compiled: Result<Formula, FormulaError>,
}

pub struct IngestionPipeline {
    params: TransformController,
    filter: LeakyIntegrator,
    formula: Option<CachedFormula>,
    counter: usize,
    window: WindowBuffer<TransformedSample>,
    stats: StatisticsAggregator,
    recorder: Recorder,
    sink: Option<EventSink>,
    paused: bool,
}

impl IngestionPipeline {
    pub fn new(params: TransformController) -> Self {
        let capacity = params.snapshot().max_points;
        Self {
            params,
            filter: LeakyIntegrator::new(),
            formula: None,
            counter: 0,
            window: WindowBuffer::new(capacity),
            stats: StatisticsAggregator::default(),
            recorder: Recorder::new(),
            sink: None,
            paused: false,
        }
    }

    /// Send forwarded samples and statistics to `sink` as well.
    pub fn with_sink(mut self, sink: EventSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_statistics(mut self, stats: StatisticsAggregator) -> Self {
        self.stats = stats;
        self
    }

    pub fn controller(&self) -> &TransformController {
        &self.params
    }

    pub fn window(&self) -> &WindowBuffer<TransformedSample> {
        &self.window
    }

    /// Window contents as `[index, value]` pairs, oldest first.
    pub fn points(&self) -> Vec<[f64; 2]> {
        self.window.iter().map(TransformedSample::as_point).collect()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Lock screen: while paused incoming samples leave no trace.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Change the window capacity, keeping the most recent samples.
    pub fn resize_window(&mut self, capacity: usize) {
        self.params.update(|p| p.max_points = capacity);
        self.window.resize(capacity);
    }

    /// Discard the partial statistics batch.
    pub fn restart_statistics(&mut self) {
        self.stats.start();
    }

    pub fn start_recording(&mut self) {
        self.recorder.start();
    }

    pub fn stop_recording(&mut self) -> Option<Recording> {
        self.recorder.stop()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    /// Decode a wire message and ingest it. Malformed messages are dropped.
    pub fn on_message(&mut self, text: &str) -> Ingest {
        match protocol::decode(text) {
            Ok(sample) => self.on_sample(sample),
            Err(e) => {
                warn!(error = %e, "dropping malformed message");
                Ingest::Dropped
            }
        }
    }

    pub fn on_sample(&mut self, sample: Sample) -> Ingest {
        if self.paused {
            return Ingest::Paused;
        }
        let p = self.params.snapshot();
        if self.window.capacity() != p.max_points {
            self.window.resize(p.max_points);
        }

        let shifted = sample.value + p.offset;
        self.filter.seed(shifted);
        let smoothed = if p.filter_enabled {
            self.filter.step(shifted, p.filter_alpha)
        } else {
            shifted
        };
        let value = self.apply_formula(&p.formula, smoothed);

        self.counter += 1;
        if self.counter < p.subsampling {
            return Ingest::Skipped;
        }
        self.counter = 0;

        let out = TransformedSample {
            index: sample.index,
            raw: sample.value,
            value,
        };
        self.window.push(out);
        self.recorder.record(&out);
        if let Some(snapshot) = self.stats.process(&out) {
            self.publish_stats(snapshot);
        }
        if let Some(sink) = &self.sink {
            let _ = sink.send_sample(out);
        }
        Ingest::Forwarded(out)
    }

    fn publish_stats(&self, snapshot: StatsSnapshot) {
        debug!(%snapshot, "statistics batch complete");
        if let Some(sink) = &self.sink {
            let _ = sink.send_stats(snapshot);
        }
    }

    fn apply_formula(&mut self, source: &str, x: f64) -> f64 {
        let stale = self.formula.as_ref().map_or(true, |c| c.source != source);
        if stale {
            let compiled = Formula::parse(source);
            if let Err(e) = &compiled {
                warn!(formula = source, error = %e, "invalid formula, showing unconverted values");
            }
            self.formula = Some(CachedFormula {
                source: source.to_string(),
                compiled,
            });
        }
        match self.formula.as_ref().map(|c| &c.compiled) {
            Some(Ok(f)) => f.eval(x).unwrap_or_else(|e| {
                debug!(formula = source, x, error = %e, "formula evaluation failed");
                x
            }),
            _ => x,
        }
    }
}
