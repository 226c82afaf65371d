//! Controllers for adjusting the pipeline from outside the connection task.
//!
//! A controller is a cheap cloneable handle around shared state. The connection task
//! reads the latest value once per sample; a UI or the CLI replaces it at any time and
//! subscribers are told about every change.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

pub const DEFAULT_FILTER_ALPHA: f64 = 0.2;
pub const DEFAULT_MAX_POINTS: usize = 100;

/// User-adjustable transform settings, replaced as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformParams {
    /// Added to every raw value before anything else.
    pub offset: f64,
    /// Forward every `subsampling`-th sample.
    pub subsampling: usize,
    /// Conversion formula in `x`.
    pub formula: String,
    pub filter_enabled: bool,
    /// Leaky-integrator weight of the newest sample.
    pub filter_alpha: f64,
    /// Window capacity.
    pub max_points: usize,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            offset: 0.0,
            subsampling: 1,
            formula: "x".to_string(),
            filter_enabled: false,
            filter_alpha: DEFAULT_FILTER_ALPHA,
            max_points: DEFAULT_MAX_POINTS,
        }
    }
}

impl TransformParams {
    /// Clamp every field into its valid range.
    pub fn normalized(mut self) -> Self {
        self.subsampling = self.subsampling.max(1);
        self.max_points = self.max_points.max(1);
        if !self.offset.is_finite() {
            self.offset = 0.0;
        }
        self.filter_alpha = if self.filter_alpha.is_finite() {
            self.filter_alpha.clamp(0.0, 1.0)
        } else {
            DEFAULT_FILTER_ALPHA
        };
        self
    }
}

/// Shared, replace-wholesale handle to the current [`TransformParams`].
#[derive(Clone, Default)]
pub struct TransformController {
    inner: Arc<Mutex<TransformInner>>,
}

#[derive(Default)]
struct TransformInner {
    params: TransformParams,
    listeners: Vec<Sender<TransformParams>>,
}

impl TransformController {
    pub fn new(params: TransformParams) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TransformInner {
                params: params.normalized(),
                listeners: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TransformInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current settings.
    pub fn snapshot(&self) -> TransformParams {
        self.lock().params.clone()
    }

    /// Replace the settings and notify subscribers.
    pub fn set(&self, params: TransformParams) {
        let mut inner = self.lock();
        inner.params = params.normalized();
        let current = inner.params.clone();
        inner.listeners.retain(|tx| tx.send(current.clone()).is_ok());
    }

    /// Edit a copy of the current settings and install it.
    pub fn update(&self, f: impl FnOnce(&mut TransformParams)) {
        let mut next = self.snapshot();
        f(&mut next);
        self.set(next);
    }

    /// Receive every settings change from now on.
    pub fn subscribe(&self) -> Receiver<TransformParams> {
        let (tx, rx) = std::sync::mpsc::channel();
        self.lock().listeners.push(tx);
        rx
    }
}

impl std::fmt::Debug for TransformController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformController")
            .field("params", &self.snapshot())
            .finish()
    }
}
