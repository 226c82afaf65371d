/// First-order exponential smoother, `y[t] = α·x[t] + (1-α)·y[t-1]`.
///
/// The state stays `None` until the first sample arrives, so a genuine zero input is
/// never mistaken for "not started".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeakyIntegrator {
    previous: Option<f64>,
}

impl LeakyIntegrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Smoothing factor equivalent to an RC lowpass with cutoff `cutoff_hz` sampled every `dt` seconds.
    pub fn alpha_for_cutoff(cutoff_hz: f64, dt: f64) -> f64 {
        let rc = 1.0 / (2.0 * std::f64::consts::PI * cutoff_hz.max(1e-9));
        (dt / (rc + dt)).clamp(0.0, 1.0)
    }

    pub fn previous(&self) -> Option<f64> {
        self.previous
    }

    pub fn is_seeded(&self) -> bool {
        self.previous.is_some()
    }

    /// Seed the state with `x` unless it already holds a value.
    pub fn seed(&mut self, x: f64) {
        self.previous.get_or_insert(x);
    }

    pub fn step(&mut self, x: f64, alpha: f64) -> f64 {
        let prev = *self.previous.get_or_insert(x);
        let y = alpha * x + (1.0 - alpha) * prev;
        self.previous = Some(y);
        y
    }
}
