// Welch power-spectral-density estimate over the broadcast sample history.
// Window weights and the rustfft planner usage follow the scope's FFT view.
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

/// Segment length used by the periodogram endpoint.
pub const DEFAULT_NFFT: usize = 1024;

/// Supported FFT window functions for spectral analysis.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FFTWindow {
    /// Rectangular (no windowing)
    Rect,
    #[default]
    Hann,
    Hamming,
    Blackman,
}

impl FFTWindow {
    /// Periodic window weight for sample `n` of a `len`-sample segment.
    pub fn weight(&self, n: usize, len: usize) -> f64 {
        let phase = 2.0 * std::f64::consts::PI * n as f64 / len as f64;
        match self {
            FFTWindow::Rect => 1.0,
            FFTWindow::Hann => 0.5 - 0.5 * phase.cos(),
            FFTWindow::Hamming => 0.54 - 0.46 * phase.cos(),
            FFTWindow::Blackman => 0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos(),
        }
    }
}

/// One-sided power spectral density, `power[k]` in V²/Hz at `frequencies[k]` Hz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Periodogram {
    pub frequencies: Vec<f64>,
    pub power: Vec<f64>,
    pub sampling_rate: f64,
    pub segments: usize,
}

impl Periodogram {
    /// Frequency of the strongest non-DC bin.
    pub fn peak_frequency(&self) -> Option<f64> {
        self.power
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| self.frequencies[k])
    }
}

/// Welch estimate: the mean is removed, the signal is cut into `nfft`-sample segments
/// with 50% overlap (a shorter signal becomes one zero-padded segment), and the windowed
/// segment spectra are averaged.
///
/// Returns `None` for fewer than two samples or a non-positive sampling rate.
pub fn welch(
    signal: &[f64],
    sampling_rate: f64,
    nfft: usize,
    window: FFTWindow,
) -> Option<Periodogram> {
    if signal.len() < 2 || !(sampling_rate > 0.0) || nfft < 2 {
        return None;
    }
    let mean = signal.iter().sum::<f64>() / signal.len() as f64;

    let seg_len = nfft.min(signal.len());
    let step = (seg_len / 2).max(1);
    let weights: Vec<f64> = (0..seg_len).map(|n| window.weight(n, seg_len)).collect();
    let norm: f64 = weights.iter().map(|w| w * w).sum::<f64>() * sampling_rate;
    if norm <= 0.0 {
        return None;
    }

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nfft);
    let bins = nfft / 2 + 1;
    let mut acc = vec![0.0; bins];
    let mut buf = vec![Complex { re: 0.0, im: 0.0 }; nfft];
    let mut segments = 0usize;

    let mut start = 0;
    while start + seg_len <= signal.len() {
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = if i < seg_len {
                Complex {
                    re: (signal[start + i] - mean) * weights[i],
                    im: 0.0,
                }
            } else {
                Complex { re: 0.0, im: 0.0 }
            };
        }
        fft.process(&mut buf);
        for (k, a) in acc.iter_mut().enumerate() {
            *a += buf[k].norm_sqr();
        }
        segments += 1;
        start += step;
    }

    let nyquist_bin = if nfft % 2 == 0 { Some(nfft / 2) } else { None };
    let power = acc
        .into_iter()
        .enumerate()
        .map(|(k, p)| {
            let p = p / (segments as f64 * norm);
            if k == 0 || Some(k) == nyquist_bin {
                p
            } else {
                2.0 * p
            }
        })
        .collect();
    let frequencies = (0..bins)
        .map(|k| k as f64 * sampling_rate / nfft as f64)
        .collect();

    Some(Periodogram {
        frequencies,
        power,
        sampling_rate,
        segments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::generator::{generate_with_draw, Channel, GeneratorParams};

    #[test]
    fn hann_is_zero_at_the_edge() {
        assert_eq!(FFTWindow::Hann.weight(0, 16), 0.0);
        assert!((FFTWindow::Hann.weight(8, 16) - 1.0).abs() < 1e-12);
        assert_eq!(FFTWindow::Rect.weight(3, 16), 1.0);
    }

    #[test]
    fn peak_at_generator_frequency() {
        let params = GeneratorParams {
            frequency: 1.0,
            sampling_rate: 10.0,
            noise: 0.0,
            bias: 0.3,
        };
        let signal: Vec<f64> = (0..4000)
            .map(|n| generate_with_draw(n, Channel::Sine, &params, 0.0))
            .collect();
        let p = welch(&signal, params.sampling_rate, DEFAULT_NFFT, FFTWindow::Hann).unwrap();
        assert_eq!(p.frequencies.len(), DEFAULT_NFFT / 2 + 1);
        assert!(p.segments > 1);
        let peak = p.peak_frequency().unwrap();
        assert!((peak - 1.0).abs() < 0.02, "peak at {peak}");
        // bias removed with the mean
        assert!(p.power[0] < p.power.iter().cloned().fold(0.0, f64::max) * 1e-2);
    }

    #[test]
    fn short_signal_is_zero_padded() {
        let signal: Vec<f64> = (0..100).map(|i| (i as f64 * 0.7).sin()).collect();
        let p = welch(&signal, 50.0, DEFAULT_NFFT, FFTWindow::Rect).unwrap();
        assert_eq!(p.segments, 1);
        assert_eq!(p.power.len(), DEFAULT_NFFT / 2 + 1);
        assert_eq!(*p.frequencies.last().unwrap(), 25.0);
    }

    #[test]
    fn rejects_degenerate_input() {
        assert!(welch(&[], 10.0, DEFAULT_NFFT, FFTWindow::Hann).is_none());
        assert!(welch(&[1.0], 10.0, DEFAULT_NFFT, FFTWindow::Hann).is_none());
        assert!(welch(&[1.0, 2.0], 0.0, DEFAULT_NFFT, FFTWindow::Hann).is_none());
    }
}
