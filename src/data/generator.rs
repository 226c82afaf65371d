//! Periodic test-signal generator.
//!
//! Every shape is normalized to `[-1, 1]` before bias and noise are added, so a
//! generator with zero bias and zero noise never leaves that range.

use std::f64::consts::PI;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ParamError;

/// Waveform shape selected by the channel index carried in control requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Channel {
    #[default]
    Sine,
    Sawtooth,
    Triangle,
    /// 50 % duty cycle rectangle.
    Square,
}

impl Channel {
    pub const ALL: &'static [Channel] = &[
        Channel::Sine,
        Channel::Sawtooth,
        Channel::Triangle,
        Channel::Square,
    ];

    /// Lenient mapping used on the generation path: anything unknown is a sine.
    pub fn from_index_or_sine(index: i64) -> Self {
        Self::try_from(index).unwrap_or(Channel::Sine)
    }

    pub fn index(self) -> i64 {
        match self {
            Channel::Sine => 0,
            Channel::Sawtooth => 1,
            Channel::Triangle => 2,
            Channel::Square => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Channel::Sine => "sine",
            Channel::Sawtooth => "sawtooth",
            Channel::Triangle => "triangle",
            Channel::Square => "square",
        }
    }

    /// Shape value in `[-1, 1]` at `phase` (fraction of a period, `[0, 1)`).
    pub fn shape(self, phase: f64) -> f64 {
        match self {
            Channel::Sine => (2.0 * PI * phase).sin(),
            Channel::Sawtooth => -1.0 + 2.0 * phase,
            Channel::Triangle => {
                if phase < 0.5 {
                    -1.0 + 4.0 * phase
                } else {
                    3.0 - 4.0 * phase
                }
            }
            Channel::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

impl TryFrom<i64> for Channel {
    type Error = ParamError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Channel::Sine),
            1 => Ok(Channel::Sawtooth),
            2 => Ok(Channel::Triangle),
            3 => Ok(Channel::Square),
            other => Err(ParamError::InvalidChannel(other)),
        }
    }
}

impl From<Channel> for i64 {
    fn from(value: Channel) -> Self {
        value.index()
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ch{} ({})", self.index(), self.label())
    }
}

/// Function generator settings shared by every channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorParams {
    /// Fundamental frequency in Hz.
    pub frequency: f64,
    /// Samples per second; also the broadcast tick rate.
    pub sampling_rate: f64,
    /// Peak-to-peak amplitude of the uniform noise added to every sample.
    pub noise: f64,
    pub bias: f64,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            frequency: 1.0,
            sampling_rate: 10.0,
            noise: 0.0,
            bias: 0.0,
        }
    }
}

impl GeneratorParams {
    pub fn validate(&self) -> Result<(), ParamError> {
        for (name, v) in [
            ("frequency", self.frequency),
            ("samplingRate", self.sampling_rate),
            ("noise", self.noise),
            ("bias", self.bias),
        ] {
            if !v.is_finite() {
                return Err(ParamError::NonFinite(name));
            }
        }
        if self.frequency <= 0.0 {
            return Err(ParamError::NonPositiveFrequency(self.frequency));
        }
        if self.sampling_rate <= 0.0 {
            return Err(ParamError::NonPositiveSamplingRate(self.sampling_rate));
        }
        if self.noise < 0.0 {
            return Err(ParamError::NegativeNoise(self.noise));
        }
        self.tick_period()?;
        Ok(())
    }

    /// Time between broadcast ticks. Rates whose period is zero or does not fit a
    /// [`Duration`] are rejected.
    pub fn tick_period(&self) -> Result<Duration, ParamError> {
        match Duration::try_from_secs_f64(1.0 / self.sampling_rate) {
            Ok(period) if !period.is_zero() => Ok(period),
            _ => Err(ParamError::SamplingRateOutOfRange(self.sampling_rate)),
        }
    }

    /// Position within the current period for sample `index`.
    pub fn phase(&self, index: u64) -> f64 {
        let t = index as f64 / self.sampling_rate;
        let period = 1.0 / self.frequency;
        (t / period).rem_euclid(1.0)
    }
}

/// Generate sample `index` for `channel`, drawing the noise term from `rng`.
pub fn generate<R: Rng + ?Sized>(
    index: u64,
    channel: Channel,
    params: &GeneratorParams,
    rng: &mut R,
) -> f64 {
    let draw = if params.noise > 0.0 {
        rng.gen_range(-0.5..0.5)
    } else {
        0.0
    };
    generate_with_draw(index, channel, params, draw)
}

/// Deterministic variant of [`generate`]: `draw` is the uniform noise draw in `[-0.5, 0.5)`.
pub fn generate_with_draw(index: u64, channel: Channel, params: &GeneratorParams, draw: f64) -> f64 {
    channel.shape(params.phase(index)) + params.bias + draw * params.noise
}
