//! JSON messages exchanged over the WebSocket.

use serde::{Deserialize, Serialize};

use crate::data::generator::GeneratorParams;
use crate::data::sample::Sample;
use crate::error::ProtocolError;

/// Server→client sample frame, `{"n": 12, "signal": 0.5}`.
///
/// Device firmware variants send `{"n", "deltaT", "value"}`; both decode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireSample {
    pub n: u64,
    #[serde(alias = "value")]
    pub signal: f64,
    #[serde(rename = "deltaT", default, skip_serializing_if = "Option::is_none")]
    pub delta_t: Option<f64>,
}

impl From<Sample> for WireSample {
    fn from(s: Sample) -> Self {
        Self {
            n: s.index,
            signal: s.value,
            delta_t: None,
        }
    }
}

impl From<WireSample> for Sample {
    fn from(w: WireSample) -> Self {
        Sample::new(w.n, w.signal)
    }
}

pub fn encode(sample: Sample) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(&WireSample::from(sample))?)
}

pub fn decode(text: &str) -> Result<Sample, ProtocolError> {
    let wire: WireSample = serde_json::from_str(text)?;
    Ok(wire.into())
}

/// Client→server control, sent as a text frame or an HTTP body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlMessage {
    SetChannel { channel: i64 },
    UpdateGenerator(GeneratorParams),
}

impl ControlMessage {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAck {
    pub status: String,
    pub channel: i64,
}

impl ChannelAck {
    pub fn success(channel: i64) -> Self {
        Self {
            status: "success".into(),
            channel,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusAck {
    pub status: String,
}

impl StatusAck {
    pub fn success() -> Self {
        Self {
            status: "success".into(),
        }
    }
}
