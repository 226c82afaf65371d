//! Configuration documents for the server and the dashboard client.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::controllers::{TransformParams, DEFAULT_FILTER_ALPHA, DEFAULT_MAX_POINTS};
use crate::data::generator::{Channel, GeneratorParams};
use crate::error::ConfigError;
use crate::server::broadcaster::IndexPolicy;

// ─────────────────────────────────────────────────────────────────────────────
// Dashboard document (served as /config.json)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub enable: bool,
}

/// Start-up settings for a dashboard client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardConfig {
    /// Initial offset added to every sample.
    pub bias: f64,
    /// Plot spans `-y_range..=y_range`.
    pub y_range: f64,
    pub max_points: usize,
    pub subsampling: usize,
    pub channel: Channel,
    pub alpha: f64,
    pub filter: FilterConfig,
    pub formula: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bias: 0.0,
            y_range: 1.0,
            max_points: DEFAULT_MAX_POINTS,
            subsampling: 1,
            channel: Channel::Sine,
            alpha: DEFAULT_FILTER_ALPHA,
            filter: FilterConfig::default(),
            formula: "x".to_string(),
        }
    }
}

impl DashboardConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = read(path)?;
        Self::from_json_str(&text)
    }

    /// Load `path`, falling back to the built-in defaults on any failure.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "using default dashboard config");
            Self::default()
        })
    }

    /// Initial transform settings for the ingestion pipeline.
    pub fn transform_params(&self) -> TransformParams {
        TransformParams {
            offset: self.bias,
            subsampling: self.subsampling,
            formula: self.formula.clone(),
            filter_enabled: self.filter.enable,
            filter_alpha: self.alpha,
            max_points: self.max_points,
        }
        .normalized()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server document
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Where broadcast samples come from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Built-in waveform generator driven by the broadcast timer.
    #[default]
    Generator,
    /// Relay samples read from an upstream device WebSocket.
    Device { url: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub server: ListenConfig,
    pub sampling_rate: f64,
    pub frequency: f64,
    pub noise: f64,
    pub bias: f64,
    pub channel: Channel,
    pub index_policy: IndexPolicy,
    pub source: SourceConfig,
    pub dashboard: DashboardConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let g = GeneratorParams::default();
        Self {
            server: ListenConfig::default(),
            sampling_rate: g.sampling_rate,
            frequency: g.frequency,
            noise: g.noise,
            bias: g.bias,
            channel: Channel::Sine,
            index_policy: IndexPolicy::default(),
            source: SourceConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parse by extension: `.yaml`/`.yml` as YAML, anything else as JSON.
    pub fn from_str_for(path: &Path, text: &str) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(text)?),
            _ => Ok(serde_json::from_str(text)?),
        }
    }

    /// A missing file yields the defaults; an unreadable or malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = read(path)?;
        Self::from_str_for(path, &text)
    }

    pub fn generator_params(&self) -> GeneratorParams {
        GeneratorParams {
            frequency: self.frequency,
            sampling_rate: self.sampling_rate,
            noise: self.noise,
            bias: self.bias,
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
