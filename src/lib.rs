//! WaveSense crate root: module wiring and re-exports.
//!
//! - `server`: waveform broadcaster, WebSocket stream and HTTP control API
//! - `client`: reconnecting WebSocket client
//! - `pipeline`: per-sample offset, smoothing, formula and decimation
//! - `data`: generator, filter, formula, window, statistics, export and periodogram
//! - `sink`: event channel from the pipeline to whatever displays it
//! - `controllers`: shared transform settings
//! - `config`: server and dashboard configuration documents

pub mod args;
pub mod client;
pub mod config;
pub mod controllers;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod protocol;
pub mod server;
pub mod sink;

pub use client::{connection, feed_pipeline, ClientState, Connection, ControlHandle};
pub use config::{DashboardConfig, ServerConfig};
pub use controllers::{TransformController, TransformParams};
pub use data::generator::{Channel, GeneratorParams};
pub use data::sample::{Sample, TransformedSample};
pub use pipeline::{Ingest, IngestionPipeline};
pub use server::broadcaster::{Broadcaster, IndexPolicy, TickSource};
pub use server::Server;
pub use sink::{channel_events, EventSink, PipelineEvent};
