use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use wavesense::args::{convert_filter, Args, Command};
use wavesense::config::{DashboardConfig, ServerConfig, SourceConfig};
use wavesense::data::export::RecordFormat;
use wavesense::data::formula::Formula;
use wavesense::protocol::ControlMessage;
use wavesense::{
    channel_events, connection, feed_pipeline, ClientState, IngestionPipeline, PipelineEvent,
    Server, TransformController,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(convert_filter(args.verbose.log_level_filter()))
        .init();

    match args.command {
        Command::Serve {
            config,
            port,
            device,
        } => serve(&config, port, device).await,
        Command::Monitor {
            url,
            config,
            formula,
            channel,
            record,
            out_dir,
        } => monitor(url, &config, formula, channel, record, out_dir).await,
    }
}

async fn serve(path: &Path, port: Option<u16>, device: Option<String>) -> anyhow::Result<()> {
    let mut config = ServerConfig::load(path)
        .with_context(|| format!("loading server config {}", path.display()))?;
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(url) = device {
        config.source = SourceConfig::Device { url };
    }
    let server = Server::bind(&config).await?;
    info!(
        addr = %server.local_addr()?,
        channel = %config.channel,
        sampling_rate = config.sampling_rate,
        "wavesense server ready"
    );
    server.run().await?;
    Ok(())
}

async fn monitor(
    url: String,
    config: &Path,
    formula: Option<String>,
    channel: Option<i64>,
    record: Option<RecordFormat>,
    out_dir: PathBuf,
) -> anyhow::Result<()> {
    let dashboard = DashboardConfig::load_or_default(config);
    let mut params = dashboard.transform_params();
    if let Some(f) = formula {
        params.formula = f;
    }
    if let Err(e) = Formula::parse(&params.formula) {
        warn!(formula = %params.formula, error = %e, "formula will be ignored");
    }

    let (sink, mut events) = channel_events();
    let mut pipeline = IngestionPipeline::new(TransformController::new(params)).with_sink(sink.clone());
    if record.is_some() {
        pipeline.start_recording();
    }
    let pipeline = Arc::new(Mutex::new(pipeline));

    let (conn, _controls, mut state) = connection(url);
    let conn = conn.with_on_connect(ControlMessage::SetChannel {
        channel: channel.unwrap_or(dashboard.channel.index()),
    });
    let conn_task = tokio::spawn(feed_pipeline(conn, pipeline.clone()));
    let state_task = tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let current = *state.borrow();
            if sink.send_state(current).is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            ev = events.recv() => match ev {
                Some(PipelineEvent::Sample(s)) => {
                    println!("{:>8} {:>12.4} {}", s.index, s.value, bar(s.value, dashboard.y_range, 40));
                }
                Some(PipelineEvent::Stats(stats)) => println!("{stats}"),
                Some(PipelineEvent::Connection(ClientState::Reconnecting)) => {
                    warn!("connection lost, reconnecting");
                }
                Some(PipelineEvent::Connection(s)) => info!(state = ?s, "connection state"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    conn_task.abort();
    state_task.abort();

    if let Some(format) = record {
        let recording = pipeline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop_recording();
        if let Some(recording) = recording {
            let path = recording
                .save_in(&out_dir, format)
                .with_context(|| format!("saving recording to {}", out_dir.display()))?;
            info!(path = %path.display(), samples = recording.len(), "recording saved");
        }
    }
    Ok(())
}

/// Horizontal bar for `value` on a `-y_range..=y_range` axis.
fn bar(value: f64, y_range: f64, width: usize) -> String {
    let span = if y_range > 0.0 { y_range } else { 1.0 };
    let t = ((value + span) / (2.0 * span)).clamp(0.0, 1.0);
    let pos = (t * (width - 1) as f64).round() as usize;
    let mut line = vec![' '; width];
    line[width / 2] = '|';
    line[pos] = '*';
    line.into_iter().collect()
}
