//! Argument parsing for running from the command line

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::data::export::RecordFormat;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the sample broadcast server
    Serve {
        /// Server configuration (JSON, or YAML by extension)
        #[clap(short, long, default_value = "wavesense.json")]
        config: PathBuf,
        /// Override the configured listen port
        #[clap(short, long)]
        #[clap(value_parser = clap::value_parser!(u16).range(1..))]
        port: Option<u16>,
        /// Relay samples from this device WebSocket instead of generating them
        #[clap(short, long)]
        device: Option<String>,
    },
    /// Connect to a server and print the transformed stream
    Monitor {
        /// Server WebSocket URL
        #[clap(short, long, default_value = "ws://127.0.0.1:8080/ws")]
        url: String,
        /// Dashboard configuration document
        #[clap(short, long, default_value = "config.json")]
        config: PathBuf,
        /// Conversion formula in `x`, overriding the dashboard config
        #[clap(short, long)]
        formula: Option<String>,
        /// Ask the server to switch to this channel (0-3) after connecting
        #[clap(long)]
        channel: Option<i64>,
        /// Record forwarded samples and save them on exit
        #[clap(short, long, value_enum)]
        record: Option<RecordFormat>,
        /// Directory for recordings
        #[clap(short, long, default_value = ".")]
        out_dir: PathBuf,
    },
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_overrides() {
        let args = Args::parse_from(["wavesense", "serve", "--port", "9001", "-d", "ws://dev/ws"]);
        match args.command {
            Command::Serve { config, port, device } => {
                assert_eq!(config, PathBuf::from("wavesense.json"));
                assert_eq!(port, Some(9001));
                assert_eq!(device.as_deref(), Some("ws://dev/ws"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn monitor_defaults() {
        let args = Args::parse_from(["wavesense", "-v", "monitor", "--record", "csv"]);
        match args.command {
            Command::Monitor { url, record, .. } => {
                assert_eq!(url, "ws://127.0.0.1:8080/ws");
                assert_eq!(record, Some(RecordFormat::Csv));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn port_zero_rejected() {
        assert!(Args::try_parse_from(["wavesense", "serve", "--port", "0"]).is_err());
    }
}
