//! Sample broadcast server: one WebSocket stream per client plus a small HTTP control API.

pub mod broadcaster;
pub mod relay;
pub mod routes;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use self::broadcaster::{BroadcastSettings, Broadcaster, TickSource};
use crate::config::{DashboardConfig, ServerConfig, SourceConfig};
use crate::error::ServerError;

#[derive(Clone)]
pub struct AppState {
    pub broadcaster: Broadcaster,
    pub dashboard: Arc<DashboardConfig>,
    next_client_id: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(broadcaster: Broadcaster, dashboard: DashboardConfig) -> Self {
        Self {
            broadcaster,
            dashboard: Arc::new(dashboard),
            next_client_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Validate the generator settings and build the broadcaster the config asks for.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        let params = config.generator_params();
        params.validate()?;
        let tick_source = match config.source {
            SourceConfig::Generator => TickSource::Timer,
            SourceConfig::Device { .. } => TickSource::External,
        };
        let settings = BroadcastSettings {
            channel: config.channel,
            params,
        };
        let broadcaster = Broadcaster::new(settings, tick_source, config.index_policy);
        Ok(Self::new(broadcaster, config.dashboard.clone()))
    }

    pub fn alloc_client_id(&self) -> u64 {
        self.next_client_id.fetch_add(1, Ordering::Relaxed)
    }
}

pub fn router(state: AppState) -> Router {
    let router = Router::new()
        .route("/", get(routes::upgrade))
        .route("/ws", get(routes::upgrade))
        .route("/set-channel", post(routes::set_channel))
        .route("/update-func-gen", post(routes::update_func_gen))
        .route("/config.json", get(routes::config_json))
        .route("/status", get(routes::status));
    #[cfg(feature = "fft")]
    let router = router.route("/periodogram", get(routes::periodogram));
    router.with_state(state)
}

pub struct Server {
    state: AppState,
    listener: TcpListener,
    device_url: Option<String>,
}

impl Server {
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let state = AppState::from_config(config)?;
        let wanted = config.listen_addr();
        let addr = tokio::net::lookup_host(wanted.as_str())
            .await?
            .next()
            .ok_or_else(|| ServerError::Address(wanted.clone()))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let device_url = match &config.source {
            SourceConfig::Device { url } => Some(url.clone()),
            SourceConfig::Generator => None,
        };
        Ok(Self {
            state,
            listener,
            device_url,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until Ctrl-C.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let relay: Option<JoinHandle<()>> = self
            .device_url
            .map(|url| relay::spawn_device_relay(url, self.state.broadcaster.clone()));
        info!(addr = %self.listener.local_addr()?, "listening");
        let result = axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await;
        if let Some(handle) = relay {
            handle.abort();
        }
        Ok(result?)
    }
}
