use axum::{
    extract::{ws, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use super::broadcaster::{BroadcastStatus, Broadcaster};
use super::AppState;
use crate::config::DashboardConfig;
use crate::data::generator::GeneratorParams;
use crate::error::{ParamError, ProtocolError};
use crate::protocol::{self, ChannelAck, ControlMessage, StatusAck};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetChannelRequest {
    pub channel: i64,
}

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle(socket, state))
}

async fn handle(socket: ws::WebSocket, state: AppState) {
    let client_id = state.alloc_client_id();
    let mut subscription = state.broadcaster.subscribe();
    tracing::info!(client_id, subscribers = state.broadcaster.subscriber_count(), "ws connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let send_task = tokio::spawn(async move {
        while let Some(sample) = subscription.recv().await {
            let text = match protocol::encode(sample) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(client_id, error = %e, "failed to encode sample");
                    continue;
                }
            };
            if ws_sender.send(ws::Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            ws::Message::Text(txt) => match ControlMessage::decode(&txt) {
                Ok(cmd) => {
                    if let Err(e) = apply_control(&state.broadcaster, cmd) {
                        tracing::warn!(client_id, error = %e, "rejected control message");
                    }
                }
                Err(e) => tracing::warn!(client_id, error = %e, "ignoring malformed message"),
            },
            ws::Message::Binary(bytes) => {
                tracing::warn!(client_id, error = %ProtocolError::Binary(bytes.len()), "ignoring frame");
            }
            ws::Message::Close(_) => break,
            _ => {}
        }
    }

    // dropping the send task drops its subscription
    send_task.abort();
    tracing::info!(client_id, "ws disconnected");
}

/// Apply a control message received on a socket.
pub fn apply_control(broadcaster: &Broadcaster, cmd: ControlMessage) -> Result<(), ParamError> {
    match cmd {
        ControlMessage::SetChannel { channel } => broadcaster.set_channel(channel).map(|_| ()),
        ControlMessage::UpdateGenerator(params) => broadcaster.set_generator_params(params),
    }
}

pub async fn set_channel(
    State(state): State<AppState>,
    Json(req): Json<SetChannelRequest>,
) -> Result<Json<ChannelAck>, (StatusCode, &'static str)> {
    match state.broadcaster.set_channel(req.channel) {
        Ok(channel) => Ok(Json(ChannelAck::success(channel.index()))),
        Err(e) => {
            tracing::warn!(error = %e, "rejected channel switch");
            Err((StatusCode::BAD_REQUEST, "Invalid channel"))
        }
    }
}

pub async fn update_func_gen(
    State(state): State<AppState>,
    Json(params): Json<GeneratorParams>,
) -> Result<Json<StatusAck>, (StatusCode, String)> {
    state
        .broadcaster
        .set_generator_params(params)
        .map(|()| Json(StatusAck::success()))
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
}

pub async fn config_json(State(state): State<AppState>) -> Json<DashboardConfig> {
    Json(state.dashboard.as_ref().clone())
}

pub async fn status(State(state): State<AppState>) -> Json<BroadcastStatus> {
    Json(state.broadcaster.status())
}

#[cfg(feature = "fft")]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodogramQuery {
    pub sampling_rate: Option<f64>,
    #[serde(default)]
    pub window: crate::data::fft::FFTWindow,
}

/// Welch PSD of everything broadcast since the previous request.
#[cfg(feature = "fft")]
pub async fn periodogram(
    State(state): State<AppState>,
    axum::extract::Query(query): axum::extract::Query<PeriodogramQuery>,
) -> Response {
    use crate::data::fft::{welch, DEFAULT_NFFT};

    let history = state.broadcaster.drain_history();
    if history.is_empty() {
        return no_data("No data available");
    }
    let sampling_rate = query
        .sampling_rate
        .unwrap_or_else(|| state.broadcaster.settings().params.sampling_rate);
    let signal: Vec<f64> = history.iter().map(|s| s.value).collect();
    tracing::info!(samples = signal.len(), sampling_rate, "computing periodogram");
    match welch(&signal, sampling_rate, DEFAULT_NFFT, query.window) {
        Some(p) => Json(p).into_response(),
        None => no_data("Not enough data"),
    }
}

#[cfg(feature = "fft")]
fn no_data(msg: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(serde_json::json!({ "error": msg })),
    )
        .into_response()
}
