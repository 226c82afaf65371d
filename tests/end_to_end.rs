use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use wavesense::config::{ListenConfig, ServerConfig, SourceConfig};
use wavesense::error::ServerError;
use wavesense::server::broadcaster::Broadcaster;
use wavesense::{
    connection, feed_pipeline, Channel, ClientState, IngestionPipeline, Server, TransformController,
};

struct Running {
    url: String,
    broadcaster: Broadcaster,
    stop: oneshot::Sender<()>,
}

async fn start(mut config: ServerConfig) -> Running {
    config.server = ListenConfig {
        host: "127.0.0.1".into(),
        port: 0,
    };
    let server = Server::bind(&config).await.unwrap();
    let url = format!("ws://{}/ws", server.local_addr().unwrap());
    let broadcaster = server.state().broadcaster.clone();
    let (stop, rx) = oneshot::channel();
    tokio::spawn(server.run_until(async {
        let _ = rx.await;
    }));
    Running {
        url,
        broadcaster,
        stop,
    }
}

async fn wait_for<F: Fn() -> bool>(cond: F, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    cond()
}

#[tokio::test(flavor = "multi_thread")]
async fn ten_hertz_sine_fills_window() {
    let srv = start(ServerConfig::default()).await;
    let pipeline = Arc::new(Mutex::new(IngestionPipeline::new(TransformController::default())));
    let (conn, _controls, state) = connection(srv.url.clone());
    let task = tokio::spawn(feed_pipeline(conn, pipeline.clone()));

    let p = pipeline.clone();
    assert!(wait_for(move || p.lock().unwrap().window().len() >= 10, Duration::from_secs(10)).await);
    assert_eq!(*state.borrow(), ClientState::Connected);

    let window = pipeline.lock().unwrap().window().to_vec();
    for pair in window.windows(2) {
        assert_eq!(pair[1].index, pair[0].index + 1);
    }
    for s in &window {
        assert!((-1.0..=1.0).contains(&s.value), "{} out of range", s.value);
    }
    // first sample of a fresh connection is sin(0) + bias
    assert_eq!(window[0].index, 0);
    assert!(window[0].value.abs() < 1e-12);

    task.abort();
    let _ = srv.stop.send(());
}

#[tokio::test(flavor = "multi_thread")]
async fn control_over_socket_switches_channel() {
    let srv = start(ServerConfig::default()).await;
    let pipeline = Arc::new(Mutex::new(IngestionPipeline::new(TransformController::default())));
    let (conn, controls, _state) = connection(srv.url.clone());
    let task = tokio::spawn(feed_pipeline(conn, pipeline.clone()));

    assert!(controls.set_channel(3));
    let b = srv.broadcaster.clone();
    assert!(wait_for(move || b.settings().channel == Channel::Square, Duration::from_secs(5)).await);

    // invalid requests leave the setting alone
    assert!(controls.set_channel(12));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(srv.broadcaster.settings().channel, Channel::Square);

    task.abort();
    let _ = srv.stop.send(());
}

#[tokio::test(flavor = "multi_thread")]
async fn last_client_leaving_stops_broadcast() {
    let srv = start(ServerConfig::default()).await;
    let pipeline = Arc::new(Mutex::new(IngestionPipeline::new(TransformController::default())));
    let (conn, _controls, _state) = connection(srv.url.clone());
    let task = tokio::spawn(feed_pipeline(conn, pipeline.clone()));

    let b = srv.broadcaster.clone();
    assert!(wait_for(move || b.subscriber_count() == 1, Duration::from_secs(5)).await);
    task.abort();
    let b = srv.broadcaster.clone();
    assert!(wait_for(move || b.subscriber_count() == 0, Duration::from_secs(5)).await);

    let _ = srv.stop.send(());
}

#[tokio::test(flavor = "multi_thread")]
async fn device_relay_forwards_upstream_samples() {
    let upstream = start(ServerConfig {
        sampling_rate: 50.0,
        ..Default::default()
    })
    .await;
    let relay = start(ServerConfig {
        source: SourceConfig::Device {
            url: upstream.url.clone(),
        },
        ..Default::default()
    })
    .await;

    let pipeline = Arc::new(Mutex::new(IngestionPipeline::new(TransformController::default())));
    let (conn, _controls, _state) = connection(relay.url.clone());
    let task = tokio::spawn(feed_pipeline(conn, pipeline.clone()));

    let p = pipeline.clone();
    assert!(wait_for(move || p.lock().unwrap().window().len() >= 5, Duration::from_secs(10)).await);

    task.abort();
    let _ = relay.stop.send(());
    let _ = upstream.stop.send(());
}

#[tokio::test]
async fn bind_reports_a_taken_port() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let config = ServerConfig {
        server: ListenConfig {
            host: "127.0.0.1".into(),
            port: taken.local_addr().unwrap().port(),
        },
        ..Default::default()
    };
    assert!(matches!(
        Server::bind(&config).await,
        Err(ServerError::Bind { .. })
    ));
}
