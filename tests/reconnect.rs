use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use wavesense::protocol::ControlMessage;
use wavesense::{connection, feed_pipeline, ClientState, IngestionPipeline, TransformController};

type Session = WebSocketStream<TcpStream>;

async fn accept_session(listener: &TcpListener) -> Session {
    let (tcp, _) = listener.accept().await.unwrap();
    accept_async(tcp).await.unwrap()
}

async fn expect_channel_request(ws: &mut Session, channel: i64) {
    match ws.next().await {
        Some(Ok(Message::Text(text))) => {
            let v: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(v, serde_json::json!({ "channel": channel }));
        }
        other => panic!("expected a channel request, got {other:?}"),
    }
}

async fn send_sample(ws: &mut Session, n: u64, signal: f64) {
    ws.send(Message::Text(format!(r#"{{"n":{n},"signal":{signal}}}"#)))
        .await
        .unwrap();
}

async fn wait_for<F: Fn() -> bool>(cond: F, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

#[tokio::test(flavor = "multi_thread")]
async fn resumes_after_server_restart_on_same_port() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let pipeline = Arc::new(Mutex::new(IngestionPipeline::new(TransformController::default())));
    let (conn, _controls, state) = connection(format!("ws://{addr}/ws"));
    let conn = conn
        .with_reconnect_delay(Duration::from_millis(100))
        .with_on_connect(ControlMessage::SetChannel { channel: 2 });
    let task = tokio::spawn(feed_pipeline(conn, pipeline.clone()));

    let mut ws = accept_session(&listener).await;
    expect_channel_request(&mut ws, 2).await;
    send_sample(&mut ws, 0, 0.5).await;
    let p = pipeline.clone();
    assert!(wait_for(move || p.lock().unwrap().window().len() == 1, Duration::from_secs(5)).await);
    assert_eq!(*state.borrow(), ClientState::Connected);

    // stop the server: no listener, session closed
    drop(listener);
    let _ = ws.close(None).await;
    drop(ws);
    let s = state.clone();
    assert!(wait_for(move || *s.borrow() == ClientState::Reconnecting, Duration::from_secs(5)).await);

    // a few attempts fail while nothing listens
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(*state.borrow(), ClientState::Reconnecting);

    let listener = TcpListener::bind(addr).await.unwrap();
    let mut ws = accept_session(&listener).await;
    // the channel request is repeated for the new session
    expect_channel_request(&mut ws, 2).await;
    send_sample(&mut ws, 1, -0.25).await;
    let p = pipeline.clone();
    assert!(wait_for(move || p.lock().unwrap().window().len() == 2, Duration::from_secs(5)).await);
    assert_eq!(*state.borrow(), ClientState::Connected);

    let indices: Vec<u64> = pipeline
        .lock()
        .unwrap()
        .window()
        .iter()
        .map(|s| s.index)
        .collect();
    assert_eq!(indices, vec![0, 1]);

    task.abort();
}
