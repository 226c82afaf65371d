use std::ops::ControlFlow;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::broadcaster::Broadcaster;
use crate::client::connection;
use crate::protocol;

/// Read samples from an upstream device socket and republish them to our subscribers.
///
/// The upstream link reconnects on its own, so the task runs until aborted.
pub fn spawn_device_relay(url: String, broadcaster: Broadcaster) -> JoinHandle<()> {
    info!(%url, "relaying device samples");
    let (conn, _controls, _state) = connection(url);
    tokio::spawn(conn.run(move |text| {
        match protocol::decode(text) {
            Ok(sample) => {
                broadcaster.publish(sample);
            }
            Err(e) => warn!(error = %e, "dropping malformed device message"),
        }
        ControlFlow::Continue(())
    }))
}
