use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Last-seen timestamps for push-style targets.
///
/// Written only by the heartbeat listeners, read by the passive checker and
/// the snapshot builder. Last write wins; there is no ordering dependency
/// because a recorded beat only feeds the next probe of that target.
#[derive(Clone, Default)]
pub struct HeartbeatTable {
    inner: Arc<Mutex<HashMap<String, SystemTime>>>,
}

impl HeartbeatTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str, now: SystemTime) {
        self.inner.lock().expect("heartbeat table poisoned").insert(name.to_string(), now);
    }

    pub fn last_beat(&self, name: &str) -> Option<SystemTime> {
        self.inner.lock().expect("heartbeat table poisoned").get(name).copied()
    }
}

/// Bind one passive listener for a heartbeat target and start serving it.
///
/// Any inbound connection counts as a positive liveness signal: the table
/// timestamp is recorded at accept time and the scheduler is signalled over
/// `signal`. Whatever the client sends afterwards is read and discarded;
/// the connection closing carries no meaning.
///
/// Returns the bound address (useful when `port` is 0) and the accept-loop
/// task handle.
pub async fn spawn_listener(
    name: String,
    port: u16,
    table: HeartbeatTable,
    signal: mpsc::Sender<String>,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    let addr = listener.local_addr()?;
    info!(target_name = %name, %addr, "heartbeat listener bound");

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    table.record(&name, SystemTime::now());
                    debug!(target_name = %name, %peer, "heartbeat received");
                    // A full channel just means the next poll tick picks the
                    // state change up instead.
                    let _ = signal.try_send(name.clone());
                    tokio::spawn(drain(stream));
                }
                Err(err) => {
                    // One bad client must not stop the listener.
                    warn!(target_name = %name, "heartbeat accept error: {err}");
                }
            }
        }
    });

    Ok((addr, handle))
}

async fn drain(mut stream: TcpStream) {
    let mut buf = [0u8; 512];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
    }
}
