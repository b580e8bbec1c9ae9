//! Web transport for the live dashboard.
//!
//! `GET /api/status` serves the current snapshot; `GET /ws` upgrades to a
//! WebSocket that receives one full snapshot on attach and an update frame
//! for every change notification afterwards. Rendering is entirely on the
//! browser side; this layer only publishes state.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::{Sink, SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::bus::StatusBus;
use crate::status::{StatusBoard, StatusSnapshot};

#[derive(Clone)]
pub struct AppState {
    pub board: StatusBoard,
    pub bus: StatusBus,
}

/// Wire envelope for dashboard clients: a full snapshot on attach, update
/// frames afterwards.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsFrame<'a> {
    #[serde(rename = "fullUpdate")]
    FullUpdate(&'a StatusSnapshot),
    #[serde(rename = "statusUpdate")]
    StatusUpdate(&'a StatusSnapshot),
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "web dashboard listening");
    axum::serve(listener, build_router(state)).await
}

async fn get_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.board.snapshot())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.bus.subscribe();

    debug!("dashboard client connected");

    // Initial sync: current state before any tick-driven frame.
    let initial = state.board.snapshot();
    if send_frame(&mut sender, &WsFrame::FullUpdate(&initial)).await.is_err() {
        return;
    }

    // Drain the client side; we only care about it going away.
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {}
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut recv_task => {
                debug!("dashboard client disconnected");
                break;
            }
            event = events.recv() => {
                match event {
                    Ok(snapshot) => {
                        let frame = WsFrame::StatusUpdate(&snapshot);
                        if send_frame(&mut sender, &frame).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        // Skipped frames are fine, each one is a full state.
                        warn!("dashboard client lagged by {n} updates");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
}

async fn send_frame(
    sender: &mut (impl Sink<Message, Error = axum::Error> + Unpin),
    frame: &WsFrame<'_>,
) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(err) => {
            warn!("failed to serialize dashboard frame: {err}");
            return Ok(());
        }
    };
    sender.send(Message::Text(json.into())).await
}
