use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use serde::{Deserialize, Serialize};
use streaming::{ConnectionId, PriceUpdate};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Frames a client may send.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ClientEvent {
    StartStream { ticker: String },
    StopStream,
}

/// Frames the server pushes.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected { connection_id: ConnectionId },
    PriceUpdate(PriceUpdate),
}

pub async fn price_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_connection(socket, state))
}

async fn serve_connection(mut socket: WebSocket, state: AppState) {
    let connection_id = match state.connect() {
        Ok(id) => id,
        Err(err) => {
            warn!(?err, "rejecting websocket connection");
            return;
        }
    };
    info!(%connection_id, "websocket connected");

    let mut updates = state.engine().subscribe();
    if send_event(&mut socket, &ServerEvent::Connected { connection_id })
        .await
        .is_ok()
    {
        pump(&mut socket, &state, connection_id, &mut updates).await;
    }

    state.engine().disconnect(connection_id);
    info!(%connection_id, "websocket disconnected");
}

async fn pump(
    socket: &mut WebSocket,
    state: &AppState,
    connection_id: ConnectionId,
    updates: &mut tokio::sync::broadcast::Receiver<PriceUpdate>,
) {
    loop {
        tokio::select! {
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => handle_frame(state, connection_id, &text),
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(%connection_id, error = %err, "websocket transport error");
                        return;
                    }
                }
            }
            update = updates.recv() => {
                match update {
                    Ok(update) => {
                        if send_event(socket, &ServerEvent::PriceUpdate(update)).await.is_err() {
                            return;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%connection_id, skipped, "slow consumer dropped price updates");
                        continue;
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        }
    }
}

fn handle_frame(state: &AppState, connection_id: ConnectionId, text: &str) {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(ClientEvent::StartStream { ticker }) => {
            if state.engine().start_stream(connection_id, &ticker).is_none() {
                debug!(%connection_id, "ignoring start_stream with blank ticker");
            }
        }
        Ok(ClientEvent::StopStream) => {
            state.engine().stop_stream(connection_id);
        }
        Err(err) => {
            warn!(%connection_id, error = %err, "ignoring unparseable frame");
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), ()> {
    let payload = event_json(event)?;
    socket.send(Message::Text(payload)).await.map_err(|_| ())
}

fn event_json(event: &ServerEvent) -> Result<String, ()> {
    serde_json::to_string(event).map_err(|_| ())
}
