use crate::{dispatch::KeyEvent, server::SharedState};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::instrument;

/// Upgrades to a WebSocket that pushes every dispatched key event as JSON.
#[instrument(skip(ws, state))]
pub async fn key_feed(ws: WebSocketUpgrade, State(state): State<SharedState>) -> Response {
    let rx = state.keys.subscribe();
    ws.on_upgrade(move |socket| forward_key_events(socket, rx))
}

async fn forward_key_events(socket: WebSocket, rx: broadcast::Receiver<KeyEvent>) {
    tracing::info!("Key event subscriber connected");
    let (mut sender, mut receiver) = socket.split();
    let mut events = BroadcastStream::new(rx);

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(event)) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::error!("Failed to serialize key event: {:?}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    tracing::warn!("Key event subscriber lagged, {} events dropped", skipped);
                }
                None => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!("Key event subscriber disconnected");
}
