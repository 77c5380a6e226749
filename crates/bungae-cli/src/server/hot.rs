//! The `/hot` WebSocket endpoint.
//!
//! Carries the HMR protocol: the client registers its entry points and then
//! receives `update-start` / `update` / `update-done` sequences whenever a
//! delta lands. Frames produced by the delta pipeline are fanned out through
//! the server state's client registry, so every message a session emits is
//! strictly ordered per connection.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};

use bungae_bundler::{HmrClientMessage, HmrServerMessage, HmrUpdate, UpdateStartBody};

use crate::server::state::SharedState;

pub async fn handle_hot_upgrade(
    State(state): State<SharedState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (client_id, mut rx) = state.register_client();
    tracing::debug!(client_id, "HMR client connected");

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        let Ok(message) = message else {
            break;
        };
        match message {
            Message::Text(text) => handle_client_frame(&state, text.as_str()),
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.unregister_client(client_id);
    writer.abort();
    tracing::debug!(client_id, "HMR client disconnected");
}

fn handle_client_frame(state: &SharedState, text: &str) {
    let parsed: Result<HmrClientMessage, _> = serde_json::from_str(text);
    match parsed {
        Ok(HmrClientMessage::RegisterEntrypoints { entry_points }) => {
            tracing::debug!(?entry_points, "entrypoints registered");
            state.broadcast(&HmrServerMessage::BundleRegistered);
            // The first registration gets an empty initial update so the
            // client can settle its revision bookkeeping.
            state.broadcast(&HmrServerMessage::UpdateStart {
                body: UpdateStartBody {
                    is_initial_update: true,
                },
            });
            state.broadcast(&HmrServerMessage::Update {
                body: HmrUpdate::empty("0".to_string(), true),
            });
            state.broadcast(&HmrServerMessage::UpdateDone);
        }
        Ok(HmrClientMessage::Log { level, data }) => {
            tracing::debug!(
                level = level.as_deref().unwrap_or("info"),
                ?data,
                "client log"
            );
        }
        Ok(HmrClientMessage::LogOptIn) => {
            tracing::debug!("client opted into log forwarding");
        }
        Err(err) => {
            tracing::warn!(%err, frame = text, "unparseable HMR client frame");
        }
    }
}

/// Broadcast one delta's update sequence to every connected client.
pub fn broadcast_update(state: &SharedState, update: HmrUpdate) {
    state.broadcast(&HmrServerMessage::UpdateStart {
        body: UpdateStartBody {
            is_initial_update: update.is_initial_update,
        },
    });
    state.broadcast(&HmrServerMessage::Update { body: update });
    state.broadcast(&HmrServerMessage::UpdateDone);
}
