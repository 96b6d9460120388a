// Copyright 2025 Benchwatch Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// ABOUTME: WebSocket endpoint bridging the notification hub to dashboard clients
// Clients may only send ping envelopes; the server heartbeats on the hub's
// cadence and closes the connection on a missed pong deadline.

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use benchwatch_types::{EventKind, WsEnvelope};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

/// Per-write deadline on the socket.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Upgrade to a WebSocket event stream.
#[instrument(skip_all)]
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_envelope(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    envelope: &WsEnvelope,
) -> bool {
    let text = match serde_json::to_string(envelope) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "unserializable envelope skipped");
            return true;
        }
    };
    matches!(
        timeout(WRITE_TIMEOUT, sender.send(Message::Text(text.into()))).await,
        Ok(Ok(()))
    )
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let mut subscription = match state.hub.subscribe().await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(error = %e, "websocket rejected");
            let mut socket = socket;
            let _ = socket
                .send(Message::Text(
                    serde_json::to_string(&WsEnvelope::error(e.to_string()))
                        .unwrap_or_default()
                        .into(),
                ))
                .await;
            return;
        }
    };

    let client_id = subscription.id.clone();
    info!(client_id = %client_id, "websocket connected");

    let (mut sender, mut receiver) = socket.split();

    let mut connection = WsEnvelope::control(EventKind::Connection);
    connection.client_id = Some(client_id.clone());
    if !send_envelope(&mut sender, &connection).await {
        state.hub.unsubscribe(&client_id).await;
        return;
    }

    let hub_config = state.hub.config().clone();
    let mut ping = interval(hub_config.ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ping.tick().await; // the first tick completes immediately
    let mut last_pong = Instant::now();

    loop {
        tokio::select! {
            event = subscription.receiver.recv() => {
                let Some(envelope) = event else {
                    // The hub dropped this subscriber (slow or shutting down).
                    debug!(client_id = %client_id, "hub closed subscriber queue");
                    break;
                };
                if !send_envelope(&mut sender, &envelope).await {
                    break;
                }
            }

            _ = ping.tick() => {
                if last_pong.elapsed() > hub_config.pong_deadline {
                    info!(client_id = %client_id, "pong deadline missed; closing");
                    break;
                }
                if !send_envelope(&mut sender, &WsEnvelope::control(EventKind::Ping)).await {
                    break;
                }
            }

            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        last_pong = Instant::now();
                        match serde_json::from_str::<WsEnvelope>(text.as_str()) {
                            Ok(envelope) if envelope.kind == EventKind::Ping => {
                                if !send_envelope(&mut sender, &WsEnvelope::control(EventKind::Pong)).await {
                                    break;
                                }
                            }
                            Ok(envelope) => {
                                debug!(client_id = %client_id, kind = %envelope.kind,
                                       "ignoring non-ping client message");
                            }
                            Err(e) => {
                                let _ = send_envelope(
                                    &mut sender,
                                    &WsEnvelope::error(format!("unparseable message: {e}")),
                                )
                                .await;
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        last_pong = Instant::now();
                        let _ = timeout(WRITE_TIMEOUT, sender.send(Message::Pong(payload))).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Binary(_))) => {
                        debug!(client_id = %client_id, "ignoring binary frame");
                    }
                    Some(Err(e)) => {
                        debug!(client_id = %client_id, error = %e, "websocket read error");
                        break;
                    }
                }
            }
        }
    }

    state.hub.unsubscribe(&client_id).await;
    let mut disconnection = WsEnvelope::control(EventKind::Disconnection);
    disconnection.client_id = Some(client_id.clone());
    let _ = send_envelope(&mut sender, &disconnection).await;
    info!(client_id = %client_id, "websocket disconnected");
}
