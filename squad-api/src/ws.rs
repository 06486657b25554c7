//! WebSocket event broadcasting.
//!
//! A tokio broadcast channel distributes [`EventEnvelope`]s to every
//! connected client. Clients may connect, disconnect, and reconnect freely;
//! there is no backfill on reconnect - UIs re-query REST to reconcile.

use crate::events::{ControlEvent, EventEnvelope};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Shared WebSocket state: the broadcast side of the event bus.
#[derive(Clone)]
pub struct WsState {
    tx: broadcast::Sender<EventEnvelope>,
}

impl WsState {
    /// Create the event bus with the given buffer capacity. Slow consumers
    /// beyond the buffer drop events (lagged).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Stamp and broadcast an event. Non-blocking; with no subscribers the
    /// event is dropped.
    pub fn broadcast(&self, event: ControlEvent) {
        let event_type = event.event_type();
        match self.tx.send(EventEnvelope::now(event)) {
            Ok(receivers) => {
                debug!(event_type, receivers, "Broadcast event");
            }
            Err(_) => {
                debug!(event_type, "No receivers for event");
            }
        }
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }
}

/// `GET /ws` upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serve one WebSocket connection for its lifetime.
async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    info!("WebSocket connected");

    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.subscribe();

    // Drain client frames; we only care about Close.
    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Close(_)) => {
                    debug!("Client sent close frame");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(envelope) => {
                        let json = match serde_json::to_string(&envelope) {
                            Ok(json) => json,
                            Err(e) => {
                                warn!(error = %e, "Failed to serialize event");
                                continue;
                            }
                        };
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Client lagged; events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Event bus closed");
                        break;
                    }
                }
            }
            _ = &mut recv_task => {
                debug!("Receiver task finished");
                break;
            }
        }
    }

    info!("WebSocket disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_without_receivers_does_not_panic() {
        let state = WsState::new(16);
        state.broadcast(ControlEvent::AgentKilled {
            agent_id: "a1".to_string(),
        });
    }

    #[test]
    fn test_subscriber_receives_envelope() {
        let state = WsState::new(16);
        let mut rx = state.subscribe();

        state.broadcast(ControlEvent::SandboxEvent {
            sandbox_id: "sbx".to_string(),
            action: "paused".to_string(),
        });

        let envelope = rx.try_recv().expect("should receive event");
        assert_eq!(envelope.event.event_type(), "sandbox:event");
    }
}
