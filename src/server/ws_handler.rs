use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    response::Response,
};
use tokio::sync::broadcast;

use crate::types::TradeEvent;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(events_tx): State<broadcast::Sender<TradeEvent>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, events_tx))
}

async fn handle_socket(mut socket: WebSocket, events_tx: broadcast::Sender<TradeEvent>) {
    let mut rx = events_tx.subscribe();

    loop {
        match rx.recv().await {
            Ok(event) => {
                let Ok(json) = serde_json::to_string(&event) else {
                    continue;
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    break; // client disconnected
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("ws client lagged, dropped {n} events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Phase;

    #[test]
    fn test_events_encode_as_json_lines() {
        let event = TradeEvent::StateChange { from: Phase::Idle, to: Phase::Menu };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"state_change\""));
        assert!(json.contains("\"MENU\""));
    }
}
