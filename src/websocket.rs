use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::state::FarmState;

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<FarmState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Push a snapshot on connect, then every `FarmEvent` as JSON text
async fn handle_socket(socket: WebSocket, state: Arc<FarmState>) {
    let (mut sender, mut receiver) = socket.split();

    // subscribe before the snapshot so nothing falls in between
    let mut events = state.subscribe();

    info!("New WebSocket connection established");

    let snapshot = match (state.positions(), state.activity()) {
        (Ok(positions), Ok(activity)) => serde_json::json!({
            "type": "snapshot",
            "data": { "positions": positions, "activity": activity }
        }),
        _ => serde_json::json!({ "type": "error", "data": { "message": "state unavailable" } }),
    };
    if sender.send(Message::Text(snapshot.to_string())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                    // the stream is push-only
                    Some(Ok(_)) => {}
                }
            }

            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if let Ok(json) = serde_json::to_string(&event) {
                            if sender.send(Message::Text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("WebSocket client lagged {} events", n);
                    }
                    Err(_) => break,
                }
            }
        }
    }

    info!("WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use crate::api::create_router;
    use crate::config::FarmConfig;
    use crate::ids::SequentialIds;
    use crate::state::FarmState;
    use crate::types::PositionId;
    use futures::{Stream, StreamExt};
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_tungstenite::{connect_async, tungstenite};

    async fn next_json<S>(ws: &mut S) -> Value
    where
        S: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("no message within 5s")
                .expect("stream ended")
                .expect("websocket error");
            if let tungstenite::Message::Text(text) = msg {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_snapshot_then_events() {
        let state = Arc::new(FarmState::new(
            FarmConfig::default(),
            Arc::new(SequentialIds::starting_at(100)),
        ));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router(state.clone());
        let server = tokio::spawn(async move { axum::serve(listener, app).await });

        let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

        let snapshot = next_json(&mut ws).await;
        assert_eq!(snapshot["type"], "snapshot");
        assert_eq!(snapshot["data"]["positions"].as_array().map(Vec::len), Some(2));
        assert_eq!(snapshot["data"]["activity"][0]["id"], "log-1");

        state.close_position(&PositionId::new("pos-2")).unwrap();

        let closing = next_json(&mut ws).await;
        assert_eq!(closing["type"], "position_closing");
        assert_eq!(closing["data"]["position_id"], "pos-2");

        let activity = next_json(&mut ws).await;
        assert_eq!(activity["type"], "activity");
        assert_eq!(activity["data"]["action"], "close");
        assert_eq!(activity["data"]["details"]["pnl"], -45.3);

        state.shutdown();
        server.abort();
    }
}
