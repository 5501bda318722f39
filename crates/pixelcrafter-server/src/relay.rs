//! Per-project collaboration relay.
//!
//! Every text frame a peer sends is forwarded unchanged to the other peers
//! in the same project room. The server does not interpret layer operations;
//! it only checks that frames are JSON objects.

use crate::routes::SharedState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(project_id): Path<String>,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, project_id))
}

fn is_json_object(text: &str) -> bool {
    matches!(serde_json::from_str::<serde_json::Value>(text), Ok(serde_json::Value::Object(_)))
}

async fn handle_socket(socket: WebSocket, state: SharedState, project_id: String) {
    let peer_id = Uuid::new_v4().to_string();
    let mut room_rx = state.join_room(&project_id, &peer_id);
    info!(
        "Peer {} joined project {} ({} connected)",
        peer_id,
        project_id,
        state.room_size(&project_id)
    );

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if is_json_object(text.as_str()) {
                            state.broadcast(&project_id, &peer_id, text.as_str().to_owned());
                        } else {
                            warn!("Dropping non-JSON frame from {}", peer_id);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer_id, e);
                        break;
                    }
                }
            }

            msg = room_rx.recv() => {
                match msg {
                    Ok((from, text)) => {
                        if from != peer_id && sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Peer {} lagged behind by {} messages", peer_id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    state.leave_room(&project_id, &peer_id);
    info!("Peer {} left project {}", peer_id, project_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::routes::router;
    use crate::state::AppState;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    async fn wait_for(mut done: impl FnMut() -> bool) {
        for _ in 0..500 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn test_only_objects_are_relayed() {
        assert!(is_json_object(r#"{"type":"cursor","data":{"x":1,"y":2}}"#));
        assert!(!is_json_object("[1,2]"));
        assert!(!is_json_object("hello"));
    }

    #[tokio::test]
    async fn test_frames_reach_other_peers_only() {
        let state: SharedState = Arc::new(AppState::new(ServerConfig::default()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state.clone());
        tokio::spawn(async move { axum::serve(listener, app).await });

        let url = format!("ws://{}/api/ws/collaborate/p1", addr);
        let (mut ann, _) = connect_async(url.as_str()).await.unwrap();
        let (mut bob, _) = connect_async(url.as_str()).await.unwrap();
        wait_for(|| state.room_size("p1") == 2).await;

        let frame = r#"{"type":"cursor","user_id":"ann","data":{"x":1.0,"y":2.0}}"#;
        ann.send(WsMessage::text("not json")).await.unwrap();
        ann.send(WsMessage::text(frame)).await.unwrap();

        let received = timeout(Duration::from_secs(5), bob.next()).await.unwrap().unwrap().unwrap();
        assert_eq!(received, WsMessage::text(frame));
        assert!(timeout(Duration::from_millis(200), ann.next()).await.is_err());

        ann.close(None).await.unwrap();
        wait_for(|| state.room_size("p1") == 1).await;
        bob.close(None).await.unwrap();
        wait_for(|| state.room_size("p1") == 0).await;
    }
}
