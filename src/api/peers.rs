use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures_util::{stream, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;

use crate::api::server::AppState;

/// Endless `random` events, one per configured interval, numbered from zero.
pub async fn random_numbers(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let interval = state.peer_interval;

    let events = stream::unfold(0u64, move |seq| async move {
        tokio::time::sleep(interval).await;
        let event = Event::default()
            .id(seq.to_string())
            .event("random")
            .data(rand::random::<u32>().to_string());
        Some((Ok(event), seq + 1))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

pub async fn echo(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(handle_socket)
}

async fn handle_socket(mut socket: WebSocket) {
    while let Some(msg) = socket.recv().await {
        let reply = match msg {
            Ok(Message::Text(text)) => Message::Text(text),
            Ok(Message::Binary(bytes)) => Message::Binary(bytes),
            Ok(Message::Close(_)) | Err(_) => break,
            // axum answers pings itself
            Ok(_) => continue,
        };

        if socket.send(reply).await.is_err() {
            break;
        }
    }

    debug!("Echo socket closed");
}
