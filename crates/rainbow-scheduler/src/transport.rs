//! WebSocket transport for worker connections
//!
//! Each connection gets a worker id, a writer draining its outbound queue
//! into JSON text frames and a reader forwarding decoded frames to the
//! dispatcher. Whichever half ends first ends the connection.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use rainbow_core::{SchedulerMessage, WorkerMessage};
use tokio::sync::mpsc;

use crate::event::{DispatcherHandle, Event};
use crate::routes::AppState;

/// `GET /worker`
pub async fn worker_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let dispatcher = state.dispatcher.clone();
    ws.on_upgrade(move |socket| serve_worker(socket, dispatcher))
}

pub async fn serve_worker(socket: WebSocket, dispatcher: DispatcherHandle) {
    let worker_id = dispatcher.next_worker_id();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<SchedulerMessage>();
    if dispatcher
        .send(Event::WorkerConnected {
            worker_id,
            outbound,
        })
        .await
        .is_err()
    {
        tracing::warn!(worker_id, "Dispatcher unavailable, closing worker connection");
        return;
    }

    let (mut sink, mut stream) = socket.split();

    let writer = async {
        while let Some(message) = outbound_rx.recv().await {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(worker_id, error = %e, "Failed to encode message");
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(text)).await {
                tracing::debug!(worker_id, error = %e, "Worker send failed");
                break;
            }
        }
        let _ = sink.close().await;
    };

    let reader = async {
        while let Some(frame) = stream.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Binary(data)) => match String::from_utf8(data) {
                    Ok(text) => text,
                    Err(_) => {
                        tracing::warn!(worker_id, "Ignoring non UTF-8 binary frame");
                        continue;
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(worker_id, error = %e, "Worker receive failed");
                    break;
                }
            };

            match WorkerMessage::from_json(&text) {
                Ok(message) => {
                    let event = Event::WorkerMessage { worker_id, message };
                    if dispatcher.send(event).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!(worker_id, error = %e, "Malformed worker message"),
            }
        }
    };

    tokio::select! {
        _ = writer => {}
        _ = reader => {}
    }

    let _ = dispatcher
        .send(Event::WorkerDisconnected { worker_id })
        .await;
    tracing::debug!(worker_id, "Worker connection closed");
}
