pub mod auth;
pub mod comments;
pub mod pages;
pub mod posts;
pub mod upload;
pub mod users;

use axum::extract::ws::{Message, WebSocket};
use futures::{
    sink::SinkExt,
    stream::{BoxStream, SplitSink, StreamExt},
};
use tokio::task::JoinHandle;

use crate::{
    AppState,
    error::{AppError, Result},
    models::LiveEvent,
};

/// Fixed-window limit on `key`, mapped onto a 429.
pub(crate) async fn enforce_rate_limit(
    state: &AppState,
    key: &str,
    limit: u32,
    window_seconds: u64,
) -> Result<()> {
    if !state
        .sessions
        .check_rate_limit(key, limit, window_seconds)
        .await
    {
        tracing::debug!("Rate limit hit for {}", key);
        return Err(AppError::RateLimit);
    }
    Ok(())
}

/// Pushes a stream of frame sets to a socket until either side goes away.
pub(crate) async fn stream_frames(
    socket: WebSocket,
    mut frames: BoxStream<'static, Result<Vec<LiveEvent>>>,
) {
    let (mut sender, mut receiver) = socket.split();

    let outgoing_task = tokio::spawn(async move {
        while let Some(update) = frames.next().await {
            let events = match update {
                Ok(events) => events,
                Err(e) => {
                    let (_, message) = e.status_and_message();
                    let _ = send_event(&mut sender, &LiveEvent::Error { message }).await;
                    break;
                }
            };
            for event in &events {
                if !send_event(&mut sender, event).await {
                    return;
                }
            }
        }
    });

    // Only watch for the client closing; read-only sockets ignore input.
    let incoming_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    wait_for_either(outgoing_task, incoming_task).await;
}

pub(crate) async fn wait_for_either(mut first: JoinHandle<()>, mut second: JoinHandle<()>) {
    tokio::select! {
        _ = &mut first => second.abort(),
        _ = &mut second => first.abort(),
    }
}

pub(crate) async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &LiveEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("Failed to encode live frame: {:?}", e);
            return false;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}
