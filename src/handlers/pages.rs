use std::collections::HashMap;

use axum::{
    extract::{State, ws::WebSocketUpgrade},
    http::StatusCode,
    response::{Json, Response},
};
use futures::stream::StreamExt;
use serde_json::{Value, json};

use crate::{
    AppState,
    error::{AppError, Result},
    handlers::stream_frames,
    models::{LiveEvent, Post, PostListItem, User},
    services::{live_service, post_service, stats_service},
};

fn list_items(posts: Vec<Post>, authors: &HashMap<String, User>) -> Vec<PostListItem> {
    posts
        .into_iter()
        .map(|post| post_service::list_item(post, authors))
        .collect()
}

pub async fn home(State(state): State<AppState>) -> Result<Json<Value>> {
    let db = state.db.as_ref();
    let authors = post_service::author_directory(db).await?;
    let top_commented = post_service::top_commented(db).await?;
    let latest = post_service::latest(db).await?;
    let stats = stats_service::get_stats(db).await?;

    Ok(Json(json!({
        "topCommented": list_items(top_commented, &authors),
        "latest": list_items(latest, &authors),
        "stats": stats,
    })))
}

/// `GET /api/home/live`
pub async fn home_live(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let frames = live_service::home_events(state.db.as_ref());
    ws.on_upgrade(move |socket| stream_frames(socket, frames))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<Value>> {
    let stats = stats_service::get_stats(state.db.as_ref()).await?;
    Ok(Json(json!({ "stats": stats })))
}

/// `GET /api/stats/live`
pub async fn stats_live(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let frames = stats_service::watch_stats(state.db.as_ref())
        .map(|update| update.map(|stats| vec![LiveEvent::Stats { stats }]))
        .boxed();
    ws.on_upgrade(move |socket| stream_frames(socket, frames))
}

pub async fn about(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": state.config.app_name,
        "description": "A discussion forum: share posts, comment on them, and vote on what you like.",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn not_found() -> (StatusCode, Json<Value>) {
    let (status, message) =
        AppError::NotFound("The page you are looking for does not exist".to_string())
            .status_and_message();
    (
        status,
        Json(json!({
            "error": message,
            "status": status.as_u16()
        })),
    )
}
