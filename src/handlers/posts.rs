use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{Json, Response},
};
use futures::stream::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use validator::Validate;

use crate::{
    AppState,
    auth::{ActiveUser, AdminUser, load_active_profile},
    error::{AppError, Result},
    handlers::{enforce_rate_limit, send_event, wait_for_either},
    models::{
        CreatePostRequest, LiveCommand, LiveEvent, PostAuthor, PostDetailResponse, SortOrder,
        UpdatePostRequest, VoteKind, VoteRequest, VoteResponse,
    },
    services::{
        comment_service,
        live_service::{self, Viewer},
        post_service, user_service,
    },
};

#[derive(Debug, Deserialize)]
pub struct PostsQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub sort: SortOrder,
}

pub async fn create_post(
    State(state): State<AppState>,
    user: ActiveUser,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    payload.validate()?;

    enforce_rate_limit(
        &state,
        &format!("post_create:user:{}", user.user_id()),
        10,
        3600,
    )
    .await?;

    let post_id = post_service::create_post(
        state.db.as_ref(),
        user.user_id(),
        &payload.title,
        &payload.content,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Post created successfully",
            "postId": post_id
        })),
    ))
}

pub async fn get_posts(
    State(state): State<AppState>,
    Query(params): Query<PostsQuery>,
) -> Result<Json<Value>> {
    let posts =
        post_service::get_all_posts(state.db.as_ref(), params.search.as_deref(), params.sort)
            .await?;

    Ok(Json(json!({
        "posts": posts,
        "sort": params.sort,
    })))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    user: ActiveUser,
) -> Result<Json<PostDetailResponse>> {
    let db = state.db.as_ref();
    let post = post_service::get_post(db, &post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    let authors = post_service::author_directory(db).await?;
    let author = authors.get(&post.author_id);
    let profile_picture =
        user_service::get_profile_picture(db, &post.author_id, &state.config.default_avatar_url)
            .await?;

    let comments = comment_service::comments_for_post(db, &post_id).await?;
    let comments = comment_service::responses(
        comments,
        &authors,
        Some(user.user_id()),
        user.profile.is_admin,
    );

    Ok(Json(PostDetailResponse {
        user_vote: post.users_voted.get(user.user_id()).copied(),
        can_edit: post.author_id == user.user_id(),
        can_delete: user.profile.is_admin,
        author: PostAuthor {
            uid: post.author_id.clone(),
            username: author.map(|a| a.username.clone()),
            display_name: author.map(|a| a.display_name()),
            profile_picture,
        },
        post_id: post.post_id,
        title: post.title,
        content: post.content,
        created_at: post.created_at,
        likes: post.likes,
        dislikes: post.dislikes,
        comment_count: post.comment_count,
        comments,
    }))
}

pub async fn update_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    user: ActiveUser,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<Value>> {
    payload.validate()?;

    post_service::update_content(state.db.as_ref(), &post_id, user.user_id(), &payload.content)
        .await?;

    Ok(Json(json!({
        "message": "Post updated successfully"
    })))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    AdminUser(admin): AdminUser,
) -> Result<StatusCode> {
    post_service::delete_post(state.db.as_ref(), &post_id).await?;
    tracing::info!("Admin {} deleted post {}", admin.user_id(), post_id);

    Ok(StatusCode::NO_CONTENT)
}

async fn cast_vote(
    state: &AppState,
    post_id: &str,
    user_id: &str,
    kind: VoteKind,
) -> Result<VoteResponse> {
    enforce_rate_limit(state, &format!("vote:user:{}", user_id), 100, 3600).await?;
    post_service::vote(state.db.as_ref(), post_id, user_id, kind).await
}

pub async fn vote_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    user: ActiveUser,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<VoteResponse>> {
    let response = cast_vote(&state, &post_id, user.user_id(), payload.kind).await?;
    Ok(Json(response))
}

/// `GET /api/posts/{id}/live`
pub async fn post_live(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    user: ActiveUser,
) -> Result<Response> {
    if !post_service::post_exists(state.db.as_ref(), &post_id).await? {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    Ok(ws.on_upgrade(move |socket| handle_post_socket(socket, state, post_id, user)))
}

async fn handle_post_socket(socket: WebSocket, state: AppState, post_id: String, user: ActiveUser) {
    let (mut sender, mut receiver) = socket.split();
    let user_id = user.user_id().to_string();

    let mut updates = live_service::post_events(
        state.db.clone(),
        post_id.clone(),
        Viewer {
            user_id: user_id.clone(),
            is_admin: user.profile.is_admin,
        },
    );

    // Replies to commands share the sender with the change stream
    let (reply_tx, mut reply_rx) = mpsc::channel::<LiveEvent>(16);

    let outgoing_task = tokio::spawn(async move {
        loop {
            let events = tokio::select! {
                update = updates.next() => match update {
                    Some(Ok(events)) => events,
                    Some(Err(e)) => {
                        let (_, message) = e.status_and_message();
                        let _ = send_event(&mut sender, &LiveEvent::Error { message }).await;
                        break;
                    }
                    None => break,
                },
                Some(reply) = reply_rx.recv() => vec![reply],
            };

            for event in &events {
                if !send_event(&mut sender, event).await {
                    return;
                }
            }
        }
    });

    let incoming_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let outcome = match serde_json::from_str::<LiveCommand>(text.as_str()) {
                Ok(command) => handle_command(&state, &post_id, &user_id, command).await,
                Err(_) => Err(AppError::BadRequest("Unrecognised message".to_string())),
            };

            if let Err(e) = outcome {
                let (_, message) = e.status_and_message();
                if reply_tx.send(LiveEvent::Error { message }).await.is_err() {
                    break;
                }
            }
        }
    });

    wait_for_either(outgoing_task, incoming_task).await;
    tracing::debug!("Live view of a post closed for user {}", user.user_id());
}

/// Socket commands go through the same checks as the REST routes. The
/// resulting change reaches the client through the change stream.
async fn handle_command(
    state: &AppState,
    post_id: &str,
    user_id: &str,
    command: LiveCommand,
) -> Result<()> {
    // The account may have been blocked since the socket opened
    load_active_profile(state, user_id).await?;

    match command {
        LiveCommand::Vote { kind } => {
            cast_vote(state, post_id, user_id, kind).await?;
        }
        LiveCommand::Comment { content } => {
            enforce_rate_limit(state, &format!("comment:user:{}", user_id), 30, 3600).await?;
            comment_service::add_comment(state.db.as_ref(), post_id, user_id, &content).await?;
        }
    }
    Ok(())
}
