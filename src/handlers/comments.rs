use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{Value, json};

use crate::{
    AppState,
    auth::ActiveUser,
    error::Result,
    handlers::enforce_rate_limit,
    models::{CommentResponse, CreateCommentRequest},
    services::{comment_service, user_service},
};

pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    user: ActiveUser,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    enforce_rate_limit(
        &state,
        &format!("comment:user:{}", user.user_id()),
        30,
        3600,
    )
    .await?;

    let comment = comment_service::add_comment(
        state.db.as_ref(),
        &post_id,
        user.user_id(),
        &payload.content,
    )
    .await?;

    let author_name = user_service::get_display_name(state.db.as_ref(), user.user_id()).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Comment added successfully",
            "comment": CommentResponse {
                comment,
                author_name,
                can_delete: true,
            }
        })),
    ))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
    user: ActiveUser,
) -> Result<StatusCode> {
    comment_service::delete_comment(
        state.db.as_ref(),
        &comment_id,
        user.user_id(),
        user.profile.is_admin,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
