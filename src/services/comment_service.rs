use std::collections::HashMap;

use chrono::Utc;
use serde_json::{Map, Value, json};

use crate::{
    backend::{Query, RealtimeDatabase, push_id, tree},
    error::{AppError, Result},
    models::{Comment, CommentResponse, CommentWithPostTitle, MAX_CONTENT_CHARS, User},
    services::{parse_children, post_service},
};

const COMMENTS: &str = "comments";
const UNKNOWN_POST_TITLE: &str = "Unknown Post";

fn comment_path(comment_id: &str) -> String {
    format!("{}/{}", COMMENTS, comment_id)
}

fn for_post(post_id: &str) -> Query {
    Query::order_by_child("postId").equal_to(post_id)
}

fn comments_from(children: Vec<(String, Value)>) -> Vec<Comment> {
    let mut comments: Vec<Comment> = parse_children::<Comment>(children)
        .into_iter()
        .map(|(key, mut comment)| {
            comment.comment_id = key;
            comment
        })
        .collect();
    comments.sort_by_key(|comment| comment.created_at);
    comments
}

pub fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(AppError::Validation("Comment cannot be empty.".to_string()));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::Validation(format!(
            "Comment must be at most {} characters long.",
            MAX_CONTENT_CHARS
        )));
    }
    Ok(())
}

pub async fn add_comment(
    db: &dyn RealtimeDatabase,
    post_id: &str,
    author_id: &str,
    content: &str,
) -> Result<Comment> {
    validate_content(content)?;

    if !post_service::post_exists(db, post_id).await? {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    let comment = Comment {
        comment_id: push_id::generate(),
        post_id: post_id.to_string(),
        author_id: author_id.to_string(),
        content: content.to_string(),
        created_at: Utc::now().timestamp_millis(),
    };
    db.set(
        &comment_path(&comment.comment_id),
        serde_json::to_value(&comment)?,
    )
    .await?;

    recount_comments(db, post_id).await?;
    tracing::info!(
        "User {} commented {} on post {}",
        author_id,
        comment.comment_id,
        post_id
    );
    Ok(comment)
}

pub async fn get_comment(db: &dyn RealtimeDatabase, comment_id: &str) -> Result<Option<Comment>> {
    let Some(value) = db.get(&comment_path(comment_id)).await? else {
        return Ok(None);
    };
    let mut comment: Comment = serde_json::from_value(value)?;
    comment.comment_id = comment_id.to_string();
    Ok(Some(comment))
}

/// Oldest first.
pub async fn comments_for_post(db: &dyn RealtimeDatabase, post_id: &str) -> Result<Vec<Comment>> {
    Ok(comments_from(db.query(COMMENTS, &for_post(post_id)).await?))
}

/// Same as [`comments_for_post`], evaluated on a snapshot of `comments`.
pub fn comments_in_snapshot(snapshot: Option<Value>, post_id: &str) -> Vec<Comment> {
    comments_from(tree::apply_query(snapshot, &for_post(post_id)))
}

pub async fn delete_comment(
    db: &dyn RealtimeDatabase,
    comment_id: &str,
    requester_id: &str,
    requester_is_admin: bool,
) -> Result<()> {
    let comment = get_comment(db, comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    if comment.author_id != requester_id && !requester_is_admin {
        return Err(AppError::Authorization(
            "You can only delete your own comments".to_string(),
        ));
    }

    db.remove(&comment_path(comment_id)).await?;
    recount_comments(db, &comment.post_id).await?;
    tracing::info!("User {} deleted comment {}", requester_id, comment_id);
    Ok(())
}

pub async fn recount_comments(db: &dyn RealtimeDatabase, post_id: &str) -> Result<()> {
    let count = comments_for_post(db, post_id).await?.len();
    update_comment_count(db, post_id, count as i64).await
}

/// Does nothing when the post no longer exists.
pub async fn update_comment_count(
    db: &dyn RealtimeDatabase,
    post_id: &str,
    count: i64,
) -> Result<()> {
    if !post_service::post_exists(db, post_id).await? {
        tracing::debug!("Skipping comment count of missing post {}", post_id);
        return Ok(());
    }

    let mut fields = Map::new();
    fields.insert("commentCount".to_string(), json!(count));
    db.update(&format!("posts/{}", post_id), fields).await?;
    Ok(())
}

pub async fn user_comments_with_titles(
    db: &dyn RealtimeDatabase,
    user_id: &str,
) -> Result<Vec<CommentWithPostTitle>> {
    let query = Query::order_by_child("authorId").equal_to(user_id);
    let comments = comments_from(db.query(COMMENTS, &query).await?);

    let mut titles: HashMap<String, String> = HashMap::new();
    let mut result = Vec::with_capacity(comments.len());
    for comment in comments {
        let post_title = match titles.get(&comment.post_id) {
            Some(title) => title.clone(),
            None => {
                let title = db
                    .get(&format!("posts/{}/title", comment.post_id))
                    .await?
                    .and_then(|value| value.as_str().map(str::to_string))
                    .unwrap_or_else(|| UNKNOWN_POST_TITLE.to_string());
                titles.insert(comment.post_id.clone(), title.clone());
                title
            }
        };
        result.push(CommentWithPostTitle {
            comment,
            post_title,
        });
    }
    Ok(result)
}

/// Decorates comments for a viewer.
pub fn responses(
    comments: Vec<Comment>,
    authors: &HashMap<String, User>,
    viewer_id: Option<&str>,
    viewer_is_admin: bool,
) -> Vec<CommentResponse> {
    comments
        .into_iter()
        .map(|comment| CommentResponse {
            author_name: authors.get(&comment.author_id).map(User::display_name),
            can_delete: viewer_is_admin || viewer_id == Some(comment.author_id.as_str()),
            comment,
        })
        .collect()
}
