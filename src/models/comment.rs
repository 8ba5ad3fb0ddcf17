use serde::{Deserialize, Serialize};

/// A `comments/{commentId}` record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default)]
    pub comment_id: String,
    #[serde(default)]
    pub post_id: String,
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: i64,
}

// Create comment request
#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_name: Option<String>,
    pub can_delete: bool,
}

/// A comment listed on its author's profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentWithPostTitle {
    #[serde(flatten)]
    pub comment: Comment,
    pub post_title: String,
}
