use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{CommentResponse, VoteKind, VoteTally};

pub const MAX_CONTENT_CHARS: usize = 8192;

/// A `posts/{postId}` record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(default)]
    pub post_id: String,
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub dislikes: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub users_voted: BTreeMap<String, VoteKind>,
    #[serde(default)]
    pub comment_count: i64,
}

impl Post {
    pub fn tally(&self) -> VoteTally {
        VoteTally {
            likes: self.likes,
            dislikes: self.dislikes,
            users_voted: self.users_voted.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

impl SortOrder {
    /// `created_at` may return a tuple to break ties between equal timestamps.
    pub fn sort_by_created<T, K: Ord>(self, items: &mut [T], created_at: impl Fn(&T) -> K) {
        match self {
            SortOrder::Newest => items.sort_by_key(|item| std::cmp::Reverse(created_at(item))),
            SortOrder::Oldest => items.sort_by_key(created_at),
        }
    }
}

// Create post request
#[derive(Debug, Validate, Deserialize)]
pub struct CreatePostRequest {
    #[validate(length(
        min = 16,
        max = 64,
        message = "Title must be between 16 and 64 characters long."
    ))]
    pub title: String,
    #[validate(length(
        min = 32,
        max = 8192,
        message = "Content must be between 32 and 8192 characters long."
    ))]
    pub content: String,
}

// Update post request
#[derive(Debug, Validate, Deserialize)]
pub struct UpdatePostRequest {
    #[validate(length(
        min = 32,
        max = 8192,
        message = "Content must be between 32 and 8192 characters long."
    ))]
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostAuthor {
    pub uid: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub profile_picture: String,
}

// Post list response (for feeds)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListItem {
    pub post_id: String,
    pub title: String,
    pub content: String,
    pub author_id: String,
    pub author_name: Option<String>,
    pub author_username: Option<String>,
    pub created_at: i64,
    pub likes: i64,
    pub dislikes: i64,
    pub comment_count: i64,
}

// Single post view
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetailResponse {
    pub post_id: String,
    pub title: String,
    pub content: String,
    pub created_at: i64,
    pub likes: i64,
    pub dislikes: i64,
    pub comment_count: i64,
    pub author: PostAuthor,
    pub user_vote: Option<VoteKind>,
    pub can_edit: bool,
    pub can_delete: bool,
    pub comments: Vec<CommentResponse>,
}
