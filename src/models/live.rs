use serde::{Deserialize, Serialize};

use crate::models::{CommentResponse, Post, PostListItem, Stats, VoteKind};

/// Frames pushed over the live sockets.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LiveEvent {
    /// `post` is `None` once the post has been deleted.
    Post { post: Option<Post> },
    Comments { comments: Vec<CommentResponse> },
    Home {
        top_commented: Vec<PostListItem>,
        latest: Vec<PostListItem>,
    },
    Stats { stats: Stats },
    Error { message: String },
}

/// Frames a client may send on the post socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LiveCommand {
    Vote { kind: VoteKind },
    Comment { content: String },
}
