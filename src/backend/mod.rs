//! External collaborators: the hosted realtime database, the hosted
//! authentication provider and the image CDN.
//!
//! Every trait here is object safe so the application state can hold
//! `Arc<dyn ...>` and swap the hosted services for the in-memory ones.

pub mod cloudinary;
pub mod firebase;
pub mod memory;
pub mod push_id;
pub mod sse;
pub mod tree;

use futures::{future::BoxFuture, stream::BoxStream};
use serde_json::{Map, Value};
use thiserror::Error;

pub use cloudinary::CloudinaryMedia;
pub use firebase::{FirebaseAuth, FirebaseDatabase};
pub use memory::{MemoryDatabase, MemoryIdentity, MemoryMedia};

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid database path: {0}")]
    InvalidPath(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already in use")]
    EmailExists,

    #[error("No user registered for this email")]
    UserNotFound,

    #[error("Too many attempts")]
    TooManyAttempts,

    #[error("Password too weak")]
    WeakPassword,

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Subscription closed: {0}")]
    SubscriptionClosed(String),

    #[error("Upload failed: {0}")]
    Upload(String),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Stream of full snapshots of a watched path. `None` means the path is empty.
pub type SnapshotStream = BoxStream<'static, BackendResult<Option<Value>>>;

/// Ordered query against the children of a path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub order_by_child: Option<String>,
    pub equal_to: Option<Value>,
    pub limit_to_last: Option<usize>,
}

impl Query {
    pub fn order_by_child(child: impl Into<String>) -> Self {
        Self {
            order_by_child: Some(child.into()),
            ..Self::default()
        }
    }

    pub fn equal_to(mut self, value: impl Into<Value>) -> Self {
        self.equal_to = Some(value.into());
        self
    }

    pub fn limit_to_last(mut self, limit: usize) -> Self {
        self.limit_to_last = Some(limit);
        self
    }
}

pub trait RealtimeDatabase: Send + Sync {
    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, BackendResult<Option<Value>>>;

    /// Writing `Value::Null` deletes the path.
    fn set<'a>(&'a self, path: &'a str, value: Value) -> BoxFuture<'a, BackendResult<()>>;

    /// Shallow merge. Keys may be relative paths, `null` values delete.
    fn update<'a>(
        &'a self,
        path: &'a str,
        fields: Map<String, Value>,
    ) -> BoxFuture<'a, BackendResult<()>>;

    fn remove<'a>(&'a self, path: &'a str) -> BoxFuture<'a, BackendResult<()>>;

    /// Children ordered by the queried child, ties broken by key.
    fn query<'a>(
        &'a self,
        path: &'a str,
        query: &'a Query,
    ) -> BoxFuture<'a, BackendResult<Vec<(String, Value)>>>;

    fn subscribe(&self, path: &str) -> SnapshotStream;

    fn push<'a>(&'a self, path: &'a str, value: Value) -> BoxFuture<'a, BackendResult<String>> {
        Box::pin(async move {
            let key = push_id::generate();
            self.set(&child_path(path, &key), value).await?;
            Ok(key)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub id_token: Option<String>,
}

pub trait IdentityProvider: Send + Sync {
    fn sign_up<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, BackendResult<Identity>>;

    fn sign_in<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, BackendResult<Identity>>;

    fn send_password_reset<'a>(&'a self, email: &'a str) -> BoxFuture<'a, BackendResult<()>>;
}

pub trait MediaHost: Send + Sync {
    /// Returns the hosted (secure) URL of the uploaded image.
    fn upload_image<'a>(
        &'a self,
        file_name: &'a str,
        content_type: &'a str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, BackendResult<String>>;
}

/// Splits a slash separated path, rejecting the characters the hosted
/// database forbids in keys.
pub fn segments(path: &str) -> BackendResult<Vec<String>> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            if segment.contains(['.', '#', '$', '[', ']']) {
                Err(BackendError::InvalidPath(path.to_string()))
            } else {
                Ok(segment.to_string())
            }
        })
        .collect()
}

pub fn child_path(parent: &str, child: &str) -> String {
    let parent = parent.trim_end_matches('/');
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}/{}", parent, child)
    }
}

/// A change at `changed` affects a watcher of `watched` when one path is
/// a prefix of the other.
pub fn paths_overlap(watched: &[String], changed: &[String]) -> bool {
    watched.iter().zip(changed.iter()).all(|(a, b)| a == b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_skip_empty_parts() {
        assert_eq!(
            segments("/posts//abc/").unwrap(),
            vec!["posts".to_string(), "abc".to_string()]
        );
        assert!(segments("").unwrap().is_empty());
    }

    #[test]
    fn segments_reject_forbidden_characters() {
        assert!(matches!(
            segments("users/a.b"),
            Err(BackendError::InvalidPath(_))
        ));
        assert!(segments("users/$uid").is_err());
    }

    #[test]
    fn overlapping_paths() {
        let posts = segments("posts").unwrap();
        let one_post = segments("posts/p1").unwrap();
        let one_title = segments("posts/p1/title").unwrap();
        let users = segments("users/u1").unwrap();

        assert!(paths_overlap(&posts, &one_title));
        assert!(paths_overlap(&one_title, &posts));
        assert!(paths_overlap(&one_post, &one_post));
        assert!(!paths_overlap(&one_post, &users));
        assert!(paths_overlap(&[], &users));
    }

    #[test]
    fn child_path_joins() {
        assert_eq!(child_path("posts", "k"), "posts/k");
        assert_eq!(child_path("posts/", "k"), "posts/k");
        assert_eq!(child_path("", "k"), "k");
    }
}
