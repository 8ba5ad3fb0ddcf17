//! Change streams behind the live views. Every item is a complete set of
//! frames the client can render without earlier state.

use std::{collections::HashMap, future, sync::Arc};

use futures::{
    StreamExt,
    stream::{self, BoxStream},
};
use serde_json::Value;

use crate::{
    backend::{BackendResult, RealtimeDatabase, SnapshotStream},
    error::{AppError, Result},
    models::{LiveEvent, Post, User},
    services::{
        comment_service, object_children, parse_children, post_service, stats_service,
    },
};

type SnapshotPair = (Option<Value>, Option<Value>);

enum Side {
    Left(Option<Value>),
    Right(Option<Value>),
}

/// Pairs the latest snapshot of both streams. Emits once both have
/// produced a first value, then on every change of either.
pub fn combine_latest(
    left: SnapshotStream,
    right: SnapshotStream,
) -> BoxStream<'static, BackendResult<SnapshotPair>> {
    let left = left.map(|update| update.map(Side::Left));
    let right = right.map(|update| update.map(Side::Right));

    stream::select(left, right)
        .scan(
            (None::<Option<Value>>, None::<Option<Value>>),
            |(latest_left, latest_right), update| {
                let output = match update {
                    Err(e) => Some(Err(e)),
                    Ok(side) => {
                        match side {
                            Side::Left(snapshot) => *latest_left = Some(snapshot),
                            Side::Right(snapshot) => *latest_right = Some(snapshot),
                        }
                        match (latest_left.as_ref(), latest_right.as_ref()) {
                            (Some(l), Some(r)) => Some(Ok((l.clone(), r.clone()))),
                            _ => None,
                        }
                    }
                };
                future::ready(Some(output))
            },
        )
        .filter_map(future::ready)
        .boxed()
}

#[derive(Debug, Clone)]
pub struct Viewer {
    pub user_id: String,
    pub is_admin: bool,
}

/// Post and comment frames for a single post view.
pub fn post_events(
    db: Arc<dyn RealtimeDatabase>,
    post_id: String,
    viewer: Viewer,
) -> BoxStream<'static, Result<Vec<LiveEvent>>> {
    let snapshots = combine_latest(
        db.subscribe(&format!("posts/{}", post_id)),
        db.subscribe("comments"),
    );

    snapshots
        .then(move |update| {
            let db = Arc::clone(&db);
            let post_id = post_id.clone();
            let viewer = viewer.clone();
            async move {
                let (post, comments) = update?;
                let post = post
                    .map(serde_json::from_value::<Post>)
                    .transpose()?
                    .map(|mut post| {
                        post.post_id = post_id.clone();
                        post
                    });

                let comments = comment_service::comments_in_snapshot(comments, &post_id);
                let authors = post_service::author_directory(db.as_ref()).await?;
                let comments = comment_service::responses(
                    comments,
                    &authors,
                    Some(viewer.user_id.as_str()),
                    viewer.is_admin,
                );

                Ok::<_, AppError>(vec![
                    LiveEvent::Post { post },
                    LiveEvent::Comments { comments },
                ])
            }
        })
        .boxed()
}

pub fn home_frames(posts: Option<Value>, users: Option<Value>) -> Vec<LiveEvent> {
    let stats = stats_service::stats_from(users.as_ref(), posts.as_ref());
    let authors: HashMap<String, User> = parse_children(object_children(users))
        .into_iter()
        .collect();
    let (top, latest) = post_service::home_lists(posts);

    vec![
        LiveEvent::Home {
            top_commented: top
                .into_iter()
                .map(|post| post_service::list_item(post, &authors))
                .collect(),
            latest: latest
                .into_iter()
                .map(|post| post_service::list_item(post, &authors))
                .collect(),
        },
        LiveEvent::Stats { stats },
    ]
}

/// Home lists and totals, refreshed on every change of posts or users.
pub fn home_events(db: &dyn RealtimeDatabase) -> BoxStream<'static, Result<Vec<LiveEvent>>> {
    combine_latest(db.subscribe("posts"), db.subscribe("users"))
        .map(|update| {
            let (posts, users) = update?;
            Ok(home_frames(posts, users))
        })
        .boxed()
}
