use futures::{StreamExt, stream::BoxStream};
use serde_json::Value;

use crate::{
    backend::RealtimeDatabase,
    error::{AppError, Result},
    models::Stats,
    services::live_service::combine_latest,
};

fn count_children(node: Option<&Value>) -> usize {
    match node {
        Some(Value::Object(map)) => map.len(),
        _ => 0,
    }
}

pub fn stats_from(users: Option<&Value>, posts: Option<&Value>) -> Stats {
    Stats {
        total_users: count_children(users),
        total_posts: count_children(posts),
    }
}

pub async fn get_stats(db: &dyn RealtimeDatabase) -> Result<Stats> {
    let users = db.get("users").await?;
    let posts = db.get("posts").await?;
    Ok(stats_from(users.as_ref(), posts.as_ref()))
}

/// Current totals, then new totals whenever users or posts change.
pub fn watch_stats(db: &dyn RealtimeDatabase) -> BoxStream<'static, Result<Stats>> {
    combine_latest(db.subscribe("users"), db.subscribe("posts"))
        .map(|update| {
            update
                .map(|(users, posts)| stats_from(users.as_ref(), posts.as_ref()))
                .map_err(AppError::from)
        })
        .boxed()
}
