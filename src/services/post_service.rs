use std::collections::HashMap;

use chrono::Utc;
use serde_json::{Map, Value, json};

use crate::{
    backend::{Query, RealtimeDatabase, push_id, tree},
    error::{AppError, Result},
    models::{Post, PostListItem, SortOrder, User, VoteKind, VoteResponse},
    services::{contains_ignore_case, object_children, parse_children, user_service},
};

const POSTS: &str = "posts";
pub const HOME_LIST_SIZE: usize = 10;

fn post_path(post_id: &str) -> String {
    format!("{}/{}", POSTS, post_id)
}

pub async fn create_post(
    db: &dyn RealtimeDatabase,
    author_id: &str,
    title: &str,
    content: &str,
) -> Result<String> {
    let post_id = push_id::generate();
    let post = Post {
        post_id: post_id.clone(),
        author_id: author_id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        created_at: Utc::now().timestamp_millis(),
        ..Post::default()
    };

    db.set(&post_path(&post_id), serde_json::to_value(&post)?)
        .await?;

    tracing::info!("User {} created post {}", author_id, post_id);
    Ok(post_id)
}

pub async fn get_post(db: &dyn RealtimeDatabase, post_id: &str) -> Result<Option<Post>> {
    let Some(value) = db.get(&post_path(post_id)).await? else {
        return Ok(None);
    };
    Ok(Some(parse_post(post_id, value)?))
}

/// Older records may lack `postId`; the key is authoritative.
fn parse_post(post_id: &str, value: Value) -> Result<Post> {
    let mut post: Post = serde_json::from_value(value)?;
    post.post_id = post_id.to_string();
    Ok(post)
}

pub async fn post_exists(db: &dyn RealtimeDatabase, post_id: &str) -> Result<bool> {
    Ok(db.get(&post_path(post_id)).await?.is_some())
}

fn posts_from(children: Vec<(String, Value)>) -> Vec<Post> {
    parse_children::<Post>(children)
        .into_iter()
        .map(|(key, mut post)| {
            post.post_id = key;
            post
        })
        .collect()
}

pub async fn get_posts(db: &dyn RealtimeDatabase) -> Result<Vec<Post>> {
    Ok(posts_from(object_children(db.get(POSTS).await?)))
}

/// Author lookup used to decorate feed entries.
pub async fn author_directory(db: &dyn RealtimeDatabase) -> Result<HashMap<String, User>> {
    Ok(user_service::get_all_users(db).await?.into_iter().collect())
}

pub fn list_item(post: Post, authors: &HashMap<String, User>) -> PostListItem {
    let author = authors.get(&post.author_id);
    PostListItem {
        author_name: author.map(User::display_name),
        author_username: author.map(|user| user.username.clone()),
        post_id: post.post_id,
        title: post.title,
        content: post.content,
        author_id: post.author_id,
        created_at: post.created_at,
        likes: post.likes,
        dislikes: post.dislikes,
        comment_count: post.comment_count,
    }
}

pub fn filter_and_sort(mut posts: Vec<Post>, search: Option<&str>, sort: SortOrder) -> Vec<Post> {
    if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
        posts.retain(|post| contains_ignore_case(&post.title, search));
    }
    // Push ids are chronological, so they order posts created in the same millisecond
    sort.sort_by_created(&mut posts, |post| (post.created_at, post.post_id.clone()));
    posts
}

pub async fn get_all_posts(
    db: &dyn RealtimeDatabase,
    search: Option<&str>,
    sort: SortOrder,
) -> Result<Vec<PostListItem>> {
    let posts = filter_and_sort(get_posts(db).await?, search, sort);
    let authors = author_directory(db).await?;
    Ok(posts
        .into_iter()
        .map(|post| list_item(post, &authors))
        .collect())
}

pub async fn get_user_posts(db: &dyn RealtimeDatabase, user_id: &str) -> Result<Vec<Post>> {
    let query = Query::order_by_child("authorId").equal_to(user_id);
    Ok(posts_from(db.query(POSTS, &query).await?))
}

pub async fn update_content(
    db: &dyn RealtimeDatabase,
    post_id: &str,
    editor_id: &str,
    content: &str,
) -> Result<()> {
    let post = get_post(db, post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    if post.author_id != editor_id {
        return Err(AppError::Authorization(
            "Only the author can edit this post".to_string(),
        ));
    }

    let mut fields = Map::new();
    fields.insert("content".to_string(), json!(content));
    db.update(&post_path(post_id), fields).await?;
    Ok(())
}

/// Comments of the post are left in place.
pub async fn delete_post(db: &dyn RealtimeDatabase, post_id: &str) -> Result<()> {
    if !post_exists(db, post_id).await? {
        return Err(AppError::NotFound("Post not found".to_string()));
    }
    db.remove(&post_path(post_id)).await?;
    tracing::info!("Deleted post {}", post_id);
    Ok(())
}

fn top_commented_query() -> Query {
    Query::order_by_child("commentCount").limit_to_last(HOME_LIST_SIZE)
}

fn latest_query() -> Query {
    Query::order_by_child("createdAt").limit_to_last(HOME_LIST_SIZE)
}

/// Query results come back ascending; home lists show the largest first.
fn descending(children: Vec<(String, Value)>) -> Vec<Post> {
    let mut posts = posts_from(children);
    posts.reverse();
    posts
}

pub async fn top_commented(db: &dyn RealtimeDatabase) -> Result<Vec<Post>> {
    Ok(descending(db.query(POSTS, &top_commented_query()).await?))
}

pub async fn latest(db: &dyn RealtimeDatabase) -> Result<Vec<Post>> {
    Ok(descending(db.query(POSTS, &latest_query()).await?))
}

/// Both home lists computed from a snapshot of the whole `posts` node.
pub fn home_lists(snapshot: Option<Value>) -> (Vec<Post>, Vec<Post>) {
    let top = descending(tree::apply_query(snapshot.clone(), &top_commented_query()));
    let latest = descending(tree::apply_query(snapshot, &latest_query()));
    (top, latest)
}

pub async fn vote(
    db: &dyn RealtimeDatabase,
    post_id: &str,
    user_id: &str,
    kind: VoteKind,
) -> Result<VoteResponse> {
    let post = get_post(db, post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    let mut tally = post.tally();
    let user_vote = tally.cast(user_id, kind);

    let mut fields = Map::new();
    fields.insert("likes".to_string(), json!(tally.likes));
    fields.insert("dislikes".to_string(), json!(tally.dislikes));
    fields.insert(
        format!("usersVoted/{}", user_id),
        user_vote.map_or(Value::Null, |kind| json!(kind)),
    );
    db.update(&post_path(post_id), fields).await?;

    tracing::debug!("User {} voted {:?} on post {}", user_id, user_vote, post_id);
    Ok(VoteResponse {
        likes: tally.likes,
        dislikes: tally.dislikes,
        user_vote,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryDatabase;

    fn stored(id: &str, created_at: i64, comment_count: i64) -> Value {
        json!({
            "postId": id,
            "authorId": "u1",
            "title": format!("Post number {}", id),
            "content": "c",
            "createdAt": created_at,
            "likes": 0,
            "dislikes": 0,
            "commentCount": comment_count
        })
    }

    #[tokio::test]
    async fn created_post_starts_at_zero() {
        let db = MemoryDatabase::new();
        let id = create_post(&db, "u1", "A title that is long", "body")
            .await
            .unwrap();

        let post = get_post(&db, &id).await.unwrap().unwrap();
        assert_eq!(post.post_id, id);
        assert_eq!(post.author_id, "u1");
        assert_eq!((post.likes, post.dislikes, post.comment_count), (0, 0, 0));
        assert!(post.created_at > 0);
    }

    #[tokio::test]
    async fn vote_toggles_and_switches() {
        let db = MemoryDatabase::new();
        let id = create_post(&db, "u1", "A title that is long", "body")
            .await
            .unwrap();

        let first = vote(&db, &id, "u2", VoteKind::Likes).await.unwrap();
        assert_eq!((first.likes, first.dislikes), (1, 0));

        let switched = vote(&db, &id, "u2", VoteKind::Dislikes).await.unwrap();
        assert_eq!((switched.likes, switched.dislikes), (0, 1));

        let undone = vote(&db, &id, "u2", VoteKind::Dislikes).await.unwrap();
        assert_eq!((undone.likes, undone.dislikes, undone.user_vote), (0, 0, None));

        let post = get_post(&db, &id).await.unwrap().unwrap();
        assert!(post.users_voted.is_empty());
    }

    #[tokio::test]
    async fn voting_on_missing_post_is_not_found() {
        let db = MemoryDatabase::new();
        assert!(matches!(
            vote(&db, "missing", "u1", VoteKind::Likes).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn only_author_edits() {
        let db = MemoryDatabase::new();
        let id = create_post(&db, "u1", "A title that is long", "body")
            .await
            .unwrap();

        assert!(matches!(
            update_content(&db, &id, "u2", "new").await,
            Err(AppError::Authorization(_))
        ));
        update_content(&db, &id, "u1", "new").await.unwrap();
        assert_eq!(get_post(&db, &id).await.unwrap().unwrap().content, "new");
    }

    #[tokio::test]
    async fn home_lists_are_bounded_and_descending() {
        let mut posts = Map::new();
        for i in 0..15_i64 {
            let id = format!("p{:02}", i);
            posts.insert(id.clone(), stored(&id, 1_000 + i, (i * 7) % 15));
        }
        let db = MemoryDatabase::with_data(json!({ "posts": posts }));

        let top = top_commented(&db).await.unwrap();
        assert_eq!(top.len(), 10);
        assert!(top.windows(2).all(|w| w[0].comment_count >= w[1].comment_count));
        assert_eq!(top[0].comment_count, 14);

        let newest = latest(&db).await.unwrap();
        assert_eq!(newest.len(), 10);
        assert_eq!(newest[0].post_id, "p14");
        assert_eq!(newest[9].post_id, "p05");

        let (snap_top, snap_latest) = home_lists(db.get("posts").await.unwrap());
        assert_eq!(snap_top, top);
        assert_eq!(snap_latest, newest);
    }

    #[tokio::test]
    async fn search_and_sort() {
        let db = MemoryDatabase::with_data(json!({
            "posts": {
                "a": stored("a", 1, 0),
                "b": stored("b", 3, 0),
                "c": stored("c", 2, 0)
            },
            "users": {
                "u1": { "firstName": "Maria", "lastName": "Petrova", "username": "maria", "email": "m@e.co" }
            }
        }));

        let newest = get_all_posts(&db, None, SortOrder::Newest).await.unwrap();
        let ids: Vec<_> = newest.iter().map(|p| p.post_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(newest[0].author_username.as_deref(), Some("maria"));

        let found = get_all_posts(&db, Some("NUMBER c"), SortOrder::Oldest)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].post_id, "c");
    }

    #[tokio::test]
    async fn user_posts_filter_by_author() {
        let db = MemoryDatabase::new();
        create_post(&db, "u1", "A title that is long", "x").await.unwrap();
        create_post(&db, "u2", "A title that is long", "y").await.unwrap();

        let posts = get_user_posts(&db, "u2").await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].content, "y");
    }
}
