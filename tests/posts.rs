mod common;

use axum::http::StatusCode;
use common::spawn_app;
use serde_json::{Value, json};

const TITLE: &str = "A perfectly sized title";

#[tokio::test]
async fn title_bounds_are_enforced() {
    let app = spawn_app();
    let user = app.register("alice").await;
    let content = "This content is comfortably longer than thirty two characters.";

    let too_long = "x".repeat(65);
    for title in ["Too short", too_long.as_str()] {
        let response = app
            .server
            .post("/api/posts")
            .authorization_bearer(&user.token)
            .json(&json!({ "title": title, "content": content }))
            .await;
        response.assert_status_bad_request();
        response.assert_json_contains(&json!({
            "error": "title: Title must be between 16 and 64 characters long."
        }));
    }
}

#[tokio::test]
async fn feed_lists_posts_with_authors() {
    let app = spawn_app();
    let user = app.register("alice").await;
    let first = app.create_post(&user, "The first post of many").await;
    let second = app.create_post(&user, "The second post of many").await;

    let response = app.server.get("/api/posts").await;
    response.assert_status_ok();
    let body: Value = response.json();
    let posts = body["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["postId"], json!(second));
    assert_eq!(posts[1]["postId"], json!(first));
    assert_eq!(posts[0]["authorUsername"], json!("alice"));

    let response = app
        .server
        .get("/api/posts")
        .add_query_param("search", "FIRST")
        .add_query_param("sort", "oldest")
        .await;
    let body: Value = response.json();
    assert_eq!(body["posts"].as_array().unwrap().len(), 1);
    assert_eq!(body["sort"], json!("oldest"));
}

#[tokio::test]
async fn post_detail_requires_a_session() {
    let app = spawn_app();
    let user = app.register("alice").await;
    let post_id = app.create_post(&user, TITLE).await;

    app.server
        .get(&format!("/api/posts/{}", post_id))
        .await
        .assert_status_unauthorized();

    let response = app
        .server
        .get(&format!("/api/posts/{}", post_id))
        .authorization_bearer(&user.token)
        .await;
    response.assert_status_ok();
    response.assert_json_contains(&json!({
        "postId": post_id,
        "title": TITLE,
        "canEdit": true,
        "canDelete": false,
        "author": { "uid": user.uid, "username": "alice" }
    }));
}

#[tokio::test]
async fn voting_toggles_and_switches() {
    let app = spawn_app();
    let author = app.register("alice").await;
    let voter = app.register("bobby").await;
    let post_id = app.create_post(&author, TITLE).await;
    let vote_path = format!("/api/posts/{}/vote", post_id);

    let vote = |kind: &'static str| {
        app.server
            .post(&vote_path)
            .authorization_bearer(&voter.token)
            .json(&json!({ "type": kind }))
    };

    vote("likes").await.assert_json(&json!({
        "likes": 1, "dislikes": 0, "userVote": "likes"
    }));
    vote("dislikes").await.assert_json(&json!({
        "likes": 0, "dislikes": 1, "userVote": "dislikes"
    }));
    vote("dislikes").await.assert_json(&json!({
        "likes": 0, "dislikes": 0, "userVote": null
    }));
}

#[tokio::test]
async fn comment_count_tracks_comments() {
    let app = spawn_app();
    let author = app.register("alice").await;
    let commenter = app.register("bobby").await;
    let post_id = app.create_post(&author, TITLE).await;

    let mut comment_ids = Vec::new();
    for text in ["first!", "second"] {
        let response = app
            .server
            .post(&format!("/api/posts/{}/comments", post_id))
            .authorization_bearer(&commenter.token)
            .json(&json!({ "content": text }))
            .await;
        response.assert_status(StatusCode::CREATED);
        comment_ids.push(
            response.json::<Value>()["comment"]["commentId"]
                .as_str()
                .unwrap()
                .to_string(),
        );
    }

    // Someone else's comment cannot be deleted
    app.server
        .delete(&format!("/api/comments/{}", comment_ids[0]))
        .authorization_bearer(&author.token)
        .await
        .assert_status_forbidden();

    app.server
        .delete(&format!("/api/comments/{}", comment_ids[0]))
        .authorization_bearer(&commenter.token)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = app
        .server
        .get(&format!("/api/posts/{}", post_id))
        .authorization_bearer(&author.token)
        .await;
    let body: Value = response.json();
    assert_eq!(body["commentCount"], json!(1));
    assert_eq!(body["comments"].as_array().unwrap().len(), 1);
    assert_eq!(body["comments"][0]["content"], json!("second"));
    assert_eq!(body["comments"][0]["authorName"], json!("Alice Tester"));
}

#[tokio::test]
async fn blank_comment_is_rejected() {
    let app = spawn_app();
    let user = app.register("alice").await;
    let post_id = app.create_post(&user, TITLE).await;

    app.server
        .post(&format!("/api/posts/{}/comments", post_id))
        .authorization_bearer(&user.token)
        .json(&json!({ "content": "   " }))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn only_the_author_edits() {
    let app = spawn_app();
    let author = app.register("alice").await;
    let other = app.register("bobby").await;
    let post_id = app.create_post(&author, TITLE).await;
    let body = json!({ "content": "Edited content that is still longer than the minimum." });

    app.server
        .put(&format!("/api/posts/{}", post_id))
        .authorization_bearer(&other.token)
        .json(&body)
        .await
        .assert_status_forbidden();

    app.server
        .put(&format!("/api/posts/{}", post_id))
        .authorization_bearer(&author.token)
        .json(&body)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn only_admins_delete_posts() {
    let app = spawn_app();
    let author = app.register("alice").await;
    let admin = app.register_admin("admin").await;
    let post_id = app.create_post(&author, TITLE).await;

    app.server
        .delete(&format!("/api/posts/{}", post_id))
        .authorization_bearer(&author.token)
        .await
        .assert_status_forbidden();

    app.server
        .delete(&format!("/api/posts/{}", post_id))
        .authorization_bearer(&admin.token)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    app.server
        .get(&format!("/api/posts/{}", post_id))
        .authorization_bearer(&admin.token)
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn home_lists_and_stats() {
    let app = spawn_app();
    let user = app.register("alice").await;
    let quiet = app.create_post(&user, "A post nobody comments on").await;
    let busy = app.create_post(&user, "A post everybody comments on").await;

    app.server
        .post(&format!("/api/posts/{}/comments", busy))
        .authorization_bearer(&user.token)
        .json(&json!({ "content": "hello" }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = app.server.get("/api/home").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["topCommented"][0]["postId"], json!(busy));
    assert_eq!(body["latest"][0]["postId"], json!(busy));
    assert_eq!(body["latest"][1]["postId"], json!(quiet));
    assert_eq!(body["stats"], json!({ "totalUsers": 1, "totalPosts": 2 }));
}

#[tokio::test]
async fn unknown_routes_are_json_404s() {
    let app = spawn_app();
    let response = app.server.get("/no/such/page").await;
    response.assert_status_not_found();
    response.assert_json_contains(&json!({ "status": 404 }));
}
