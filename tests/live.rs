mod common;

use std::time::Duration;

use axum_test::TestWebSocket;
use common::{TestApp, TestUser, spawn_http_app};
use forum_gateway::backend::RealtimeDatabase;
use serde_json::{Value, json};

const TITLE: &str = "A perfectly sized title";

/// Reads frames until one of `frame_type` satisfies `accept`.
async fn next_frame(
    socket: &mut TestWebSocket,
    frame_type: &str,
    accept: impl Fn(&Value) -> bool,
) -> Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let frame: Value = socket.receive_json().await;
            if frame["type"] == frame_type && accept(&frame) {
                return frame;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no matching {frame_type} frame"))
}

async fn open_post_socket(app: &TestApp, user: &TestUser, post_id: &str) -> TestWebSocket {
    app.server
        .get_websocket(&format!("/api/posts/{}/live", post_id))
        .add_query_param("access_token", &user.token)
        .await
        .into_websocket()
        .await
}

#[tokio::test]
async fn post_socket_starts_with_current_state() {
    let app = spawn_http_app();
    let alice = app.register("alice").await;
    let post_id = app.create_post(&alice, TITLE).await;

    let mut socket = open_post_socket(&app, &alice, &post_id).await;

    let post = next_frame(&mut socket, "post", |_| true).await;
    assert_eq!(post["post"]["title"], TITLE);
    assert_eq!(post["post"]["likes"], 0);

    let comments = next_frame(&mut socket, "comments", |_| true).await;
    assert_eq!(comments["comments"], json!([]));
}

#[tokio::test]
async fn votes_sent_over_the_socket_update_the_post() {
    let app = spawn_http_app();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let post_id = app.create_post(&alice, TITLE).await;

    let mut socket = open_post_socket(&app, &bob, &post_id).await;
    next_frame(&mut socket, "post", |_| true).await;

    socket
        .send_json(&json!({ "type": "vote", "kind": "likes" }))
        .await;
    let liked = next_frame(&mut socket, "post", |frame| frame["post"]["likes"] == 1).await;
    assert_eq!(liked["post"]["dislikes"], 0);

    socket
        .send_json(&json!({ "type": "vote", "kind": "dislikes" }))
        .await;
    next_frame(&mut socket, "post", |frame| {
        frame["post"]["likes"] == 0 && frame["post"]["dislikes"] == 1
    })
    .await;
}

#[tokio::test]
async fn comments_sent_over_the_socket_bump_the_count() {
    let app = spawn_http_app();
    let alice = app.register("alice").await;
    let post_id = app.create_post(&alice, TITLE).await;

    let mut socket = open_post_socket(&app, &alice, &post_id).await;
    next_frame(&mut socket, "comments", |_| true).await;

    socket
        .send_json(&json!({ "type": "comment", "content": "First!" }))
        .await;

    next_frame(&mut socket, "post", |frame| frame["post"]["commentCount"] == 1).await;
    let comments = next_frame(&mut socket, "comments", |frame| {
        frame["comments"].as_array().is_some_and(|c| c.len() == 1)
    })
    .await;
    assert_eq!(comments["comments"][0]["content"], "First!");
    assert_eq!(comments["comments"][0]["canDelete"], true);
}

#[tokio::test]
async fn user_blocked_after_connecting_gets_an_error_frame() {
    let app = spawn_http_app();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let post_id = app.create_post(&alice, TITLE).await;

    let mut socket = open_post_socket(&app, &bob, &post_id).await;
    next_frame(&mut socket, "post", |_| true).await;

    app.db
        .set(&format!("users/{}/isBlocked", bob.uid), json!(true))
        .await
        .unwrap();
    socket
        .send_json(&json!({ "type": "vote", "kind": "likes" }))
        .await;

    let error = next_frame(&mut socket, "error", |_| true).await;
    assert_eq!(
        error["message"],
        "Your account has been blocked by an administrator"
    );
    let likes = app
        .db
        .get(&format!("posts/{}/likes", post_id))
        .await
        .unwrap();
    assert_eq!(likes.unwrap_or(json!(0)), json!(0));
}

#[tokio::test]
async fn unrecognised_commands_get_an_error_frame() {
    let app = spawn_http_app();
    let alice = app.register("alice").await;
    let post_id = app.create_post(&alice, TITLE).await;

    let mut socket = open_post_socket(&app, &alice, &post_id).await;
    socket.send_json(&json!({ "type": "shout" })).await;

    let error = next_frame(&mut socket, "error", |_| true).await;
    assert_eq!(error["message"], "Unrecognised message");
}

#[tokio::test]
async fn post_socket_requires_a_session_and_a_post() {
    let app = spawn_http_app();
    let alice = app.register("alice").await;
    let post_id = app.create_post(&alice, TITLE).await;

    app.server
        .get_websocket(&format!("/api/posts/{}/live", post_id))
        .await
        .assert_status_unauthorized();

    app.server
        .get_websocket("/api/posts/missing/live")
        .add_query_param("access_token", &alice.token)
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn home_socket_follows_new_posts() {
    let app = spawn_http_app();
    let alice = app.register("alice").await;

    let mut socket = app
        .server
        .get_websocket("/api/home/live")
        .await
        .into_websocket()
        .await;
    let home = next_frame(&mut socket, "home", |_| true).await;
    assert_eq!(home["latest"], json!([]));
    assert_eq!(home["topCommented"], json!([]));

    app.create_post(&alice, TITLE).await;

    let home = next_frame(&mut socket, "home", |frame| {
        frame["latest"].as_array().is_some_and(|l| l.len() == 1)
    })
    .await;
    assert_eq!(home["latest"][0]["title"], TITLE);
    assert_eq!(home["latest"][0]["authorUsername"], "alice");

    next_frame(&mut socket, "stats", |frame| frame["stats"]["totalPosts"] == 1).await;
}

#[tokio::test]
async fn stats_socket_counts_new_users() {
    let app = spawn_http_app();
    app.register("alice").await;

    let mut socket = app
        .server
        .get_websocket("/api/stats/live")
        .await
        .into_websocket()
        .await;
    let stats = next_frame(&mut socket, "stats", |_| true).await;
    assert_eq!(stats["stats"], json!({ "totalUsers": 1, "totalPosts": 0 }));

    app.register("bob").await;
    next_frame(&mut socket, "stats", |frame| frame["stats"]["totalUsers"] == 2).await;
}
