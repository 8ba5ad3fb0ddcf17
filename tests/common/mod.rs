#![allow(dead_code)]

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use forum_gateway::{
    AppState,
    backend::{MemoryDatabase, MemoryIdentity, MemoryMedia, RealtimeDatabase},
    config::Config,
    create_app,
    sessions::SessionStore,
};
use serde_json::{Value, json};

pub struct TestApp {
    pub server: TestServer,
    pub db: MemoryDatabase,
    pub identity: Arc<MemoryIdentity>,
    pub media: Arc<MemoryMedia>,
}

pub struct TestUser {
    pub uid: String,
    pub token: String,
    pub email: String,
}

pub fn spawn_app() -> TestApp {
    spawn(false)
}

/// Serves over a real socket so the live routes can upgrade.
pub fn spawn_http_app() -> TestApp {
    spawn(true)
}

fn spawn(http_transport: bool) -> TestApp {
    let db = MemoryDatabase::new();
    let identity = Arc::new(MemoryIdentity::with_hash_cost(4));
    let media = Arc::new(MemoryMedia::new("https://cdn.test"));

    let state = AppState {
        db: Arc::new(db.clone()),
        identity: identity.clone(),
        media: media.clone(),
        sessions: Arc::new(SessionStore::new()),
        config: Arc::new(Config::local("test-secret")),
    };

    let app = create_app(state);
    let server = if http_transport {
        TestServer::builder().http_transport().build(app).unwrap()
    } else {
        TestServer::new(app).unwrap()
    };
    TestApp {
        server,
        db,
        identity,
        media,
    }
}

pub fn registration(username: &str) -> Value {
    json!({
        "firstName": "Alice",
        "lastName": "Tester",
        "email": format!("{}@example.com", username),
        "username": username,
        "password": "secret1",
        "confirmPassword": "secret1"
    })
}

impl TestApp {
    pub async fn register(&self, username: &str) -> TestUser {
        let response = self
            .server
            .post("/api/auth/register")
            .json(&registration(username))
            .await;
        response.assert_status(StatusCode::CREATED);

        let body: Value = response.json();
        TestUser {
            uid: body["user"]["uid"].as_str().unwrap().to_string(),
            token: body["token"].as_str().unwrap().to_string(),
            email: format!("{}@example.com", username),
        }
    }

    pub async fn register_admin(&self, username: &str) -> TestUser {
        let user = self.register(username).await;
        self.db
            .set(&format!("users/{}/isAdmin", user.uid), json!(true))
            .await
            .unwrap();
        user
    }

    pub async fn create_post(&self, user: &TestUser, title: &str) -> String {
        let response = self
            .server
            .post("/api/posts")
            .authorization_bearer(&user.token)
            .json(&json!({
                "title": title,
                "content": "This content is comfortably longer than thirty two characters."
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["postId"]
            .as_str()
            .unwrap()
            .to_string()
    }
}
