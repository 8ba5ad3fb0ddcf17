pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod sessions;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderValue, Method,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    backend::{IdentityProvider, MediaHost, RealtimeDatabase},
    config::Config,
    sessions::SessionStore,
};

/// Room for multipart framing around the image itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn RealtimeDatabase>,
    pub identity: Arc<dyn IdentityProvider>,
    pub media: Arc<dyn MediaHost>,
    pub sessions: Arc<SessionStore>,
    pub config: Arc<Config>,
}

pub fn create_app(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid allowed origin {:?}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    // Public routes (no auth required, except creating a post which
    // shares its path with the feed)
    let public_routes = Router::new()
        .route("/health", get(handlers::pages::health))
        .route("/api/home", get(handlers::pages::home))
        .route("/api/home/live", get(handlers::pages::home_live))
        .route("/api/about", get(handlers::pages::about))
        .route("/api/stats", get(handlers::pages::stats))
        .route("/api/stats/live", get(handlers::pages::stats_live))
        .route(
            "/api/posts",
            get(handlers::posts::get_posts).post(handlers::posts::create_post),
        )
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route(
            "/api/auth/forgot-password",
            post(handlers::auth::forgot_password),
        )
        .route(
            "/api/uploads/image",
            post(handlers::upload::upload_image).layer(DefaultBodyLimit::max(
                state.config.max_file_size + MULTIPART_OVERHEAD,
            )),
        );

    // Protected routes
    let protected_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/me", get(handlers::auth::me))
        // Post routes
        .route(
            "/api/posts/{post_id}",
            get(handlers::posts::get_post)
                .put(handlers::posts::update_post)
                .delete(handlers::posts::delete_post),
        )
        .route(
            "/api/posts/{post_id}/vote",
            post(handlers::posts::vote_post),
        )
        .route(
            "/api/posts/{post_id}/live",
            get(handlers::posts::post_live),
        )
        // Comment routes
        .route(
            "/api/posts/{post_id}/comments",
            post(handlers::comments::create_comment),
        )
        .route(
            "/api/comments/{comment_id}",
            delete(handlers::comments::delete_comment),
        )
        // User routes
        .route("/api/users/search", get(handlers::users::search_users))
        .route(
            "/api/users/{user_id}",
            get(handlers::users::get_profile).put(handlers::users::update_user),
        )
        .route(
            "/api/users/{user_id}/blocked",
            put(handlers::users::set_blocked),
        )
        .route(
            "/api/users/{user_id}/admin",
            put(handlers::users::set_admin),
        );

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(handlers::pages::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
