use forum_gateway::backend::{
    CloudinaryMedia, FirebaseAuth, FirebaseDatabase, IdentityProvider, MediaHost, MemoryDatabase,
    MemoryIdentity, MemoryMedia, RealtimeDatabase,
};
use forum_gateway::config::{BackendKind, Config};
use forum_gateway::sessions::SessionStore;
use forum_gateway::{AppState, create_app};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Backends = (
    Arc<dyn RealtimeDatabase>,
    Arc<dyn IdentityProvider>,
    Arc<dyn MediaHost>,
);

fn build_backends(config: &Config) -> Backends {
    match config.backend {
        BackendKind::Firebase => {
            let client = reqwest::Client::new();
            let db: Arc<dyn RealtimeDatabase> = Arc::new(FirebaseDatabase::new(
                client.clone(),
                &config.firebase_database_url,
                config.firebase_database_secret.clone(),
            ));
            let identity: Arc<dyn IdentityProvider> =
                Arc::new(FirebaseAuth::new(client.clone(), &config.firebase_api_key));
            let media: Arc<dyn MediaHost> = Arc::new(CloudinaryMedia::new(
                client,
                &config.cloudinary_cloud_name,
                &config.cloudinary_upload_preset,
            ));
            (db, identity, media)
        }
        BackendKind::Memory => {
            let db: Arc<dyn RealtimeDatabase> = Arc::new(MemoryDatabase::new());
            let identity: Arc<dyn IdentityProvider> = Arc::new(MemoryIdentity::new());
            let media: Arc<dyn MediaHost> = Arc::new(MemoryMedia::new(format!(
                "http://{}:{}/media",
                config.host, config.port
            )));
            (db, identity, media)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forum_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let (db, identity, media) = build_backends(&config);
    match config.backend {
        BackendKind::Firebase => tracing::info!("Using hosted database, auth and image CDN"),
        BackendKind::Memory => tracing::warn!("Using in-memory backends; data is not persisted"),
    }

    // Create application state
    let state = AppState {
        db,
        identity,
        media,
        sessions: Arc::new(SessionStore::new()),
        config: Arc::new(config.clone()),
    };

    // Create application
    let app = create_app(state);

    // Create listener
    let listener = TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;
    tracing::info!("Server listening on {}:{}", config.host, config.port);

    // Start server
    axum::serve(listener, app).await?;

    Ok(())
}
