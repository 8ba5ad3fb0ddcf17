use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Firebase,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub max_file_size: usize,
    pub backend: BackendKind,

    // Hosted database and auth
    pub firebase_api_key: String,
    pub firebase_database_url: String,
    pub firebase_database_secret: Option<String>,

    // Image CDN
    pub cloudinary_cloud_name: String,
    pub cloudinary_upload_preset: String,

    // App settings
    pub app_name: String,
    pub default_avatar_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let backend = match env::var("BACKEND")
            .unwrap_or_else(|_| "firebase".to_string())
            .to_lowercase()
            .as_str()
        {
            "memory" => BackendKind::Memory,
            _ => BackendKind::Firebase,
        };

        let required = |name: &str| -> Result<String, env::VarError> {
            match backend {
                BackendKind::Firebase => env::var(name),
                BackendKind::Memory => Ok(env::var(name).unwrap_or_default()),
            }
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            jwt_secret: env::var("JWT_SECRET")?,
            session_ttl_hours: env::var("SESSION_TTL_HOURS")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or(24),
            max_file_size: env::var("MAX_FILE_SIZE")
                .unwrap_or_else(|_| "5242880".to_string()) // 5MB default
                .parse()
                .unwrap_or(5242880),
            backend,

            firebase_api_key: required("FIREBASE_API_KEY")?,
            firebase_database_url: required("FIREBASE_DATABASE_URL")?,
            firebase_database_secret: env::var("FIREBASE_DATABASE_SECRET").ok(),

            cloudinary_cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
            cloudinary_upload_preset: env::var("CLOUDINARY_UPLOAD_PRESET")
                .unwrap_or_else(|_| "profile_pictures".to_string()),

            app_name: env::var("APP_NAME").unwrap_or_else(|_| "Forum".to_string()),
            default_avatar_url: env::var("DEFAULT_AVATAR_URL")
                .unwrap_or_else(|_| "/assets/images/default-avatar.jpg".to_string()),
        })
    }

    /// Settings for running against the in-memory backends.
    pub fn local(jwt_secret: &str) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            allowed_origins: vec!["http://localhost:5173".to_string()],
            jwt_secret: jwt_secret.to_string(),
            session_ttl_hours: 24,
            max_file_size: 5242880,
            backend: BackendKind::Memory,
            firebase_api_key: String::new(),
            firebase_database_url: String::new(),
            firebase_database_secret: None,
            cloudinary_cloud_name: String::new(),
            cloudinary_upload_preset: "profile_pictures".to_string(),
            app_name: "Forum".to_string(),
            default_avatar_url: "/assets/images/default-avatar.jpg".to_string(),
        }
    }
}
