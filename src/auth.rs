use axum::{
    RequestPartsExt,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, Result},
    models::User,
    services::user_service,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // uid at the identity provider
    pub email: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String, // session id, revocable through the session store
}

impl Claims {
    pub fn new(
        user_id: &str,
        email: &str,
        ttl_hours: i64,
        jwt_secret: &str,
    ) -> Result<(String, Self)> {
        let now = Utc::now();
        let exp = now + Duration::hours(ttl_hours);
        let jti = Uuid::new_v4().to_string();

        let claims = Self {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(jwt_secret.as_ref()),
        )?;

        Ok((token, claims))
    }

    pub fn verify(token: &str, jwt_secret: &str) -> Result<Self> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(jwt_secret.as_ref()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }
}

/// Issues a token for `user_id` and registers its session.
pub async fn create_session(state: &AppState, user_id: &str, email: &str) -> Result<String> {
    let ttl_hours = state.config.session_ttl_hours;
    let (token, claims) = Claims::new(user_id, email, ttl_hours, &state.config.jwt_secret)?;

    state
        .sessions
        .store_session(&claims.jti, &claims.sub, (ttl_hours.max(0) as u64) * 3600)
        .await;

    Ok(token)
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    access_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub jti: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // Browsers cannot set headers on a WebSocket handshake, so the live
        // routes pass the token as `?access_token=`.
        let token = match parts.extract::<TypedHeader<Authorization<Bearer>>>().await {
            Ok(TypedHeader(Authorization(bearer))) => bearer.token().to_string(),
            Err(_) => parts
                .extract::<Query<TokenQuery>>()
                .await
                .ok()
                .and_then(|Query(query)| query.access_token)
                .ok_or_else(|| {
                    AppError::Authentication("Missing authorization header".to_string())
                })?,
        };

        let claims = Claims::verify(&token, &state.config.jwt_secret)?;

        match state.sessions.get_session(&claims.jti).await {
            Some(stored_user_id) if stored_user_id == claims.sub => {}
            Some(_) => return Err(AppError::Authentication("Invalid session".to_string())),
            None => return Err(AppError::Authentication("Session expired".to_string())),
        }

        Ok(AuthUser {
            user_id: claims.sub,
            email: claims.email,
            jti: claims.jti,
        })
    }
}

// Optional auth user (for endpoints that work with or without auth)
#[derive(Debug)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for OptionalAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(OptionalAuthUser(Some(user))),
            Err(_) => Ok(OptionalAuthUser(None)),
        }
    }
}

/// An authenticated user whose profile exists and who is not blocked.
#[derive(Debug, Clone)]
pub struct ActiveUser {
    pub auth: AuthUser,
    pub profile: User,
}

impl ActiveUser {
    pub fn user_id(&self) -> &str {
        &self.auth.user_id
    }
}

impl FromRequestParts<AppState> for ActiveUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        let profile = load_active_profile(state, &auth.user_id).await?;
        Ok(ActiveUser { auth, profile })
    }
}

pub async fn load_active_profile(state: &AppState, user_id: &str) -> Result<User> {
    let profile = user_service::get_user(state.db.as_ref(), user_id)
        .await?
        .ok_or_else(|| AppError::Authentication("User profile not found".to_string()))?;

    if profile.is_blocked {
        tracing::debug!("Rejected request from blocked user {}", user_id);
        return Err(AppError::Blocked);
    }

    Ok(profile)
}

#[derive(Debug, Clone)]
pub struct AdminUser(pub ActiveUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = ActiveUser::from_request_parts(parts, state).await?;
        if !user.profile.is_admin {
            return Err(AppError::Authorization("Admin access required".to_string()));
        }
        Ok(AdminUser(user))
    }
}
