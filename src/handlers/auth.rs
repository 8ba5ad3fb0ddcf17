use std::sync::LazyLock;

use axum::{extract::State, http::StatusCode, response::Json};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    AppState,
    auth::{AuthUser, create_session},
    backend::BackendError,
    error::{AppError, Result},
    handlers::enforce_rate_limit,
    models::{NewUser, UserResponse},
    services::user_service,
};

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\S+@\S+\.\S+$").unwrap());

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(
        min = 4,
        max = 32,
        message = "First name must be between 4 and 32 characters."
    ))]
    pub first_name: String,
    #[validate(length(
        min = 4,
        max = 32,
        message = "Last name must be between 4 and 32 characters."
    ))]
    pub last_name: String,
    #[validate(regex(path = *EMAIL_REGEX, message = "Please enter a valid email address."))]
    pub email: String,
    #[validate(length(
        min = 4,
        max = 16,
        message = "Username must be between 4 and 16 characters."
    ))]
    pub username: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long."))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match."))]
    pub confirm_password: String,
    /// Hosted URL returned by the image upload route.
    pub profile_picture: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required."))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(length(min = 1, message = "Email is required."))]
    pub email: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    payload.validate()?;

    let email = payload.email.trim().to_string();
    enforce_rate_limit(
        &state,
        &format!("register_attempt:{}", email.to_lowercase()),
        5,
        3600,
    )
    .await?;

    if user_service::email_registered(state.db.as_ref(), &email).await? {
        return Err(AppError::Conflict(
            "This email is already registered. Please use another one.".to_string(),
        ));
    }

    let identity = state.identity.sign_up(&email, &payload.password).await?;

    let profile_picture = payload
        .profile_picture
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| state.config.default_avatar_url.clone());

    let new_user = NewUser {
        first_name: payload.first_name,
        last_name: payload.last_name,
        email: email.clone(),
        username: payload.username,
        profile_picture,
        phone_number: payload.phone_number.filter(|phone| !phone.trim().is_empty()),
    };
    user_service::save_user(state.db.as_ref(), &identity.uid, &new_user).await?;

    let token = create_session(&state, &identity.uid, &email).await?;
    let user = user_service::get_user(state.db.as_ref(), &identity.uid)
        .await?
        .ok_or_else(|| AppError::Internal("Saved profile could not be read back".to_string()))?;

    tracing::info!("Registered user {}", identity.uid);
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful",
            "token": token,
            "user": UserResponse::new(identity.uid, user, &state.config.default_avatar_url)
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    payload.validate()?;

    let email = payload.email.trim().to_string();
    enforce_rate_limit(
        &state,
        &format!("login_attempt:{}", email.to_lowercase()),
        10,
        900,
    )
    .await?;

    let identity = state.identity.sign_in(&email, &payload.password).await?;
    let token = create_session(&state, &identity.uid, &identity.email).await?;

    let user = user_service::get_user(state.db.as_ref(), &identity.uid)
        .await?
        .map(|user| UserResponse::new(identity.uid.clone(), user, &state.config.default_avatar_url));

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Login successful",
            "token": token,
            "user": user
        })),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<(StatusCode, Json<Value>)> {
    state.sessions.delete_session(&auth_user.jti).await;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Logout successful"
        })),
    ))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    payload.validate()?;

    let email = payload.email.trim().to_string();
    enforce_rate_limit(
        &state,
        &format!("forgot_password:{}", email.to_lowercase()),
        3,
        3600,
    )
    .await?;

    match state.identity.send_password_reset(&email).await {
        Ok(()) => {}
        // Same answer whether or not the account exists
        Err(BackendError::UserNotFound) => {
            tracing::debug!("Password reset requested for unknown email");
        }
        Err(e) => return Err(e.into()),
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "If the email exists, a password reset link has been sent"
        })),
    ))
}

pub async fn me(State(state): State<AppState>, auth_user: AuthUser) -> Result<Json<UserResponse>> {
    let user = user_service::get_user(state.db.as_ref(), &auth_user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(UserResponse::new(
        auth_user.user_id,
        user,
        &state.config.default_avatar_url,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegisterRequest {
        RegisterRequest {
            first_name: "Maria".into(),
            last_name: "Petrova".into(),
            email: "maria@example.com".into(),
            username: "maria".into(),
            password: "secret1".into(),
            confirm_password: "secret1".into(),
            profile_picture: None,
            phone_number: None,
        }
    }

    #[test]
    fn valid_registration_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn email_shape_is_checked() {
        let mut payload = request();
        payload.email = "maria@example".into();
        assert!(payload.validate().is_err());

        payload.email = "has space@example.com".into();
        assert!(payload.validate().is_err());
    }

    #[test]
    fn password_confirmation_must_match() {
        let mut payload = request();
        payload.confirm_password = "secret2".into();

        let message = AppError::from(payload.validate().unwrap_err()).to_string();
        assert!(message.contains("Passwords do not match."));
    }

    #[test]
    fn username_bounds() {
        let mut payload = request();
        payload.username = "abc".into();
        assert!(payload.validate().is_err());
        payload.username = "a".repeat(17);
        assert!(payload.validate().is_err());
    }
}
