use serde::{Deserialize, Serialize};
use validator::Validate;

/// A `users/{uid}` record. Flags are absent unless set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default)]
    pub is_admin: bool,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Fields written when an account is created.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub profile_picture: String,
    pub phone_number: Option<String>,
}

// Update user request
#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
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
}

#[derive(Debug, Deserialize)]
pub struct BlockUserRequest {
    pub blocked: bool,
}

#[derive(Debug, Deserialize)]
pub struct UserRoleRequest {
    pub admin: bool,
}

// User response (public view)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub uid: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub profile_picture: String,
    pub phone_number: Option<String>,
    pub is_blocked: bool,
    pub is_admin: bool,
}

impl UserResponse {
    pub fn new(uid: String, user: User, default_avatar: &str) -> Self {
        Self {
            uid,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            username: user.username,
            profile_picture: user
                .profile_picture
                .unwrap_or_else(|| default_avatar.to_string()),
            phone_number: user.phone_number,
            is_blocked: user.is_blocked,
            is_admin: user.is_admin,
        }
    }
}
