use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    AppState,
    auth::{ActiveUser, AdminUser},
    error::{AppError, Result},
    models::{
        BlockUserRequest, SortOrder, UpdateUserRequest, User, UserResponse, UserRoleRequest,
    },
    services::{comment_service, contains_ignore_case, post_service, user_service},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileTab {
    #[default]
    Posts,
    Comments,
}

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    #[serde(default)]
    pub tab: ProfileTab,
    pub search: Option<String>,
    #[serde(default)]
    pub sort: SortOrder,
}

#[derive(Debug, Deserialize)]
pub struct SearchUsersQuery {
    #[serde(default)]
    pub q: String,
}

async fn existing_user(state: &AppState, user_id: &str) -> Result<User> {
    user_service::get_user(state.db.as_ref(), user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub async fn search_users(
    State(state): State<AppState>,
    _user: ActiveUser,
    Query(params): Query<SearchUsersQuery>,
) -> Result<Json<Value>> {
    let users = user_service::search_by_username(state.db.as_ref(), &params.q)
        .await?
        .into_iter()
        .map(|(uid, user)| UserResponse::new(uid, user, &state.config.default_avatar_url))
        .collect::<Vec<_>>();

    Ok(Json(json!({ "users": users })))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    viewer: ActiveUser,
    Query(params): Query<ProfileQuery>,
) -> Result<Json<Value>> {
    let db = state.db.as_ref();
    let user = existing_user(&state, &user_id).await?;
    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let items = match params.tab {
        ProfileTab::Posts => {
            let posts = post_service::filter_and_sort(
                post_service::get_user_posts(db, &user_id).await?,
                search,
                params.sort,
            );
            let authors = HashMap::from([(user_id.clone(), user.clone())]);
            let posts: Vec<_> = posts
                .into_iter()
                .map(|post| post_service::list_item(post, &authors))
                .collect();
            serde_json::to_value(posts)?
        }
        ProfileTab::Comments => {
            let mut comments = comment_service::user_comments_with_titles(db, &user_id).await?;
            if let Some(search) = search {
                comments.retain(|c| contains_ignore_case(&c.comment.content, search));
            }
            params
                .sort
                .sort_by_created(&mut comments, |c| {
                    (c.comment.created_at, c.comment.comment_id.clone())
                });
            serde_json::to_value(comments)?
        }
    };

    let is_own_profile = viewer.user_id() == user_id;
    Ok(Json(json!({
        "user": UserResponse::new(user_id, user, &state.config.default_avatar_url),
        "tab": params.tab,
        "sort": params.sort,
        "items": items,
        "isOwnProfile": is_own_profile,
        "canModerate": viewer.profile.is_admin && !is_own_profile,
    })))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    user: ActiveUser,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    if user.user_id() != user_id {
        return Err(AppError::Authorization(
            "You can only edit your own profile".to_string(),
        ));
    }

    payload.validate()?;

    user_service::update_names(
        state.db.as_ref(),
        &user_id,
        &payload.first_name,
        &payload.last_name,
    )
    .await?;

    let updated = existing_user(&state, &user_id).await?;
    Ok(Json(UserResponse::new(
        user_id,
        updated,
        &state.config.default_avatar_url,
    )))
}

fn reject_self_moderation(admin: &ActiveUser, target_id: &str) -> Result<()> {
    if admin.user_id() == target_id {
        return Err(AppError::Authorization(
            "You cannot change your own status".to_string(),
        ));
    }
    Ok(())
}

pub async fn set_blocked(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<BlockUserRequest>,
) -> Result<Json<UserResponse>> {
    reject_self_moderation(&admin, &user_id)?;
    existing_user(&state, &user_id).await?;

    user_service::set_blocked(state.db.as_ref(), &user_id, payload.blocked).await?;

    let updated = existing_user(&state, &user_id).await?;
    Ok(Json(UserResponse::new(
        user_id,
        updated,
        &state.config.default_avatar_url,
    )))
}

pub async fn set_admin(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<UserRoleRequest>,
) -> Result<Json<UserResponse>> {
    reject_self_moderation(&admin, &user_id)?;
    existing_user(&state, &user_id).await?;

    user_service::set_admin(state.db.as_ref(), &user_id, payload.admin).await?;

    let updated = existing_user(&state, &user_id).await?;
    Ok(Json(UserResponse::new(
        user_id,
        updated,
        &state.config.default_avatar_url,
    )))
}
