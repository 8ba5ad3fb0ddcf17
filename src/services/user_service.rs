use serde_json::{Map, Value, json};

use crate::{
    backend::RealtimeDatabase,
    error::Result,
    models::{NewUser, User},
    services::{contains_ignore_case, object_children, parse_children},
};

const USERS: &str = "users";

fn user_path(user_id: &str) -> String {
    format!("{}/{}", USERS, user_id)
}

pub async fn save_user(db: &dyn RealtimeDatabase, user_id: &str, user: &NewUser) -> Result<()> {
    let mut record = json!({
        "firstName": user.first_name,
        "lastName": user.last_name,
        "email": user.email,
        "username": user.username,
        "profilePicture": user.profile_picture,
    });
    if let (Some(phone), Some(fields)) = (&user.phone_number, record.as_object_mut()) {
        fields.insert("phoneNumber".to_string(), json!(phone));
    }

    db.set(&user_path(user_id), record).await?;
    tracing::info!("Saved profile for user {}", user_id);
    Ok(())
}

pub async fn get_user(db: &dyn RealtimeDatabase, user_id: &str) -> Result<Option<User>> {
    let Some(value) = db.get(&user_path(user_id)).await? else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_value(value)?))
}

pub async fn get_profile_picture(
    db: &dyn RealtimeDatabase,
    user_id: &str,
    default_avatar: &str,
) -> Result<String> {
    let picture = db
        .get(&format!("{}/profilePicture", user_path(user_id)))
        .await?
        .and_then(|value| value.as_str().map(str::to_string))
        .filter(|url| !url.is_empty());

    Ok(picture.unwrap_or_else(|| default_avatar.to_string()))
}

pub async fn get_all_users(db: &dyn RealtimeDatabase) -> Result<Vec<(String, User)>> {
    let users = db.get(USERS).await?;
    Ok(parse_children(object_children(users)))
}

pub async fn get_all_emails(db: &dyn RealtimeDatabase) -> Result<Vec<String>> {
    Ok(get_all_users(db)
        .await?
        .into_iter()
        .map(|(_, user)| user.email)
        .collect())
}

pub async fn email_registered(db: &dyn RealtimeDatabase, email: &str) -> Result<bool> {
    let email = email.trim();
    Ok(get_all_emails(db)
        .await?
        .iter()
        .any(|stored| stored.trim().eq_ignore_ascii_case(email)))
}

pub async fn search_by_username(
    db: &dyn RealtimeDatabase,
    query: &str,
) -> Result<Vec<(String, User)>> {
    let query = query.trim();
    Ok(get_all_users(db)
        .await?
        .into_iter()
        .filter(|(_, user)| contains_ignore_case(&user.username, query))
        .collect())
}

pub async fn get_display_name(db: &dyn RealtimeDatabase, user_id: &str) -> Result<Option<String>> {
    Ok(get_user(db, user_id).await?.map(|user| user.display_name()))
}

pub async fn update_names(
    db: &dyn RealtimeDatabase,
    user_id: &str,
    first_name: &str,
    last_name: &str,
) -> Result<()> {
    let mut fields = Map::new();
    fields.insert("firstName".to_string(), json!(first_name));
    fields.insert("lastName".to_string(), json!(last_name));
    db.update(&user_path(user_id), fields).await?;
    Ok(())
}

/// Flags are stored only while set; clearing one removes the key.
async fn set_flag(db: &dyn RealtimeDatabase, user_id: &str, flag: &str, on: bool) -> Result<()> {
    let mut fields = Map::new();
    fields.insert(
        flag.to_string(),
        if on { Value::Bool(true) } else { Value::Null },
    );
    db.update(&user_path(user_id), fields).await?;
    tracing::info!("Set {}={} for user {}", flag, on, user_id);
    Ok(())
}

pub async fn set_blocked(db: &dyn RealtimeDatabase, user_id: &str, blocked: bool) -> Result<()> {
    set_flag(db, user_id, "isBlocked", blocked).await
}

pub async fn set_admin(db: &dyn RealtimeDatabase, user_id: &str, admin: bool) -> Result<()> {
    set_flag(db, user_id, "isAdmin", admin).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryDatabase;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            first_name: "First".into(),
            last_name: "Last".into(),
            email: email.into(),
            username: username.into(),
            profile_picture: String::new(),
            phone_number: None,
        }
    }

    #[tokio::test]
    async fn save_and_read_back() {
        let db = MemoryDatabase::new();
        save_user(&db, "u1", &new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        let user = get_user(&db, "u1").await.unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert!(!user.is_admin);
        assert_eq!(
            get_display_name(&db, "u1").await.unwrap().as_deref(),
            Some("First Last")
        );
        assert!(get_user(&db, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_picture_falls_back_to_default() {
        let db = MemoryDatabase::new();
        save_user(&db, "u1", &new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        assert_eq!(
            get_profile_picture(&db, "u1", "/default.jpg").await.unwrap(),
            "/default.jpg"
        );
    }

    #[tokio::test]
    async fn email_lookup_ignores_case() {
        let db = MemoryDatabase::new();
        save_user(&db, "u1", &new_user("alice", "Alice@Example.com"))
            .await
            .unwrap();

        assert!(email_registered(&db, "alice@example.com").await.unwrap());
        assert!(!email_registered(&db, "bob@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn username_search_is_substring_and_case_insensitive() {
        let db = MemoryDatabase::new();
        save_user(&db, "u1", &new_user("AliceWonder", "a@example.com"))
            .await
            .unwrap();
        save_user(&db, "u2", &new_user("bobby", "b@example.com"))
            .await
            .unwrap();

        let found = search_by_username(&db, "wond").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "u1");
    }

    #[tokio::test]
    async fn clearing_a_flag_removes_the_key() {
        let db = MemoryDatabase::new();
        save_user(&db, "u1", &new_user("alice", "a@example.com"))
            .await
            .unwrap();

        set_blocked(&db, "u1", true).await.unwrap();
        assert!(get_user(&db, "u1").await.unwrap().unwrap().is_blocked);

        set_blocked(&db, "u1", false).await.unwrap();
        assert_eq!(db.get("users/u1/isBlocked").await.unwrap(), None);
    }
}
