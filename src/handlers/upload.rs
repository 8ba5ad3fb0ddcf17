use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{Value, json};

use crate::{
    AppState,
    auth::OptionalAuthUser,
    error::{AppError, Result},
    handlers::enforce_rate_limit,
    services::upload_service::UploadService,
};

/// Accepts a single image in the `file` field. Open to anonymous callers
/// because registration uploads the picture before the account exists.
pub async fn upload_image(
    State(state): State<AppState>,
    OptionalAuthUser(auth_user): OptionalAuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>)> {
    let rate_limit_key = match &auth_user {
        Some(user) => format!("upload:user:{}", user.user_id),
        None => "upload:anonymous".to_string(),
    };
    enforce_rate_limit(&state, &rate_limit_key, 20, 300).await?;

    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = match field.content_type() {
            Some(content_type) => content_type.to_string(),
            None => mime_guess::from_path(&file_name)
                .first_or_octet_stream()
                .to_string(),
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;

        file = Some((file_name, content_type, bytes.to_vec()));
        break;
    }

    let (file_name, content_type, bytes) =
        file.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;

    let url = UploadService::new(state.config.max_file_size)
        .upload_image(state.media.as_ref(), &file_name, &content_type, bytes)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Image uploaded successfully",
            "url": url
        })),
    ))
}
