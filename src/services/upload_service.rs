use mime::Mime;

use crate::{
    backend::MediaHost,
    error::{AppError, Result},
};

const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
];

#[derive(Debug, Clone)]
pub struct UploadService {
    max_file_size: usize,
}

impl UploadService {
    pub fn new(max_file_size: usize) -> Self {
        Self { max_file_size }
    }

    pub fn validate(&self, content_type: &str, size: usize) -> Result<()> {
        if size == 0 {
            return Err(AppError::BadRequest("No file data provided".to_string()));
        }

        if size > self.max_file_size {
            return Err(AppError::ContentTooLarge);
        }

        let mime: Mime = content_type
            .parse()
            .map_err(|_| AppError::UnsupportedMediaType)?;
        if mime.type_() != mime::IMAGE || !ALLOWED_IMAGE_TYPES.contains(&mime.essence_str()) {
            tracing::debug!("Rejected upload with MIME type {}", content_type);
            return Err(AppError::UnsupportedMediaType);
        }

        Ok(())
    }

    /// Hands the image to the CDN and returns its hosted URL.
    pub async fn upload_image(
        &self,
        media: &dyn MediaHost,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String> {
        self.validate(content_type, bytes.len())?;

        let url = media.upload_image(file_name, content_type, bytes).await?;
        tracing::info!("Uploaded image {} to {}", file_name, url);
        Ok(url)
    }
}
