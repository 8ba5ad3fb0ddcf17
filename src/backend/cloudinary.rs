use futures::future::BoxFuture;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;

use super::{BackendError, BackendResult, MediaHost};

const CLOUDINARY_API_URL: &str = "https://api.cloudinary.com/v1_1";

/// Unsigned uploads through an upload preset.
#[derive(Clone)]
pub struct CloudinaryMedia {
    client: Client,
    upload_url: String,
    upload_preset: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

impl CloudinaryMedia {
    pub fn new(client: Client, cloud_name: &str, upload_preset: &str) -> Self {
        Self {
            client,
            upload_url: format!("{}/{}/image/upload", CLOUDINARY_API_URL, cloud_name),
            upload_preset: upload_preset.to_string(),
        }
    }
}

impl MediaHost for CloudinaryMedia {
    fn upload_image<'a>(
        &'a self,
        file_name: &'a str,
        content_type: &'a str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, BackendResult<String>> {
        Box::pin(async move {
            let file = Part::bytes(bytes)
                .file_name(file_name.to_string())
                .mime_str(content_type)?;
            let form = Form::new()
                .part("file", file)
                .text("upload_preset", self.upload_preset.clone());

            let response = self
                .client
                .post(&self.upload_url)
                .multipart(form)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::error!("Image upload rejected with {}: {}", status, body);
                return Err(BackendError::Upload(format!(
                    "upload failed with status {}",
                    status
                )));
            }

            let uploaded: UploadResponse = response.json().await?;
            Ok(uploaded.secure_url)
        })
    }
}
