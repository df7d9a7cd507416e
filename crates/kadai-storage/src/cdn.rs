use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::{ObjectKey, ObjectStore, StorageError};

const FALLBACK_MESSAGE: &str = "Image upload failed.";

/// Unsigned multipart upload to an image CDN.
///
/// Posts `file`, `upload_preset` and `folder`; the response carries
/// `secure_url` on success or `error.message` on failure.
#[derive(Debug, Clone)]
pub struct CdnObjectStore {
    http: reqwest::Client,
    upload_url: String,
    upload_preset: String,
    folder_root: String,
}

impl CdnObjectStore {
    pub fn new(upload_url: &str, upload_preset: &str, folder_root: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            upload_url: upload_url.to_string(),
            upload_preset: upload_preset.to_string(),
            folder_root: folder_root.trim_matches('/').to_string(),
        }
    }

    fn folder_for(&self, key: &ObjectKey) -> String {
        if self.folder_root.is_empty() {
            key.directory().to_string()
        } else {
            format!("{}/{}", self.folder_root, key.directory())
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    error: Option<UploadErrorBody>,
}

#[derive(Debug, Deserialize)]
struct UploadErrorBody {
    message: Option<String>,
}

impl UploadResponse {
    fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| {
            e.message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
        })
    }
}

#[async_trait]
impl ObjectStore for CdnObjectStore {
    async fn put(
        &self,
        key: &ObjectKey,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let part = Part::bytes(bytes)
            .file_name(key.file_name().to_string())
            .mime_str(content_type)?;
        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone())
            .text("folder", self.folder_for(key));

        let resp = self.http.post(&self.upload_url).multipart(form).send().await?;
        let status = resp.status();
        // A non-JSON body still has to surface as a refusal, not a decode error.
        let body: Option<UploadResponse> = resp.json().await.ok();

        if !status.is_success() {
            let msg = body
                .and_then(|b| b.error_message())
                .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
            tracing::warn!(key = %key, status = status.as_u16(), error = %msg, "cdn upload refused");
            return Err(StorageError::Rejected(msg));
        }

        match body {
            Some(b) => {
                if let Some(msg) = b.error_message() {
                    return Err(StorageError::Rejected(msg));
                }
                b.secure_url
                    .ok_or_else(|| StorageError::Rejected(FALLBACK_MESSAGE.to_string()))
            }
            None => Err(StorageError::Rejected(FALLBACK_MESSAGE.to_string())),
        }
    }

    fn backend_name(&self) -> &'static str {
        "cdn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_is_key_directory_under_optional_root() {
        let key = ObjectKey::product(1, "a.png");
        let plain = CdnObjectStore::new("http://x", "preset", "");
        assert_eq!(plain.folder_for(&key), "products");
        let rooted = CdnObjectStore::new("http://x", "preset", "/kadai/");
        assert_eq!(rooted.folder_for(&key), "kadai/products");
    }

    #[test]
    fn blank_error_message_falls_back() {
        let r: UploadResponse =
            serde_json::from_str(r#"{"error":{"message":"  "}}"#).unwrap();
        assert_eq!(r.error_message().as_deref(), Some(FALLBACK_MESSAGE));
    }
}
