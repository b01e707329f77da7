use crate::api::client::SupabaseClient;
use crate::error::{AppError, AppResult};
use std::future::Future;

/// Object storage for cover images and audio files.
pub trait MediaStore: Send + Sync {
    /// Store `bytes` under `key` in `bucket`, returning the storage key.
    fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> impl Future<Output = AppResult<String>> + Send;

    fn public_url(&self, bucket: &str, key: &str) -> impl Future<Output = String> + Send;

    fn remove(&self, bucket: &str, key: &str) -> impl Future<Output = AppResult<()>> + Send;
}

/// Content type for an uploaded file, from its extension.
pub fn content_type_for(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" | "mp4" | "aac" => "audio/mp4",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn object_path(bucket: &str, key: &str) -> String {
    format!(
        "/object/{}/{}",
        urlencoding::encode(bucket),
        urlencoding::encode(key)
    )
}

fn public_path(bucket: &str, key: &str) -> String {
    format!(
        "/object/public/{}/{}",
        urlencoding::encode(bucket),
        urlencoding::encode(key)
    )
}

fn storage_error(bucket: &str, err: AppError) -> AppError {
    match err {
        AppError::Api { status, message } => AppError::Storage {
            bucket: bucket.to_string(),
            message: format!("{} - {}", status, message),
        },
        other => other,
    }
}

impl MediaStore for SupabaseClient {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> AppResult<String> {
        let url = self.storage_url(&object_path(bucket, key)).await;
        let size = bytes.len();
        self.post_bytes(&url, bytes, content_type)
            .await
            .map_err(|e| storage_error(bucket, e))?;
        log::info!("Uploaded {}/{} ({} bytes)", bucket, key, size);
        Ok(key.to_string())
    }

    async fn public_url(&self, bucket: &str, key: &str) -> String {
        self.storage_url(&public_path(bucket, key)).await
    }

    async fn remove(&self, bucket: &str, key: &str) -> AppResult<()> {
        let url = self.storage_url(&object_path(bucket, key)).await;
        self.delete_with_query(&url, &[], None)
            .await
            .map_err(|e| storage_error(bucket, e))?;
        log::info!("Removed {}/{}", bucket, key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_cover_form_accepted_media() {
        assert_eq!(content_type_for("MP3"), "audio/mpeg");
        assert_eq!(content_type_for("wav"), "audio/wav");
        assert_eq!(content_type_for("jpeg"), "image/jpeg");
        assert_eq!(content_type_for("bin"), "application/octet-stream");
    }

    #[test]
    fn object_paths_escape_keys() {
        assert_eq!(object_path("audio", "a b.mp3"), "/object/audio/a%20b.mp3");
        assert_eq!(public_path("images", "k.png"), "/object/public/images/k.png");
    }

    #[test]
    fn api_failures_become_storage_errors() {
        let err = storage_error(
            "audio",
            AppError::Api {
                status: 413,
                message: "Payload too large".into(),
            },
        );
        assert_eq!(err.kind(), "storage");
        assert_eq!(err.to_string(), "Storage error (audio): 413 - Payload too large");
    }
}
