use crate::api::models::{Category, NewSong, Song};
use crate::api::storage::content_type_for;
use crate::api::Backend;
use crate::audio::decoder::probe_duration;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use std::path::Path;

/// A file picked for upload.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    pub async fn read(path: &Path) -> AppResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { file_name, bytes })
    }

    /// Text after the last `.`, lower-cased; the whole name when there is no dot.
    pub fn extension(&self) -> String {
        self.file_name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub title: String,
    pub author: String,
    pub album: String,
    pub category: Category,
    pub audio: MediaFile,
    pub image: MediaFile,
    /// Length in seconds; probed from the audio file when absent.
    pub duration: Option<u32>,
}

impl UploadRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.audio.bytes.is_empty() || self.image.bytes.is_empty() {
            return Err(AppError::InvalidInput(
                "Please select both audio and image files".into(),
            ));
        }
        if self.title.trim().is_empty() {
            return Err(AppError::InvalidInput("Title is required".into()));
        }
        if self.author.trim().is_empty() {
            return Err(AppError::InvalidInput("Author is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Buckets {
    pub image: String,
    pub audio: String,
}

impl From<&AppConfig> for Buckets {
    fn from(config: &AppConfig) -> Self {
        Self {
            image: config.image_bucket.clone(),
            audio: config.audio_bucket.clone(),
        }
    }
}

pub fn storage_key(file: &MediaFile) -> String {
    format!("{}.{}", uuid::Uuid::new_v4(), file.extension())
}

async fn resolve_duration(audio: &MediaFile, explicit: Option<u32>) -> u32 {
    if let Some(seconds) = explicit {
        return seconds;
    }
    let bytes = audio.bytes.clone();
    let ext = audio.extension();
    match tokio::task::spawn_blocking(move || probe_duration(bytes, Some(ext.as_str()))).await {
        Ok(Ok(seconds)) => seconds.round() as u32,
        Ok(Err(e)) => {
            log::warn!("Could not read duration of {}: {}", audio.file_name, e);
            0
        }
        Err(e) => {
            log::warn!("Duration probe task failed: {}", e);
            0
        }
    }
}

/// Best-effort removal of a blob whose catalog row will never exist.
async fn discard<B: Backend>(backend: &B, bucket: &str, key: &str) {
    if let Err(e) = backend.remove(bucket, key).await {
        log::warn!("Failed to clean up orphaned {}/{}: {}", bucket, key, e);
    } else {
        log::info!("Cleaned up orphaned {}/{}", bucket, key);
    }
}

/// Upload cover and audio, then record the song in the catalog.
///
/// Both blobs must be stored before the catalog row is written. A failure
/// part way through removes whatever was already stored and returns the
/// original error.
pub async fn publish_song<B: Backend>(
    backend: &B,
    buckets: &Buckets,
    request: UploadRequest,
) -> AppResult<Song> {
    request.validate()?;
    let duration = resolve_duration(&request.audio, request.duration).await;

    let image_key = storage_key(&request.image);
    let image_type = content_type_for(&request.image.extension());
    backend
        .upload(&buckets.image, &image_key, request.image.bytes, image_type)
        .await?;

    let audio_key = storage_key(&request.audio);
    let audio_type = content_type_for(&request.audio.extension());
    if let Err(e) = backend
        .upload(&buckets.audio, &audio_key, request.audio.bytes, audio_type)
        .await
    {
        log::error!("Audio upload failed: {}", e);
        discard(backend, &buckets.image, &image_key).await;
        return Err(e);
    }

    let image_url = backend.public_url(&buckets.image, &image_key).await;
    let audio_url = backend.public_url(&buckets.audio, &audio_key).await;

    let new_song = NewSong {
        title: request.title.trim().to_string(),
        author: request.author.trim().to_string(),
        album: request.album.trim().to_string(),
        category: request.category.to_string(),
        image_url,
        audio_url,
        duration,
    };

    match backend.insert(new_song).await {
        Ok(song) => Ok(song),
        Err(e) => {
            log::error!("Catalog insert failed: {}", e);
            discard(backend, &buckets.image, &image_key).await;
            discard(backend, &buckets.audio, &audio_key).await;
            Err(e)
        }
    }
}
