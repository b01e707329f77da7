use crate::api::catalog::CatalogStore;
use crate::api::models::Song;
use crate::api::upload::{publish_song, Buckets, UploadRequest};
use crate::api::Backend;
use crate::error::AppResult;
use crate::AppState;

pub async fn upload_song<B: Backend>(state: &AppState<B>, request: UploadRequest) -> AppResult<Song> {
    let buckets = Buckets::from(&*state.config.read().await);
    log::info!(
        "[upload_song] {} - {} ({} + {})",
        request.author,
        request.title,
        request.audio.file_name,
        request.image.file_name
    );
    publish_song(state.backend.as_ref(), &buckets, request).await
}

/// Removes the catalog row only; stored media is left in place.
pub async fn delete_song<B: Backend>(state: &AppState<B>, id: &str) -> AppResult<()> {
    log::info!("[delete_song] {}", id);
    state.backend.delete(id).await
}

/// Fetch a single row so the hosted project registers activity.
pub async fn keep_alive<C: CatalogStore>(catalog: &C) -> AppResult<usize> {
    catalog.ping().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::{song, MemoryBackend};
    use crate::api::models::Category;
    use crate::api::upload::MediaFile;
    use crate::tests::state_with;

    #[tokio::test]
    async fn upload_uses_configured_buckets() {
        let state = state_with(Vec::new());
        state.config.write().await.audio_bucket = "tracks".into();

        let request = UploadRequest {
            title: "Unravel".into(),
            author: "TK".into(),
            album: String::new(),
            category: Category::Animes,
            audio: MediaFile {
                file_name: "unravel.mp3".into(),
                bytes: vec![1],
            },
            image: MediaFile {
                file_name: "cover.jpg".into(),
                bytes: vec![2],
            },
            duration: Some(241),
        };
        let created = upload_song(&state, request).await.unwrap();
        assert!(created.audio_url.starts_with("https://cdn.test/tracks/"));
        assert_eq!(state.backend.object_count("tracks"), 1);
    }

    #[tokio::test]
    async fn delete_reports_missing_rows() {
        let state = state_with(vec![song("1", "A")]);
        delete_song(&state, "1").await.unwrap();
        assert!(state.backend.songs().is_empty());
        assert_eq!(delete_song(&state, "1").await.unwrap_err().kind(), "not_found");
    }

    #[tokio::test]
    async fn keep_alive_fails_when_catalog_is_down() {
        let backend = MemoryBackend::with_songs(vec![song("1", "A")]);
        assert_eq!(keep_alive(&backend).await.unwrap(), 1);
        backend.fail_catalog();
        assert!(keep_alive(&backend).await.is_err());
    }
}
