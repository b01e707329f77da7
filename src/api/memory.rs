//! In-memory catalog and media store with failure injection, for tests.

use crate::api::catalog::CatalogStore;
use crate::api::models::{NewSong, Song, SongFilter};
use crate::api::storage::MediaStore;
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Fixture song; `id` doubles as the ordering key for `created_at`.
pub fn song(id: &str, title: &str) -> Song {
    let offset = id.bytes().map(i64::from).sum::<i64>();
    Song {
        id: id.to_string(),
        title: title.to_string(),
        author: format!("{} artist", title),
        album: String::new(),
        category: "Earworm".to_string(),
        image_url: format!("https://cdn.test/images/{}.png", id),
        audio_url: format!("https://cdn.test/audio/{}.mp3", id),
        duration: 180,
        created_at: epoch() + Duration::seconds(offset),
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    songs: Mutex<Vec<Song>>,
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    failing_bucket: Mutex<Option<String>>,
    fail_insert: AtomicBool,
    fail_catalog: AtomicBool,
    searches: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl MemoryBackend {
    pub fn with_songs(songs: Vec<Song>) -> Self {
        let backend = Self::default();
        *backend.songs.lock().unwrap() = songs;
        backend
    }

    pub fn fail_uploads_to(&self, bucket: &str) {
        *self.failing_bucket.lock().unwrap() = Some(bucket.to_string());
    }

    pub fn fail_inserts(&self) {
        self.fail_insert.store(true, Ordering::SeqCst);
    }

    /// Make every catalog read fail, as if the network were down.
    pub fn fail_catalog(&self) {
        self.fail_catalog.store(true, Ordering::SeqCst);
    }

    pub fn songs(&self) -> Vec<Song> {
        self.songs.lock().unwrap().clone()
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .count()
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }

    fn check_catalog(&self) -> AppResult<()> {
        if self.fail_catalog.load(Ordering::SeqCst) {
            return Err(AppError::Api {
                status: 503,
                message: "catalog unavailable".into(),
            });
        }
        Ok(())
    }
}

impl CatalogStore for MemoryBackend {
    async fn list(&self, filter: SongFilter) -> AppResult<Vec<Song>> {
        self.check_catalog()?;
        let mut songs: Vec<Song> = self
            .songs
            .lock()
            .unwrap()
            .iter()
            .filter(|s| {
                filter
                    .category
                    .map_or(true, |c| s.category == c.as_str())
            })
            .cloned()
            .collect();
        songs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(songs)
    }

    async fn search(&self, title: &str, limit: u32) -> AppResult<Vec<Song>> {
        self.searches.lock().unwrap().push(title.to_string());
        self.check_catalog()?;
        let needle = title.to_lowercase();
        Ok(self
            .songs
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.title.to_lowercase().contains(&needle))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn insert(&self, song: NewSong) -> AppResult<Song> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(AppError::Api {
                status: 500,
                message: "insert rejected".into(),
            });
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = Song {
            id: format!("new-{}", n),
            title: song.title,
            author: song.author,
            album: song.album,
            category: song.category,
            image_url: song.image_url,
            audio_url: song.audio_url,
            duration: song.duration,
            created_at: epoch() + Duration::days(365) + Duration::seconds(n as i64),
        };
        self.songs.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        self.check_catalog()?;
        let mut songs = self.songs.lock().unwrap();
        let before = songs.len();
        songs.retain(|s| s.id != id);
        if songs.len() == before {
            return Err(AppError::NotFound(format!("Song {} not found", id)));
        }
        Ok(())
    }

    async fn ping(&self) -> AppResult<usize> {
        self.check_catalog()?;
        Ok(self.songs.lock().unwrap().len().min(1))
    }
}

impl MediaStore for MemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> AppResult<String> {
        if self.failing_bucket.lock().unwrap().as_deref() == Some(bucket) {
            return Err(AppError::Storage {
                bucket: bucket.to_string(),
                message: "upload rejected".into(),
            });
        }
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(key.to_string())
    }

    async fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("https://cdn.test/{}/{}", bucket, key)
    }

    async fn remove(&self, bucket: &str, key: &str) -> AppResult<()> {
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("{}/{}", bucket, key)))
    }
}
