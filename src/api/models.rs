use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

pub const PLACEHOLDER_IMAGE: &str = "/placeholder.svg";

/// A catalog row. Column names match the hosted `songs` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub title: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub author: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub album: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub category: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub image_url: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub audio_url: String,
    /// Length in whole seconds.
    #[serde(default, deserialize_with = "seconds_or_null")]
    pub duration: u32,
    pub created_at: DateTime<Utc>,
}

impl Song {
    pub fn image_or_placeholder(&self) -> &str {
        if self.image_url.trim().is_empty() {
            PLACEHOLDER_IMAGE
        } else {
            &self.image_url
        }
    }
}

/// Insert payload: a song before the catalog assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSong {
    pub title: String,
    pub author: String,
    pub album: String,
    pub category: String,
    pub image_url: String,
    pub audio_url: String,
    pub duration: u32,
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn seconds_or_null<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    // Some rows store fractional durations; round to whole seconds.
    let raw = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    Ok(raw.max(0.0).round() as u32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Animes,
    Earworm,
    Favourites,
    Audio,
    Podcasts,
    Recent,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Animes,
        Category::Earworm,
        Category::Favourites,
        Category::Audio,
        Category::Podcasts,
        Category::Recent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Animes => "Animes",
            Category::Earworm => "Earworm",
            Category::Favourites => "Favourites",
            Category::Audio => "Audio",
            Category::Podcasts => "Podcasts",
            Category::Recent => "Recent",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown category: {}", wanted)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Newest,
    /// The "Recently Added" view. Same ordering as `Newest`.
    Recent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SongFilter {
    pub category: Option<Category>,
    pub sort: SortOrder,
}

impl SongFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn category(category: Category) -> Self {
        Self {
            category: Some(category),
            sort: SortOrder::Newest,
        }
    }

    pub fn recent() -> Self {
        Self {
            category: None,
            sort: SortOrder::Recent,
        }
    }
}

/// `m:ss` rendering used for track lengths and the seek bar.
pub fn format_duration(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

pub fn format_date(at: &DateTime<Utc>) -> String {
    at.format("%b %-d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn song_decodes_backend_row_with_nulls() {
        let row = r#"{
            "id": "7c1d",
            "title": "Blue Bird",
            "author": "Ikimono-gakari",
            "album": null,
            "category": "Animes",
            "image_url": null,
            "audio_url": "https://x.supabase.co/storage/v1/object/public/audio/a.mp3",
            "duration": 217.6,
            "created_at": "2024-03-05T10:20:30.123456+00:00"
        }"#;
        let song: Song = serde_json::from_str(row).unwrap();
        assert_eq!(song.album, "");
        assert_eq!(song.duration, 218);
        assert_eq!(song.image_or_placeholder(), PLACEHOLDER_IMAGE);
        assert_eq!(format_date(&song.created_at), "Mar 5, 2024");
    }

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("podcasts".parse::<Category>().unwrap(), Category::Podcasts);
        assert_eq!(" Earworm ".parse::<Category>().unwrap(), Category::Earworm);
        assert!("jazz".parse::<Category>().is_err());
        assert_eq!(Category::Favourites.to_string(), "Favourites");
    }

    #[test]
    fn durations_render_as_minutes_and_padded_seconds() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(65), "1:05");
        assert_eq!(format_duration(3600), "60:00");
    }
}
