use crate::api::models::{Song, SongFilter, SortOrder};
use crate::api::Backend;
use crate::error::AppResult;
use crate::AppState;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ListingHeader {
    pub title: String,
    pub description: String,
}

pub async fn list_songs<B: Backend>(state: &AppState<B>, filter: SongFilter) -> AppResult<Vec<Song>> {
    let songs = state.backend.list(filter).await?;
    log::debug!("[list_songs] {:?} -> {} songs", filter, songs.len());
    Ok(songs)
}

pub fn listing_header(filter: &SongFilter) -> ListingHeader {
    match (filter.category, filter.sort) {
        (Some(category), _) => ListingHeader {
            title: category.to_string(),
            description: format!("Your {} collection", category),
        },
        (None, SortOrder::Recent) => ListingHeader {
            title: "Recently Added".into(),
            description: "All your music in one place".into(),
        },
        (None, SortOrder::Newest) => ListingHeader {
            title: "All Songs".into(),
            description: "All your music in one place".into(),
        },
    }
}
