use crate::api::client::{SupabaseClient, RETURN_REPRESENTATION};
use crate::api::models::{NewSong, Song, SongFilter};
use crate::error::{AppError, AppResult};
use std::future::Future;

/// The hosted table of song records.
pub trait CatalogStore: Send + Sync {
    /// Songs matching `filter`, newest first.
    fn list(&self, filter: SongFilter) -> impl Future<Output = AppResult<Vec<Song>>> + Send;

    /// Case-insensitive title substring search, at most `limit` rows.
    fn search(&self, title: &str, limit: u32)
        -> impl Future<Output = AppResult<Vec<Song>>> + Send;

    fn insert(&self, song: NewSong) -> impl Future<Output = AppResult<Song>> + Send;

    /// Fails with `NotFound` when no row has `id`.
    fn delete(&self, id: &str) -> impl Future<Output = AppResult<()>> + Send;

    /// Cheapest possible round-trip, used to keep the hosted project awake.
    fn ping(&self) -> impl Future<Output = AppResult<usize>> + Send;
}

/// `ilike` pattern for a substring match. PostgREST accepts `*` as the
/// URL-safe wildcard. The query is sent as typed, surrounding spaces
/// included; wildcards in it are not escaped.
pub(crate) fn title_pattern(query: &str) -> String {
    format!("ilike.*{}*", query)
}

pub(crate) fn list_query(filter: &SongFilter) -> Vec<(&'static str, String)> {
    let mut query = vec![("select", "*".to_string())];
    if let Some(category) = filter.category {
        query.push(("category", format!("eq.{}", category)));
    }
    // Both sort orders list newest first.
    query.push(("order", "created_at.desc".to_string()));
    query
}

fn as_pairs<'a>(query: &'a [(&'static str, String)]) -> Vec<(&'a str, &'a str)> {
    query.iter().map(|(k, v)| (*k, v.as_str())).collect()
}

impl CatalogStore for SupabaseClient {
    async fn list(&self, filter: SongFilter) -> AppResult<Vec<Song>> {
        let table = self.config().read().await.songs_table.clone();
        let url = self.rest_url(&table).await;
        let query = list_query(&filter);

        let response = self.get_with_query(&url, &as_pairs(&query)).await?;
        let songs: Vec<Song> = response.json().await?;
        log::info!("Listed {} songs ({:?})", songs.len(), filter);
        Ok(songs)
    }

    async fn search(&self, title: &str, limit: u32) -> AppResult<Vec<Song>> {
        let table = self.config().read().await.songs_table.clone();
        let url = self.rest_url(&table).await;
        let pattern = title_pattern(title);
        let limit = limit.to_string();

        let response = self
            .get_with_query(
                &url,
                &[("select", "*"), ("title", &pattern), ("limit", &limit)],
            )
            .await?;
        let songs: Vec<Song> = response.json().await?;
        log::debug!("Search {:?} returned {} songs", title, songs.len());
        Ok(songs)
    }

    async fn insert(&self, song: NewSong) -> AppResult<Song> {
        let table = self.config().read().await.songs_table.clone();
        let url = self.rest_url(&table).await;
        let body = serde_json::to_value(&song)?;

        let response = self
            .post_json(&url, &body, Some(RETURN_REPRESENTATION))
            .await?;
        let mut rows: Vec<Song> = response.json().await?;
        if rows.is_empty() {
            return Err(AppError::Api {
                status: 200,
                message: "Insert returned no row".into(),
            });
        }
        let inserted = rows.swap_remove(0);
        log::info!("Inserted song {} ({})", inserted.id, inserted.title);
        Ok(inserted)
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let table = self.config().read().await.songs_table.clone();
        let url = self.rest_url(&table).await;
        let filter = format!("eq.{}", id);

        let response = self
            .delete_with_query(&url, &[("id", &filter)], Some(RETURN_REPRESENTATION))
            .await?;
        let removed: Vec<serde_json::Value> = response.json().await?;
        if removed.is_empty() {
            return Err(AppError::NotFound(format!("Song {} not found", id)));
        }
        log::info!("Deleted song {}", id);
        Ok(())
    }

    async fn ping(&self) -> AppResult<usize> {
        let table = self.config().read().await.songs_table.clone();
        let url = self.rest_url(&table).await;
        let response = self
            .get_with_query(&url, &[("select", "id"), ("limit", "1")])
            .await?;
        let rows: Vec<serde_json::Value> = response.json().await?;
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Category;

    #[test]
    fn list_query_filters_by_category_and_orders_newest_first() {
        let query = list_query(&SongFilter::category(Category::Earworm));
        assert_eq!(
            query,
            vec![
                ("select", "*".to_string()),
                ("category", "eq.Earworm".to_string()),
                ("order", "created_at.desc".to_string()),
            ]
        );
    }

    #[test]
    fn recent_and_all_share_ordering() {
        assert_eq!(list_query(&SongFilter::recent()), list_query(&SongFilter::all()));
    }

    #[test]
    fn title_pattern_keeps_the_query_as_typed() {
        assert_eq!(title_pattern("blue"), "ilike.*blue*");
        assert_eq!(title_pattern(" blue bird "), "ilike.* blue bird *");
    }
}
