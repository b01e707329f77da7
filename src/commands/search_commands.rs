use crate::api::Backend;
use crate::error::{AppError, AppResult};
use crate::events::PlayerEvent;
use crate::AppState;

/// Open or close the search overlay. Returns whether it is now open.
pub fn toggle_search<B: Backend>(state: &AppState<B>) -> bool {
    state.search.toggle()
}

/// Feed the overlay's query box. Results arrive on `state.search`.
pub fn search<B: Backend>(state: &AppState<B>, query: &str) -> u64 {
    state.search.submit(query)
}

/// A result was clicked: the results become the queue, the pick plays
/// and the overlay closes.
pub async fn pick_search_result<B: Backend>(state: &AppState<B>, index: usize) -> AppResult<()> {
    let (results, picked) = state
        .search
        .result(index)
        .ok_or_else(|| AppError::NotFound(format!("No search result {}", index + 1)))?;
    log::info!("[pick_search_result] {} - {}", picked.author, picked.title);

    state
        .dispatch(|q| {
            q.set_queue(results);
            q.play_song(picked)
        })
        .await;
    state.events.emit(PlayerEvent::QueueChanged);
    state.search.close();
    Ok(())
}
