use crate::api::Backend;
use crate::audio::queue::{QueueState, Transition};
use crate::error::{AppError, AppResult};
use crate::AppState;

pub async fn get_queue<B: Backend>(state: &AppState<B>) -> AppResult<QueueState> {
    Ok(state.playback_queue.read().await.state())
}

/// Jump to an entry of the current queue.
pub async fn play_queue_track<B: Backend>(state: &AppState<B>, index: usize) -> AppResult<()> {
    let mut missing = false;
    state
        .dispatch(|q| match q.songs().get(index).cloned() {
            Some(song) => q.play_song(song),
            None => {
                missing = true;
                Transition::Idle
            }
        })
        .await;

    if missing {
        return Err(AppError::NotFound("Queue index out of bounds".into()));
    }
    Ok(())
}

/// Returns whether shuffle is now on.
pub async fn toggle_shuffle<B: Backend>(state: &AppState<B>) -> AppResult<bool> {
    state.dispatch(|q| q.toggle_shuffle()).await;
    Ok(state.playback_queue.read().await.is_shuffle())
}

/// Returns whether looping is now on.
pub async fn toggle_loop<B: Backend>(state: &AppState<B>) -> AppResult<bool> {
    state.dispatch(|q| q.toggle_loop()).await;
    Ok(state.playback_queue.read().await.is_looping())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::song;
    use crate::commands::playback_commands::play_songs;
    use crate::tests::state_with;

    #[tokio::test]
    async fn jumps_within_the_queue() {
        let state = state_with(Vec::new());
        play_songs(&state, vec![song("1", "A"), song("2", "B")], 0)
            .await
            .unwrap();

        play_queue_track(&state, 1).await.unwrap();
        let snapshot = get_queue(&state).await.unwrap();
        assert_eq!(snapshot.current_index, Some(1));
        assert_eq!(snapshot.current_song.map(|s| s.id), Some("2".into()));

        let err = play_queue_track(&state, 2).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert_eq!(get_queue(&state).await.unwrap().current_index, Some(1));
    }

    #[tokio::test]
    async fn mode_toggles_report_new_value() {
        let state = state_with(Vec::new());
        assert!(toggle_shuffle(&state).await.unwrap());
        assert!(!toggle_shuffle(&state).await.unwrap());
        assert!(toggle_loop(&state).await.unwrap());
        assert!(get_queue(&state).await.unwrap().is_looping);
    }
}
