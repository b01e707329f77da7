use crate::api::models::Song;
use crate::api::Backend;
use crate::audio::queue::Transition;
use crate::error::{AppError, AppResult};
use crate::events::PlayerEvent;
use crate::AppState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPrefs {
    pub volume: f32,
    pub muted: bool,
}

/// A row was clicked: the listing becomes the queue and the row plays.
pub async fn play_songs<B: Backend>(
    state: &AppState<B>,
    songs: Vec<Song>,
    index: usize,
) -> AppResult<()> {
    let song = songs
        .get(index)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("No song at position {}", index + 1)))?;
    log::info!("[play_songs] {} songs, playing {} - {}", songs.len(), song.author, song.title);

    state
        .dispatch(|q| {
            q.set_queue(songs);
            q.play_song(song)
        })
        .await;
    state.events.emit(PlayerEvent::QueueChanged);
    Ok(())
}

/// Play a listing from the top, in order.
pub async fn play_all<B: Backend>(state: &AppState<B>, songs: Vec<Song>) -> AppResult<()> {
    let Some(first) = songs.first().cloned() else {
        return Ok(());
    };
    log::info!("[play_all] {} songs", songs.len());

    state
        .dispatch(|q| {
            q.set_queue(songs);
            q.set_shuffle(false);
            q.play_song(first)
        })
        .await;
    state.events.emit(PlayerEvent::QueueChanged);
    Ok(())
}

/// Turn shuffle on and start from a random song of the listing.
pub async fn shuffle_play<B: Backend>(state: &AppState<B>, songs: Vec<Song>) -> AppResult<()> {
    if songs.is_empty() {
        return Ok(());
    }
    log::info!("[shuffle_play] {} songs", songs.len());

    state
        .dispatch(|q| {
            q.set_shuffle(true);
            q.set_queue(songs);
            match q.random_song() {
                Some(song) => q.play_song(song),
                None => Transition::Idle,
            }
        })
        .await;
    state.events.emit(PlayerEvent::QueueChanged);
    Ok(())
}

/// The big play button on a listing: pause/resume if this listing is
/// what's playing, otherwise start it from the top.
pub async fn main_play<B: Backend>(state: &AppState<B>, songs: Vec<Song>) -> AppResult<()> {
    let transition = state
        .dispatch(|q| {
            if q.is_current_in(&songs) {
                q.set_shuffle(false);
                q.toggle_play()
            } else {
                Transition::Idle
            }
        })
        .await;

    if transition.is_idle() {
        play_all(state, songs).await?;
    }
    Ok(())
}

pub async fn toggle_play<B: Backend>(state: &AppState<B>) -> AppResult<bool> {
    state.dispatch(|q| q.toggle_play()).await;
    Ok(state.playback_queue.read().await.is_playing())
}

pub async fn next_track<B: Backend>(state: &AppState<B>) -> AppResult<Option<Song>> {
    Ok(loaded_song(state.dispatch(|q| q.play_next()).await))
}

pub async fn previous_track<B: Backend>(state: &AppState<B>) -> AppResult<Option<Song>> {
    Ok(loaded_song(state.dispatch(|q| q.play_previous()).await))
}

fn loaded_song(transition: Transition) -> Option<Song> {
    match transition {
        Transition::Load(song) => Some(song),
        _ => None,
    }
}

/// Returns the position actually sought to.
pub async fn seek<B: Backend>(state: &AppState<B>, position: f64) -> AppResult<f64> {
    if !position.is_finite() {
        return Err(AppError::InvalidInput(format!("Invalid seek position: {}", position)));
    }
    Ok(state.player.lock().await.seek(position))
}

pub async fn set_volume<B: Backend>(state: &AppState<B>, volume: f32) -> AppResult<f32> {
    if !volume.is_finite() {
        return Err(AppError::InvalidInput(format!("Invalid volume: {}", volume)));
    }
    Ok(state.player.lock().await.set_volume(volume))
}

pub async fn toggle_mute<B: Backend>(state: &AppState<B>) -> AppResult<bool> {
    Ok(state.player.lock().await.toggle_mute())
}

pub async fn get_player_prefs<B: Backend>(state: &AppState<B>) -> AppResult<PlayerPrefs> {
    let player = state.player.lock().await;
    Ok(PlayerPrefs {
        volume: player.volume(),
        muted: player.is_muted(),
    })
}

/// Persist the current volume and mute setting to the config file.
pub async fn save_player_prefs<B: Backend>(state: &AppState<B>) -> AppResult<()> {
    let prefs = get_player_prefs(state).await?;
    let mut config = state.config.write().await;
    config.volume = prefs.volume;
    config.muted = prefs.muted;
    config.save_to(&state.config_path)?;
    log::debug!("[save_player_prefs] {:?}", prefs);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::song;
    use crate::config::AppConfig;
    use crate::tests::state_with;

    fn abc() -> Vec<Song> {
        vec![song("1", "A"), song("2", "B"), song("3", "C")]
    }

    async fn current_id<B: Backend>(state: &AppState<B>) -> Option<String> {
        state
            .playback_queue
            .read()
            .await
            .current_song()
            .map(|s| s.id.clone())
    }

    #[tokio::test]
    async fn row_click_queues_listing_and_plays_row() {
        let state = state_with(Vec::new());
        play_songs(&state, abc(), 1).await.unwrap();

        let queue = state.playback_queue.read().await;
        assert_eq!(queue.songs().len(), 3);
        assert_eq!(queue.current_index(), Some(1));
        assert!(queue.is_playing());
        drop(queue);
        assert!(play_songs(&state, abc(), 7).await.is_err());
    }

    #[tokio::test]
    async fn play_all_starts_at_the_top_without_shuffle() {
        let state = state_with(Vec::new());
        state.dispatch(|q| q.set_shuffle(true)).await;
        play_all(&state, abc()).await.unwrap();

        let queue = state.playback_queue.read().await;
        assert_eq!(queue.current_index(), Some(0));
        assert!(!queue.is_shuffle());
    }

    #[tokio::test]
    async fn empty_listings_are_ignored() {
        let state = state_with(Vec::new());
        play_all(&state, Vec::new()).await.unwrap();
        shuffle_play(&state, Vec::new()).await.unwrap();
        let queue = state.playback_queue.read().await;
        assert!(queue.current_song().is_none());
        assert!(!queue.is_shuffle());
    }

    #[tokio::test]
    async fn shuffle_play_turns_shuffle_on_and_plays_a_listed_song() {
        let state = state_with(Vec::new());
        shuffle_play(&state, abc()).await.unwrap();

        let queue = state.playback_queue.read().await;
        assert!(queue.is_shuffle());
        assert!(queue.is_playing());
        assert!(queue.current_index().is_some());
    }

    #[tokio::test]
    async fn main_play_toggles_the_listing_that_is_playing() {
        let state = state_with(Vec::new());
        play_songs(&state, abc(), 2).await.unwrap();
        state.dispatch(|q| q.set_shuffle(true)).await;

        main_play(&state, abc()).await.unwrap();
        {
            let queue = state.playback_queue.read().await;
            assert!(!queue.is_playing());
            assert!(!queue.is_shuffle());
            assert_eq!(queue.current_index(), Some(2));
        }

        main_play(&state, vec![song("4", "D"), song("5", "E")]).await.unwrap();
        assert_eq!(current_id(&state).await.as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn next_and_previous_report_the_loaded_song() {
        let state = state_with(Vec::new());
        assert_eq!(next_track(&state).await.unwrap(), None);

        play_songs(&state, abc(), 0).await.unwrap();
        assert_eq!(next_track(&state).await.unwrap().map(|s| s.id), Some("2".into()));
        assert_eq!(
            previous_track(&state).await.unwrap().map(|s| s.id),
            Some("1".into())
        );
        assert_eq!(
            previous_track(&state).await.unwrap().map(|s| s.id),
            Some("3".into())
        );
    }

    #[tokio::test]
    async fn toggle_play_reports_new_state() {
        let state = state_with(Vec::new());
        play_songs(&state, abc(), 0).await.unwrap();
        assert!(!toggle_play(&state).await.unwrap());
        assert!(toggle_play(&state).await.unwrap());
    }

    #[tokio::test]
    async fn seek_and_volume_reject_nan() {
        let state = state_with(Vec::new());
        assert!(seek(&state, f64::NAN).await.is_err());
        assert!(set_volume(&state, f32::NAN).await.is_err());
        assert_eq!(set_volume(&state, 0.25).await.unwrap(), 0.25);
    }

    #[tokio::test]
    async fn prefs_round_trip_through_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state_with(Vec::new());
        state.config_path = dir.path().join("config.json");

        set_volume(&state, 0.4).await.unwrap();
        toggle_mute(&state).await.unwrap();
        save_player_prefs(&state).await.unwrap();

        let saved = AppConfig::load_from(&state.config_path).unwrap();
        assert_eq!(saved.volume, 0.4);
        assert!(saved.muted);
        assert_eq!(
            get_player_prefs(&state).await.unwrap(),
            PlayerPrefs {
                volume: 0.4,
                muted: true
            }
        );
    }
}
