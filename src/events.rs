use crate::api::models::Song;
use crate::error::AppError;
use serde::Serialize;
use tokio::sync::broadcast;

pub const PLAYBACK_PROGRESS: &str = "playback:progress";
pub const PLAYBACK_TRACK_CHANGED: &str = "playback:track-changed";
pub const PLAYBACK_STATE_CHANGED: &str = "playback:state-changed";
pub const PLAYBACK_TRACK_ENDED: &str = "playback:track-ended";
pub const PLAYBACK_QUEUE_CHANGED: &str = "playback:queue-changed";
pub const APP_ERROR: &str = "app:error";

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProgressPayload {
    pub position: f64,
    pub duration: f64,
    pub position_fraction: f64,
}

impl ProgressPayload {
    pub fn new(position: f64, duration: f64) -> Self {
        let fraction = if duration > 0.0 {
            (position / duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            position,
            duration,
            position_fraction: fraction,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrackChangedPayload {
    pub song_id: String,
    pub title: String,
    pub author: String,
    pub album: String,
    pub duration: u32,
    pub image_url: String,
}

impl From<&Song> for TrackChangedPayload {
    fn from(song: &Song) -> Self {
        Self {
            song_id: song.id.clone(),
            title: song.title.clone(),
            author: song.author.clone(),
            album: song.album.clone(),
            duration: song.duration,
            image_url: song.image_or_placeholder().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StateChangedPayload {
    pub state: PlaybackState,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorPayload {
    pub kind: String,
    pub message: String,
}

impl From<&AppError> for ErrorPayload {
    fn from(err: &AppError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "payload")]
pub enum PlayerEvent {
    #[serde(rename = "playback:progress")]
    Progress(ProgressPayload),
    #[serde(rename = "playback:track-changed")]
    TrackChanged(TrackChangedPayload),
    #[serde(rename = "playback:state-changed")]
    StateChanged(StateChangedPayload),
    #[serde(rename = "playback:track-ended")]
    TrackEnded,
    #[serde(rename = "playback:queue-changed")]
    QueueChanged,
    #[serde(rename = "app:error")]
    Error(ErrorPayload),
}

impl PlayerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::Progress(_) => PLAYBACK_PROGRESS,
            PlayerEvent::TrackChanged(_) => PLAYBACK_TRACK_CHANGED,
            PlayerEvent::StateChanged(_) => PLAYBACK_STATE_CHANGED,
            PlayerEvent::TrackEnded => PLAYBACK_TRACK_ENDED,
            PlayerEvent::QueueChanged => PLAYBACK_QUEUE_CHANGED,
            PlayerEvent::Error(_) => APP_ERROR,
        }
    }

    pub fn state(state: PlaybackState) -> Self {
        PlayerEvent::StateChanged(StateChangedPayload { state })
    }
}

/// Fan-out of player events to whichever views are listening.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<PlayerEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, event: PlayerEvent) {
        log::debug!("emit {}", event.name());
        // No subscribers is fine; the player keeps running headless.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
