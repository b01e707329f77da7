use crate::api::models::Song;
use crate::audio::device::PlaybackDevice;
use crate::audio::queue::Transition;
use crate::events::{
    ErrorPayload, EventHub, PlaybackState, PlayerEvent, ProgressPayload, TrackChangedPayload,
};

/// The player bar: owns the output device, carries volume and mute, and
/// turns queue transitions into device calls and events.
pub struct PlayerSurface {
    device: Box<dyn PlaybackDevice>,
    events: EventHub,
    volume: f32,
    muted: bool,
    loaded: Option<Song>,
    ended_reported: bool,
}

impl PlayerSurface {
    pub fn new(mut device: Box<dyn PlaybackDevice>, events: EventHub, volume: f32, muted: bool) -> Self {
        let volume = volume.clamp(0.0, 1.0);
        device.set_volume(if muted { 0.0 } else { volume });
        Self {
            device,
            events,
            volume,
            muted,
            loaded: None,
            ended_reported: false,
        }
    }

    pub fn apply(&mut self, transition: &Transition) {
        match transition {
            Transition::Load(song) => self.load(song),
            Transition::Resume => {
                if self.loaded.is_some() {
                    self.device.play();
                    self.events.emit(PlayerEvent::state(PlaybackState::Playing));
                }
            }
            Transition::Pause => {
                self.device.pause();
                self.events.emit(PlayerEvent::state(PlaybackState::Paused));
            }
            Transition::Restart => {
                self.ended_reported = false;
                self.device.restart();
                self.events.emit(PlayerEvent::state(PlaybackState::Playing));
            }
            Transition::Idle => {}
        }
    }

    fn load(&mut self, song: &Song) {
        self.loaded = Some(song.clone());
        self.ended_reported = false;
        self.events
            .emit(PlayerEvent::TrackChanged(TrackChangedPayload::from(song)));

        match self.device.load(song) {
            Ok(()) => {
                self.device.play();
                self.events.emit(PlayerEvent::state(PlaybackState::Playing));
            }
            Err(e) => {
                // Playback just doesn't start; the queue stays where it is.
                log::warn!("Could not load {} ({}): {}", song.title, song.audio_url, e);
                self.events.emit(PlayerEvent::Error(ErrorPayload::from(&e)));
            }
        }
    }

    pub fn set_volume(&mut self, volume: f32) -> f32 {
        self.volume = volume.clamp(0.0, 1.0);
        self.push_volume();
        self.volume
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.push_volume();
        self.muted
    }

    fn push_volume(&mut self) {
        self.device.set_volume(self.effective_volume());
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    fn duration(&self) -> f64 {
        let reported = self.device.duration_seconds();
        if reported > 0.0 {
            reported
        } else {
            self.loaded.as_ref().map_or(0.0, |s| f64::from(s.duration))
        }
    }

    /// Move within the loaded song, clamped to its length. Returns the
    /// position actually sought to.
    pub fn seek(&mut self, position_seconds: f64) -> f64 {
        if self.loaded.is_none() {
            return 0.0;
        }
        let target = position_seconds.clamp(0.0, self.duration());
        self.device.seek(target);
        self.ended_reported = false;
        self.events.emit(PlayerEvent::Progress(self.progress()));
        target
    }

    pub fn progress(&self) -> ProgressPayload {
        ProgressPayload::new(self.device.position_seconds(), self.duration())
    }

    /// True exactly once each time the loaded song runs out.
    pub fn poll_ended(&mut self) -> bool {
        if self.ended_reported || self.loaded.is_none() || !self.device.is_finished() {
            return false;
        }
        self.ended_reported = true;
        true
    }

    pub fn is_playing(&self) -> bool {
        self.device.is_playing()
    }

    pub fn loaded(&self) -> Option<&Song> {
        self.loaded.as_ref()
    }

    pub fn stop(&mut self) {
        self.device.stop();
        self.loaded = None;
        self.events.emit(PlayerEvent::state(PlaybackState::Stopped));
    }
}
