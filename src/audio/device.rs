use crate::api::models::Song;
use crate::error::AppResult;
use tokio::time::Instant;

/// Something that can play one song at a time.
///
/// Positions and durations are in seconds. A device that failed to load
/// a song never reports it as finished.
pub trait PlaybackDevice: Send {
    /// Replace whatever is loaded with `song`, paused at the start.
    fn load(&mut self, song: &Song) -> AppResult<()>;
    fn play(&mut self);
    fn pause(&mut self);
    /// Jump back to the start of the loaded song and play.
    fn restart(&mut self);
    fn seek(&mut self, position_seconds: f64);
    fn set_volume(&mut self, volume: f32);
    fn position_seconds(&self) -> f64;
    fn duration_seconds(&self) -> f64;
    fn is_playing(&self) -> bool;
    fn is_finished(&self) -> bool;
    fn stop(&mut self);
}

/// Silent device that advances through a song's declared length on the
/// tokio clock. Used when no audio output is compiled in.
#[derive(Debug)]
pub struct ClockDevice {
    duration: f64,
    loaded: bool,
    /// Position accumulated before the current run.
    offset: f64,
    running_since: Option<Instant>,
    volume: f32,
}

impl ClockDevice {
    pub fn new() -> Self {
        Self {
            duration: 0.0,
            loaded: false,
            offset: 0.0,
            running_since: None,
            volume: 1.0,
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    fn elapsed(&self) -> f64 {
        self.running_since
            .map_or(0.0, |since| since.elapsed().as_secs_f64())
    }
}

impl PlaybackDevice for ClockDevice {
    fn load(&mut self, song: &Song) -> AppResult<()> {
        log::debug!("clock device: load {} ({}s)", song.id, song.duration);
        self.duration = f64::from(song.duration);
        self.loaded = true;
        self.offset = 0.0;
        self.running_since = None;
        Ok(())
    }

    fn play(&mut self) {
        if self.loaded && self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        self.offset = self.position_seconds();
        self.running_since = None;
    }

    fn restart(&mut self) {
        self.offset = 0.0;
        self.running_since = None;
        self.play();
    }

    fn seek(&mut self, position_seconds: f64) {
        self.offset = position_seconds.clamp(0.0, self.duration);
        if self.running_since.is_some() {
            self.running_since = Some(Instant::now());
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn position_seconds(&self) -> f64 {
        (self.offset + self.elapsed()).min(self.duration)
    }

    fn duration_seconds(&self) -> f64 {
        self.duration
    }

    fn is_playing(&self) -> bool {
        self.running_since.is_some() && !self.is_finished()
    }

    // Songs without a known length never end on their own.
    fn is_finished(&self) -> bool {
        self.loaded && self.duration > 0.0 && self.position_seconds() >= self.duration
    }

    fn stop(&mut self) {
        self.loaded = false;
        self.duration = 0.0;
        self.offset = 0.0;
        self.running_since = None;
    }
}

impl Default for ClockDevice {
    fn default() -> Self {
        Self::new()
    }
}
