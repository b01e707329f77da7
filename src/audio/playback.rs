#![cfg_attr(not(feature = "audio-output"), allow(dead_code))]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub(crate) const NO_SEEK: u64 = u64::MAX;

/// Upper bound on one wait for buffer space.
const SPACE_WAIT: Duration = Duration::from_millis(100);

pub(crate) struct Samples {
    pub queue: VecDeque<f32>,
    pub exhausted: bool,
}

/// State shared between the device handle, the decode thread and the
/// output callback.
pub(crate) struct Playback {
    samples: Mutex<Samples>,
    pub space: Condvar,
    pub playing: AtomicBool,
    pub failed: AtomicBool,
    pub stop: AtomicBool,
    /// Volume as f32 bits.
    pub volume: AtomicU32,
    pub samples_played: AtomicU64,
    pub sample_rate: AtomicU32,
    pub channels: AtomicU32,
    /// Duration in milliseconds.
    pub duration_ms: AtomicU64,
    pub seek_ms: AtomicU64,
}

impl Playback {
    pub fn new(volume: f32) -> Self {
        Self {
            samples: Mutex::new(Samples {
                queue: VecDeque::with_capacity(88_200),
                exhausted: false,
            }),
            space: Condvar::new(),
            playing: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            volume: AtomicU32::new(volume.to_bits()),
            samples_played: AtomicU64::new(0),
            sample_rate: AtomicU32::new(44_100),
            channels: AtomicU32::new(2),
            duration_ms: AtomicU64::new(0),
            seek_ms: AtomicU64::new(NO_SEEK),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Samples> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn samples_per_second(&self) -> f64 {
        f64::from(self.sample_rate.load(Ordering::Relaxed))
            * f64::from(self.channels.load(Ordering::Relaxed))
    }

    /// A stop or a seek is pending and the decode thread should stop
    /// filling the buffer.
    pub fn interrupted(&self) -> bool {
        self.stop.load(Ordering::SeqCst) || self.seek_ms.load(Ordering::SeqCst) != NO_SEEK
    }

    /// Flags set and notified under the sample lock, so a decode thread
    /// between its check and its wait still sees them.
    pub fn request_stop(&self) {
        let _samples = self.lock();
        self.stop.store(true, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
        self.space.notify_all();
    }

    pub fn request_seek(&self, position_seconds: f64) {
        let position = position_seconds.max(0.0);
        let mut samples = self.lock();
        self.seek_ms
            .store((position * 1000.0) as u64, Ordering::SeqCst);
        self.samples_played
            .store((position * self.samples_per_second()) as u64, Ordering::SeqCst);
        samples.exhausted = false;
        self.space.notify_all();
    }

    /// Block until the buffer holds fewer than `capacity` samples.
    /// Returns false when interrupted instead.
    pub fn wait_for_space(&self, capacity: usize) -> bool {
        let mut samples = self.lock();
        while samples.queue.len() >= capacity && !self.interrupted() {
            samples = match self.space.wait_timeout(samples, SPACE_WAIT) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        !self.interrupted()
    }
}
