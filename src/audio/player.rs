use crate::api::models::Song;
use crate::audio::decoder::{extension_hint, AudioDecoder};
use crate::audio::device::PlaybackDevice;
use crate::audio::playback::{Playback, NO_SEEK};
use crate::audio::stream_source::{self, RemoteSource};
use crate::error::{AppError, AppResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Roughly two seconds of stereo audio at 44.1 kHz.
const MAX_QUEUED_SAMPLES: usize = 176_400;

/// Streams a song's audio over HTTP and plays it on the default output
/// device.
pub struct AudioPlayer {
    http: reqwest::Client,
    runtime: tokio::runtime::Handle,
    playback: Arc<Playback>,
    decode_thread: Option<JoinHandle<()>>,
    download: Option<tokio::task::JoinHandle<()>>,
    volume: f32,
}

impl AudioPlayer {
    /// Must be called from within a tokio runtime; downloads run on it.
    pub fn new(http: reqwest::Client) -> AppResult<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AppError::Audio(format!("No async runtime for downloads: {}", e)))?;
        Ok(Self {
            http,
            runtime,
            playback: Arc::new(Playback::new(1.0)),
            decode_thread: None,
            download: None,
            volume: 1.0,
        })
    }

    fn shutdown(&mut self) {
        self.playback.request_stop();
        if let Some(download) = self.download.take() {
            download.abort();
        }
        if let Some(handle) = self.decode_thread.take() {
            if handle.join().is_err() {
                log::error!("Decode thread panicked");
            }
        }
    }
}

/// Body of the decode thread: owns the decoder and the output stream.
fn decode_loop(source: RemoteSource, ext: Option<String>, fallback_duration: f64, playback: Arc<Playback>) {
    if let Err(e) = stream_to_output(source, ext.as_deref(), fallback_duration, &playback) {
        log::error!("Playback failed: {}", e);
        playback.failed.store(true, Ordering::SeqCst);
        playback.playing.store(false, Ordering::SeqCst);
    }
}

fn stream_to_output(
    source: RemoteSource,
    ext: Option<&str>,
    fallback_duration: f64,
    playback: &Arc<Playback>,
) -> AppResult<()> {
    let mut decoder = AudioDecoder::new(Box::new(source), ext)?;
    let rate = decoder.sample_rate();
    let channels = decoder.channels();
    let duration = decoder.duration().unwrap_or(fallback_duration);

    playback.sample_rate.store(rate, Ordering::SeqCst);
    playback.channels.store(channels as u32, Ordering::SeqCst);
    playback
        .duration_ms
        .store((duration * 1000.0) as u64, Ordering::SeqCst);

    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| AppError::Audio("No output device available".into()))?;
    let config = cpal::StreamConfig {
        channels: channels as u16,
        sample_rate: cpal::SampleRate(rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let output = Arc::clone(playback);
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if !output.playing.load(Ordering::Relaxed) {
                    data.fill(0.0);
                    return;
                }
                let volume = f32::from_bits(output.volume.load(Ordering::Relaxed));
                let mut samples = output.lock();
                let mut written = 0u64;
                for slot in data.iter_mut() {
                    *slot = match samples.queue.pop_front() {
                        Some(s) => {
                            written += 1;
                            s * volume
                        }
                        None => 0.0,
                    };
                }
                output.samples_played.fetch_add(written, Ordering::Relaxed);
                output.space.notify_all();
            },
            |err| log::error!("Audio output error: {}", err),
            None,
        )
        .map_err(|e| AppError::Audio(format!("Failed to build output stream: {}", e)))?;
    stream
        .play()
        .map_err(|e| AppError::Audio(format!("Failed to start output: {}", e)))?;

    let mut decoding = true;
    while !playback.stop.load(Ordering::Relaxed) {
        let seek = playback.seek_ms.swap(NO_SEEK, Ordering::SeqCst);
        if seek != NO_SEEK {
            let seconds = seek as f64 / 1000.0;
            {
                let mut samples = playback.lock();
                samples.queue.clear();
                samples.exhausted = false;
            }
            if let Err(e) = decoder.seek(seconds) {
                log::warn!("Seek to {:.1}s failed: {}", seconds, e);
            }
            playback.samples_played.store(
                (seconds * playback.samples_per_second()) as u64,
                Ordering::SeqCst,
            );
            decoding = true;
            continue;
        }

        if !decoding {
            // Keep the stream alive until stopped, a seek, or a restart.
            let samples = playback.lock();
            let _ = playback.space.wait_timeout(samples, Duration::from_millis(100));
            continue;
        }

        if !playback.wait_for_space(MAX_QUEUED_SAMPLES) {
            continue;
        }

        match decoder.decode_next()? {
            Some(chunk) => {
                let mut samples = playback.lock();
                samples.queue.extend(chunk.samples);
            }
            None => {
                playback.lock().exhausted = true;
                decoding = false;
            }
        }
    }
    drop(stream);
    Ok(())
}

impl PlaybackDevice for AudioPlayer {
    fn load(&mut self, song: &Song) -> AppResult<()> {
        self.shutdown();

        let playback = Arc::new(Playback::new(self.volume));
        playback
            .duration_ms
            .store(u64::from(song.duration) * 1000, Ordering::SeqCst);
        self.playback = Arc::clone(&playback);

        let (source, download) =
            stream_source::open_url(&self.runtime, self.http.clone(), song.audio_url.clone());
        self.download = Some(download);

        let ext = extension_hint(&song.audio_url);
        let fallback = f64::from(song.duration);
        let handle = std::thread::Builder::new()
            .name("mymusic-decode".into())
            .spawn(move || decode_loop(source, ext, fallback, playback))
            .map_err(|e| AppError::Audio(format!("Failed to start decode thread: {}", e)))?;
        self.decode_thread = Some(handle);
        Ok(())
    }

    fn play(&mut self) {
        if !self.playback.failed.load(Ordering::SeqCst) && self.decode_thread.is_some() {
            self.playback.playing.store(true, Ordering::SeqCst);
        }
    }

    fn pause(&mut self) {
        self.playback.playing.store(false, Ordering::SeqCst);
    }

    fn restart(&mut self) {
        self.seek(0.0);
        self.play();
    }

    fn seek(&mut self, position_seconds: f64) {
        self.playback.request_seek(position_seconds);
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.playback
            .volume
            .store(self.volume.to_bits(), Ordering::Relaxed);
    }

    fn position_seconds(&self) -> f64 {
        let per_second = self.playback.samples_per_second();
        if per_second > 0.0 {
            self.playback.samples_played.load(Ordering::Relaxed) as f64 / per_second
        } else {
            0.0
        }
    }

    fn duration_seconds(&self) -> f64 {
        self.playback.duration_ms.load(Ordering::Relaxed) as f64 / 1000.0
    }

    fn is_playing(&self) -> bool {
        self.playback.playing.load(Ordering::Relaxed) && !self.is_finished()
    }

    fn is_finished(&self) -> bool {
        if self.playback.failed.load(Ordering::SeqCst) {
            return false;
        }
        let samples = self.playback.lock();
        samples.exhausted && samples.queue.is_empty()
    }

    fn stop(&mut self) {
        self.shutdown();
        self.playback = Arc::new(Playback::new(self.volume));
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
