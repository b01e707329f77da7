pub mod decoder;
pub mod device;
#[cfg(feature = "audio-output")]
pub mod player;
#[cfg(any(feature = "audio-output", test))]
mod playback;
pub mod queue;
pub mod stream_source;
pub mod surface;
