use crate::error::{AppError, AppResult};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

pub struct AudioDecoder {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    duration: Option<f64>,
}

pub struct DecodedSamples {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

/// Container extension for a file name or URL, ignoring any query string.
pub fn extension_hint(location: &str) -> Option<String> {
    let path = location.split(['?', '#']).next().unwrap_or_default();
    let name = path.rsplit('/').next().unwrap_or_default();
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

fn open_format(source: Box<dyn MediaSource>, ext: Option<&str>) -> AppResult<Box<dyn FormatReader>> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = ext {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AppError::Decode(format!("Failed to probe format: {}", e)))?;

    Ok(probed.format)
}

fn audio_track(reader: &dyn FormatReader) -> AppResult<(u32, CodecParameters)> {
    reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .map(|t| (t.id, t.codec_params.clone()))
        .ok_or_else(|| AppError::Decode("No supported audio track found".into()))
}

/// Length in seconds declared by the container, when it declares one.
fn declared_duration(params: &CodecParameters) -> Option<f64> {
    let frames = params.n_frames?;
    if let Some(tb) = params.time_base {
        let t = tb.calc_time(frames);
        return Some(t.seconds as f64 + t.frac);
    }
    params.sample_rate.map(|rate| frames as f64 / rate as f64)
}

/// Duration in seconds of an in-memory audio file.
///
/// Uses the frame count from the container header and falls back to
/// summing packet durations for formats that do not carry one.
pub fn probe_duration(bytes: Vec<u8>, ext: Option<&str>) -> AppResult<f64> {
    let mut reader = open_format(Box::new(Cursor::new(bytes)), ext)?;
    let (track_id, params) = audio_track(reader.as_ref())?;

    if let Some(seconds) = declared_duration(&params) {
        return Ok(seconds);
    }

    let mut ticks: u64 = 0;
    loop {
        match reader.next_packet() {
            Ok(packet) if packet.track_id() == track_id => ticks += packet.dur(),
            Ok(_) => {}
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(e) => return Err(AppError::Decode(format!("Failed to read packet: {}", e))),
        }
    }

    match (params.time_base, params.sample_rate) {
        (Some(tb), _) => {
            let t = tb.calc_time(ticks);
            Ok(t.seconds as f64 + t.frac)
        }
        (None, Some(rate)) => Ok(ticks as f64 / rate as f64),
        (None, None) => Err(AppError::Decode("Stream has no timing information".into())),
    }
}

impl AudioDecoder {
    pub fn new(source: Box<dyn MediaSource>, ext: Option<&str>) -> AppResult<Self> {
        log::debug!("Opening decoder (hint={:?})", ext);
        let format_reader = open_format(source, ext)?;
        let (track_id, params) = audio_track(format_reader.as_ref())?;

        let sample_rate = params.sample_rate.unwrap_or(44100);
        let channels = params.channels.map(|c| c.count()).unwrap_or(2);
        let duration = declared_duration(&params);

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| AppError::Decode(format!("Failed to create decoder: {}", e)))?;

        log::info!(
            "Decoder ready: sample_rate={}, channels={}, duration={:?}",
            sample_rate,
            channels,
            duration
        );

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            duration,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn seek(&mut self, position_seconds: f64) -> AppResult<()> {
        let position = position_seconds.max(0.0);
        let time = Time {
            seconds: position.trunc() as u64,
            frac: position.fract(),
        };

        self.format_reader
            .seek(
                SeekMode::Coarse,
                SeekTo::Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| AppError::Decode(format!("Seek failed: {}", e)))?;

        self.decoder.reset();
        Ok(())
    }

    /// Decode the next batch of interleaved samples. `None` at end of stream.
    pub fn decode_next(&mut self) -> AppResult<Option<DecodedSamples>> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(AppError::Decode(format!("Failed to read packet: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(msg)) => {
                    log::warn!("Skipping undecodable packet: {}", msg);
                    continue;
                }
                Err(e) => return Err(AppError::Decode(format!("Failed to decode: {}", e))),
            };

            let spec = *decoded.spec();
            let mut buffer = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
            buffer.copy_interleaved_ref(decoded);

            return Ok(Some(DecodedSamples {
                samples: buffer.samples().to_vec(),
                sample_rate: spec.rate,
                channels: spec.channels.count(),
            }));
        }
    }
}
