//! Audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// How often the blocking player checks for completion or cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Plays audio to the default output device
///
/// Only the negotiated stream config is kept; each playback opens its own
/// stream on the calling thread, so the value can move into
/// `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct AudioPlayback {
    config: StreamConfig,
}

impl AudioPlayback {
    /// Negotiate an output config with the default device
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;
        let config = output_config(&device)?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "speaker opened"
        );

        Ok(Self { config })
    }

    /// Decode and play MP3 bytes, blocking until done or `cancel` is set
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_mp3_blocking(&self, mp3_data: &[u8], cancel: &AtomicBool) -> Result<()> {
        let samples = decode_mp3(mp3_data)?;
        self.play_samples_blocking(samples, cancel)
    }

    /// Play mono f32 samples, blocking until done or `cancel` is set
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be built or started
    pub fn play_samples_blocking(&self, samples: Vec<f32>, cancel: &AtomicBool) -> Result<()> {
        if samples.is_empty() || cancel.load(Ordering::Acquire) {
            return Ok(());
        }

        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;

        let channels = usize::from(self.config.channels);
        let sample_count = samples.len();
        let samples = Arc::new(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);

            device
                .build_output_stream(
                    &self.config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut pos = position.load(Ordering::Relaxed);
                        for frame in data.chunks_mut(channels) {
                            let sample = samples.get(pos).copied().unwrap_or_else(|| {
                                finished.store(true, Ordering::Release);
                                0.0
                            });
                            frame.fill(sample);
                            pos = (pos + 1).min(samples.len());
                        }
                        position.store(pos, Ordering::Relaxed);
                    },
                    |err| {
                        tracing::error!(error = %err, "audio playback error");
                    },
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let timeout = Duration::from_millis(duration_ms + 500);
        let start = Instant::now();

        while !finished.load(Ordering::Acquire) {
            if cancel.load(Ordering::Acquire) {
                tracing::debug!(played = position.load(Ordering::Relaxed), "playback cancelled");
                return Ok(());
            }
            if start.elapsed() > timeout {
                tracing::warn!("playback did not drain in time");
                break;
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        // Let the device drain its last buffer
        std::thread::sleep(Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");

        Ok(())
    }
}

/// Prefer a mono output at [`PLAYBACK_SAMPLE_RATE`], falling back to stereo
fn output_config(device: &Device) -> Result<StreamConfig> {
    let rate = SampleRate(PLAYBACK_SAMPLE_RATE);
    let pick = |channels: u16| -> Result<Option<StreamConfig>> {
        Ok(device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == channels
                    && c.min_sample_rate() <= rate
                    && rate <= c.max_sample_rate()
            })
            .map(|c| c.with_sample_rate(rate).config()))
    };

    match pick(1)? {
        Some(config) => Ok(config),
        None => pick(2)?.ok_or_else(|| Error::Audio("no 24kHz output config".to_string())),
    }
}

/// Decode MP3 bytes to mono f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => samples.extend(to_mono(&frame.data, frame.channels)),
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}

/// Average interleaved PCM frames down to one f32 channel
fn to_mono(pcm: &[i16], channels: usize) -> impl Iterator<Item = f32> + '_ {
    pcm.chunks(channels.max(1)).map(|frame| {
        let sum: f32 = frame.iter().map(|&s| f32::from(s) / 32768.0).sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = sum / frame.len() as f32;
        mean
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_empty_input() {
        assert!(decode_mp3(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_to_mono_averages_stereo() {
        let mono: Vec<f32> = to_mono(&[16384, 0, -16384, -16384], 2).collect();
        assert_eq!(mono, [0.25, -0.5]);

        let passthrough: Vec<f32> = to_mono(&[16384, -32768], 1).collect();
        assert_eq!(passthrough, [0.5, -1.0]);
    }
}
