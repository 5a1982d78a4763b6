//! Microphone capture and WAV encoding

use std::fmt::Display;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Oldest samples are dropped past this point (30 seconds)
const MAX_BUFFERED_SAMPLES: usize = SAMPLE_RATE as usize * 30;

fn audio_err(e: impl Display) -> Error {
    Error::Audio(e.to_string())
}

/// Mono 16kHz input from the default device
///
/// The cpal stream is not `Send`, so the capture stays on the thread that
/// opened it. Samples are drained through a [`CaptureTap`].
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    tap: CaptureTap,
    stream: Option<Stream>,
}

/// Sendable handle onto the capture buffer
#[derive(Debug, Clone, Default)]
pub struct CaptureTap {
    buffer: Arc<Mutex<Vec<f32>>>,
}

impl CaptureTap {
    /// Append samples from the device callback
    fn push(&self, data: &[f32]) {
        let Ok(mut buf) = self.buffer.lock() else {
            return;
        };
        buf.extend_from_slice(data);
        if buf.len() > MAX_BUFFERED_SAMPLES {
            let excess = buf.len() - MAX_BUFFERED_SAMPLES;
            buf.drain(..excess);
        }
    }

    /// Take the samples captured since the last call
    #[must_use]
    pub fn take(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Discard everything captured so far
    pub fn clear(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }
}

/// Pick a mono config on `device` that can run at [`SAMPLE_RATE`]
fn speech_config(device: &Device) -> Result<StreamConfig> {
    let rate = SampleRate(SAMPLE_RATE);
    device
        .supported_input_configs()
        .map_err(audio_err)?
        .find(|c| c.channels() == 1 && c.min_sample_rate() <= rate && rate <= c.max_sample_rate())
        .map(|c| c.with_sample_rate(rate).config())
        .ok_or_else(|| Error::Audio("no mono 16kHz input config".to_string()))
}

impl AudioCapture {
    /// Open the default input device
    ///
    /// # Errors
    ///
    /// Returns error if there is no input device or it cannot record mono
    /// 16kHz audio
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;
        let config = speech_config(&device)?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            "microphone opened"
        );

        Ok(Self {
            device,
            config,
            tap: CaptureTap::default(),
            stream: None,
        })
    }

    /// Start recording; a no-op while already recording
    ///
    /// # Errors
    ///
    /// Returns error if the input stream cannot be built or started
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let tap = self.tap.clone();
        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| tap.push(data),
                |err| tracing::error!(error = %err, "microphone stream error"),
                None,
            )
            .map_err(audio_err)?;
        stream.play().map_err(audio_err)?;
        self.stream = Some(stream);

        tracing::debug!("microphone recording");
        Ok(())
    }

    /// Stop recording and drop anything not yet drained
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            self.tap.clear();
            tracing::debug!("microphone stopped");
        }
    }

    #[must_use]
    pub fn tap(&self) -> CaptureTap {
        self.tap.clone()
    }

    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }
}

/// Encode mono f32 samples as 16-bit PCM WAV for STT uploads
///
/// Samples outside `[-1.0, 1.0]` are clipped.
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(audio_err)?;
    for &sample in samples {
        writer.write_sample(to_pcm16(sample)).map_err(audio_err)?;
    }
    writer.finalize().map_err(audio_err)?;

    Ok(cursor.into_inner())
}

#[allow(clippy::cast_possible_truncation)]
fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}
