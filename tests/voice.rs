//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use brewbot::voice::{
    ConsoleInput, LiveTranscript, SAMPLE_RATE, SpeechInput, SpeechSegmenter, samples_to_wav,
};
use std::io::Cursor;

/// Chunk size the microphone worker feeds per poll (100ms)
const CHUNK: usize = 1600;

/// Generate sine wave audio samples
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

/// Feed `samples` in microphone-sized chunks, collecting finished segments
fn feed(segmenter: &mut SpeechSegmenter, samples: &[f32]) -> Vec<Vec<f32>> {
    samples
        .chunks(CHUNK)
        .filter_map(|chunk| segmenter.process(chunk))
        .collect()
}

#[test]
fn test_segmenter_ignores_silence() {
    let mut segmenter = SpeechSegmenter::new();
    assert!(feed(&mut segmenter, &generate_silence(3.0)).is_empty());
    assert!(!segmenter.is_speaking());
}

#[test]
fn test_segmenter_ignores_quiet_noise() {
    let mut segmenter = SpeechSegmenter::new();
    let hum = generate_sine_samples(50.0, 2.0, 0.01);
    assert!(feed(&mut segmenter, &hum).is_empty());
    assert!(!segmenter.is_speaking());
}

#[test]
fn test_segmenter_emits_after_trailing_silence() {
    let mut segmenter = SpeechSegmenter::new();

    let speech = generate_sine_samples(440.0, 1.0, 0.5);
    assert!(feed(&mut segmenter, &speech).is_empty());
    assert!(segmenter.is_speaking());

    let segments = feed(&mut segmenter, &generate_silence(1.0));
    assert_eq!(segments.len(), 1);
    assert!(segments[0].len() >= speech.len());
    assert!(!segmenter.is_speaking());
}

#[test]
fn test_segmenter_splits_two_phrases() {
    let mut segmenter = SpeechSegmenter::new();

    let mut audio = generate_sine_samples(440.0, 0.8, 0.5);
    audio.extend(generate_silence(1.0));
    audio.extend(generate_sine_samples(330.0, 0.8, 0.5));
    audio.extend(generate_silence(1.0));

    assert_eq!(feed(&mut segmenter, &audio).len(), 2);
}

#[test]
fn test_segmenter_short_pause_keeps_segment_open() {
    let mut segmenter = SpeechSegmenter::new();

    let mut audio = generate_sine_samples(440.0, 0.5, 0.5);
    audio.extend(generate_silence(0.2));
    audio.extend(generate_sine_samples(440.0, 0.5, 0.5));

    assert!(feed(&mut segmenter, &audio).is_empty());
    assert!(segmenter.is_speaking());
}

#[test]
fn test_segmenter_reset_drops_partial_segment() {
    let mut segmenter = SpeechSegmenter::new();
    feed(&mut segmenter, &generate_sine_samples(440.0, 1.0, 0.5));
    segmenter.reset();

    assert!(!segmenter.is_speaking());
    assert!(feed(&mut segmenter, &generate_silence(1.0)).is_empty());
}

#[test]
fn test_samples_to_wav_header() {
    let samples = generate_sine_samples(440.0, 0.5, 0.5);
    let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");
    // 16-bit mono samples after the header
    assert!(wav.len() > samples.len() * 2);
}

#[test]
fn test_samples_to_wav_readback() {
    let samples = vec![0.0, 0.5, -0.5, 1.0, -1.0, 2.0];
    let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.bits_per_sample, 16);

    let decoded: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
    assert_eq!(decoded, [0, 16383, -16383, 32767, -32767, 32767]);
}

#[test]
fn test_live_transcript_append() {
    let mut transcript = LiveTranscript::default();
    transcript.append("a latte");
    transcript.append("  ");
    transcript.append("with oat milk");
    assert_eq!(transcript.text, "a latte with oat milk");
}

#[test]
fn test_console_feed_only_while_listening() {
    let (mut input, console) = ConsoleInput::new();
    let transcript = input.transcript();

    assert!(!console.push("coffee"));
    assert_eq!(transcript.borrow().text, "");

    input.start(true).unwrap();
    assert!(console.push("coffee"));
    assert_eq!(transcript.borrow().text, "coffee");

    input.clear_buffer();
    assert_eq!(transcript.borrow().text, "");

    input.stop();
    assert!(!console.push("a latte"));
    assert!(!transcript.borrow().listening);
}

#[test]
fn test_console_trim_keeps_tail() {
    let (mut input, console) = ConsoleInput::new();
    let mut transcript = input.transcript();
    input.start(true).unwrap();

    assert!(console.push("the weather is lovely today"));
    assert!(console.push("isn't it"));
    transcript.borrow_and_update();

    input.trim_buffer(100);
    assert!(!transcript.has_changed().unwrap());

    input.trim_buffer(8);
    assert!(transcript.has_changed().unwrap());
    assert_eq!(transcript.borrow_and_update().text, "isn't it");
    assert!(transcript.borrow().listening);
}
