use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use brewbot::backend::{BackendClient, ChatRequest, HttpBackend};
use brewbot::voice::{AudioCapture, AudioPlayback, SAMPLE_RATE, TextToSpeech, rms};
use brewbot::{Config, Daemon};

/// BrewBot - voice-activated coffee ordering assistant
#[derive(Parser)]
#[command(name = "brewbot", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use the terminal instead of microphone and speakers
    #[arg(long)]
    console: bool,

    /// Start with speech output muted
    #[arg(long)]
    muted: bool,

    /// Chat backend endpoint
    #[arg(long)]
    chat_url: Option<String>,

    /// Control API port
    #[arg(long)]
    port: Option<u16>,

    /// Do not serve the control API
    #[arg(long)]
    no_api: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Send one message to the chat backend and print the reply
    Ask {
        /// Message to send
        message: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,brewbot=info",
        1 => "info,brewbot=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    apply_overrides(&mut config, &cli);
    config.validate()?;
    tracing::debug!(dialogue = ?config.dialogue, backend = ?config.backend, "loaded configuration");

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&config, &text).await,
            Command::Ask { message } => ask(&config, message).await,
        };
    }

    if config.voice.enabled {
        tracing::info!("brewbot ready - say \"{}\"", config.dialogue.wake_phrase);
    } else {
        tracing::info!("brewbot ready (console mode)");
    }

    Daemon::new(config).run().await?;

    Ok(())
}

/// Command-line flags win over environment and config file
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if cli.console {
        config.voice.enabled = false;
    }
    if cli.muted {
        config.dialogue.start_muted = true;
    }
    if let Some(url) = &cli.chat_url {
        config.backend.chat_url.clone_from(url);
    }
    if let Some(port) = cli.port {
        config.api_server.port = port;
    }
    if cli.no_api {
        config.api_server.enabled = false;
    }
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;
    let tap = capture.tap();

    println!("Sample rate: {SAMPLE_RATE} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = tap.take();
        let energy = rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    // 2 seconds of 440Hz at 24kHz
    let sample_rate = 24000_i32;
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (sample_rate as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    tokio::task::spawn_blocking(move || {
        playback.play_samples_blocking(samples, &AtomicBool::new(false))
    })
    .await??;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

/// Test the configured TTS provider end to end
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let tts = TextToSpeech::from_config(&config.voice, &config.api_keys)?;

    println!("Synthesizing speech...");
    let mp3_data = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    println!("Playing audio...");
    let playback = AudioPlayback::new()?;
    tokio::task::spawn_blocking(move || {
        playback.play_mp3_blocking(&mp3_data, &AtomicBool::new(false))
    })
    .await??;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// One-shot exchange with the chat backend
async fn ask(config: &Config, message: String) -> anyhow::Result<()> {
    let backend = HttpBackend::from_config(&config.backend)?;
    let request = ChatRequest {
        message,
        memory: Vec::new(),
        context_memory: String::new(),
    };

    let reply = backend.send(&request).await?;

    println!("{}", reply.text);
    if let Some(context) = reply.product_context {
        println!("(product context: {context})");
    }

    Ok(())
}
