//! Daemon - the main `BrewBot` service
//!
//! Wires configuration, speech adapters, the chat backend, the dialogue
//! session and the control API together and runs until interrupted.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::api::ApiServer;
use crate::backend::{BackendClient, HttpBackend};
use crate::dialogue::{DialogueHandle, DialogueSession};
use crate::voice::{
    AudioCapture, AudioPlayback, ConsoleInput, ConsoleOutput, MicrophoneInput, SpeechToText,
    SynthesizedOutput, TextToSpeech, TranscriptFeed,
};
use crate::{Config, Result};

/// The `BrewBot` daemon
pub struct Daemon {
    config: Config,
}

impl Daemon {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the daemon until interrupted
    ///
    /// The dialogue session runs on the calling task because audio streams
    /// are not `Send`.
    ///
    /// # Errors
    ///
    /// Returns error if an adapter cannot be initialized or speech input
    /// fails to start
    #[allow(clippy::future_not_send)]
    pub async fn run(self) -> Result<()> {
        let backend: Arc<dyn BackendClient> =
            Arc::new(HttpBackend::from_config(&self.config.backend)?);

        tracing::info!(
            chat_url = %self.config.backend.chat_url,
            wake_phrase = %self.config.dialogue.wake_phrase,
            voice = self.config.voice.enabled,
            "daemon running"
        );

        // Set up shutdown signal
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let ctrl_c_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = ctrl_c_tx.send(()).await;
            }
        });

        let session = if self.config.voice.enabled {
            let stt = SpeechToText::from_config(&self.config.voice, &self.config.api_keys)?;
            let tts = TextToSpeech::from_config(&self.config.voice, &self.config.api_keys)?;
            let input = MicrophoneInput::new(AudioCapture::new()?, stt);
            let output = SynthesizedOutput::new(tts, AudioPlayback::new()?);

            DialogueSession::new(
                self.config.dialogue.clone(),
                Box::new(input),
                Box::new(output),
                backend,
            )
        } else {
            let (input, feed) = ConsoleInput::new();
            let session = DialogueSession::new(
                self.config.dialogue.clone(),
                Box::new(input),
                Box::new(ConsoleOutput),
                backend,
            );
            tokio::spawn(read_console(feed, session.handle(), shutdown_tx));
            session
        };

        let api = self.config.api_server.enabled.then(|| {
            ApiServer::new(
                session.handle(),
                self.config.voice.enabled,
                self.config.api_server.port,
            )
            .spawn()
        });

        let outcome = session.run(shutdown_rx).await;

        if let Some(api) = api {
            api.abort();
        }
        outcome?;

        tracing::info!("daemon stopped");
        Ok(())
    }
}

/// Route stdin lines to the console input, handling slash commands
async fn read_console(feed: TranscriptFeed, handle: DialogueHandle, shutdown: mpsc::Sender<()>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!(
        "Type to talk. Commands: /mute, /sleep, /status, /quit. Say the wake phrase to begin."
    );

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "failed to read stdin");
                break;
            }
        };

        match line.trim() {
            "" => {}
            "/quit" => break,
            "/mute" => {
                handle.toggle_mute();
            }
            "/sleep" => {
                handle.deactivate();
            }
            "/status" => {
                let status = handle.status();
                println!(
                    "state={} muted={} context={:?} history={}",
                    status.state, status.muted, status.product_context, status.history_len
                );
            }
            text => {
                if !feed.push(text) {
                    println!("(busy, try again after the reply)");
                }
            }
        }
    }

    let _ = shutdown.send(()).await;
}
