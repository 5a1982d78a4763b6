//! Shared test utilities
//!
//! Deterministic stand-ins for the speech ports and the chat backend, plus a
//! harness that runs a `DialogueSession` on the current `LocalSet`.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use brewbot::backend::{BackendClient, ChatReply, ChatRequest};
use brewbot::config::DialogueConfig;
use brewbot::dialogue::{DialogueHandle, DialogueSession, DialogueStatus};
use brewbot::voice::{LiveTranscript, SpeechCompletion, SpeechInput, SpeechOutput};
use brewbot::{DialogueState, Error, Result};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Calls observed by a [`FakeInput`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCall {
    Start,
    Stop,
    Clear,
    Trim,
}

#[derive(Default)]
struct InputState {
    calls: Vec<InputCall>,
}

/// Scriptable speech input
pub struct FakeInput {
    transcript: Arc<watch::Sender<LiveTranscript>>,
    state: Arc<Mutex<InputState>>,
}

/// Test-side view of a [`FakeInput`]
#[derive(Clone)]
pub struct InputRemote {
    transcript: Arc<watch::Sender<LiveTranscript>>,
    state: Arc<Mutex<InputState>>,
}

#[must_use]
pub fn fake_input() -> (FakeInput, InputRemote) {
    let (tx, _) = watch::channel(LiveTranscript::default());
    let transcript = Arc::new(tx);
    let state = Arc::new(Mutex::new(InputState::default()));
    (
        FakeInput {
            transcript: Arc::clone(&transcript),
            state: Arc::clone(&state),
        },
        InputRemote { transcript, state },
    )
}

impl SpeechInput for FakeInput {
    fn start(&mut self, _continuous: bool) -> Result<()> {
        self.state.lock().unwrap().calls.push(InputCall::Start);
        self.transcript.send_modify(|t| t.listening = true);
        Ok(())
    }

    fn stop(&mut self) {
        self.state.lock().unwrap().calls.push(InputCall::Stop);
        self.transcript.send_modify(|t| t.listening = false);
    }

    fn clear_buffer(&mut self) {
        self.state.lock().unwrap().calls.push(InputCall::Clear);
        self.transcript.send_modify(|t| t.text.clear());
    }

    fn trim_buffer(&mut self, keep: usize) {
        self.state.lock().unwrap().calls.push(InputCall::Trim);
        self.transcript.send_if_modified(|t| t.keep_tail(keep));
    }

    fn transcript(&self) -> watch::Receiver<LiveTranscript> {
        self.transcript.subscribe()
    }
}

impl InputRemote {
    /// Append a final recognition result; dropped while not listening
    pub fn say(&self, text: &str) -> bool {
        self.transcript.send_if_modified(|t| {
            if t.listening {
                t.append(text);
            }
            t.listening
        })
    }

    /// Replace the transcript with an interim hypothesis
    pub fn interim(&self, text: &str) -> bool {
        self.transcript.send_if_modified(|t| {
            if t.listening {
                t.text = text.to_string();
            }
            t.listening
        })
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.transcript.borrow().text.clone()
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.transcript.borrow().listening
    }

    #[must_use]
    pub fn calls(&self) -> Vec<InputCall> {
        self.state.lock().unwrap().calls.clone()
    }

    #[must_use]
    pub fn count(&self, call: InputCall) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }
}

#[derive(Default)]
struct OutputState {
    spoken: Vec<String>,
    pending: Option<SpeechCompletion>,
    cancels: usize,
    /// Every `cancel` call, including ones with nothing to stop
    cancel_calls: usize,
    /// `speak` calls made while input was listening
    overlaps: usize,
}

/// Speech output that holds each completion until the test releases it
pub struct FakeOutput {
    input: InputRemote,
    state: Arc<Mutex<OutputState>>,
}

/// Test-side view of a [`FakeOutput`]
#[derive(Clone)]
pub struct OutputRemote {
    state: Arc<Mutex<OutputState>>,
}

#[must_use]
pub fn fake_output(input: &InputRemote) -> (FakeOutput, OutputRemote) {
    let state = Arc::new(Mutex::new(OutputState::default()));
    (
        FakeOutput {
            input: input.clone(),
            state: Arc::clone(&state),
        },
        OutputRemote { state },
    )
}

impl SpeechOutput for FakeOutput {
    fn speak(&mut self, text: &str, on_complete: SpeechCompletion) {
        let listening = self.input.is_listening();
        let mut state = self.state.lock().unwrap();
        if listening {
            state.overlaps += 1;
        }
        state.spoken.push(text.to_string());
        state.pending = Some(on_complete);
    }

    fn cancel(&mut self) {
        let pending = {
            let mut state = self.state.lock().unwrap();
            state.cancel_calls += 1;
            let pending = state.pending.take();
            if pending.is_some() {
                state.cancels += 1;
            }
            pending
        };
        if let Some(completion) = pending {
            completion.complete();
        }
    }

    fn is_speaking(&self) -> bool {
        self.state.lock().unwrap().pending.is_some()
    }
}

impl OutputRemote {
    /// Let the current utterance finish naturally
    pub fn finish(&self) {
        let pending = self.state.lock().unwrap().pending.take();
        pending.expect("nothing is being spoken").complete();
    }

    #[must_use]
    pub fn spoken(&self) -> Vec<String> {
        self.state.lock().unwrap().spoken.clone()
    }

    #[must_use]
    pub fn cancels(&self) -> usize {
        self.state.lock().unwrap().cancels
    }

    #[must_use]
    pub fn cancel_calls(&self) -> usize {
        self.state.lock().unwrap().cancel_calls
    }

    #[must_use]
    pub fn overlaps(&self) -> usize {
        self.state.lock().unwrap().overlaps
    }
}

/// Backend answering from a queue of canned results
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<ChatReply>>>,
    requests: Mutex<Vec<ChatRequest>>,
    delay: Duration,
}

impl ScriptedBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn reply(self, text: &str, product_context: Option<&str>) -> Self {
        self.replies.lock().unwrap().push_back(Ok(ChatReply {
            text: text.to_string(),
            product_context: product_context.map(ToString::to_string),
        }));
        self
    }

    #[must_use]
    pub fn fail(self, error: Error) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendClient for ScriptedBackend {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Backend("no scripted reply".to_string())))
    }
}

/// A session running on the current `LocalSet`
pub struct Harness {
    pub input: InputRemote,
    pub output: OutputRemote,
    pub backend: Arc<ScriptedBackend>,
    pub handle: DialogueHandle,
    shutdown: mpsc::Sender<()>,
    task: JoinHandle<Result<()>>,
}

impl Harness {
    /// Start a session with default dialogue settings
    ///
    /// Must be called inside `LocalSet::run_until`. Returns once the session
    /// is listening for the wake phrase.
    pub async fn start(backend: ScriptedBackend) -> Self {
        Self::start_with(DialogueConfig::default(), backend).await
    }

    pub async fn start_with(config: DialogueConfig, backend: ScriptedBackend) -> Self {
        let (input, input_remote) = fake_input();
        let (output, output_remote) = fake_output(&input_remote);
        let backend = Arc::new(backend);

        let session = DialogueSession::new(
            config,
            Box::new(input),
            Box::new(output),
            Arc::clone(&backend) as Arc<dyn BackendClient>,
        );
        let handle = session.handle();

        let (shutdown, shutdown_rx) = mpsc::channel(1);
        let task = tokio::task::spawn_local(session.run(shutdown_rx));

        let harness = Self {
            input: input_remote,
            output: output_remote,
            backend,
            handle,
            shutdown,
            task,
        };
        harness.wait_for(|s| s.listening).await;
        harness
    }

    /// Wait until the published status satisfies `pred`
    pub async fn wait_for(&self, pred: impl Fn(&DialogueStatus) -> bool) -> DialogueStatus {
        let mut rx = self.handle.subscribe();
        let status = tokio::time::timeout(Duration::from_secs(60), rx.wait_for(|s| pred(s)))
            .await
            .expect("timed out waiting for dialogue status")
            .expect("dialogue session closed")
            .clone();
        status
    }

    pub async fn wait_for_state(&self, state: DialogueState) -> DialogueStatus {
        self.wait_for(|s| s.state == state).await
    }

    /// Wake the assistant and let the greeting finish
    pub async fn activate(&self) {
        assert!(self.input.say("coffee"));
        self.wait_for_state(DialogueState::Activating).await;
        self.output.finish();
        self.wait_for_state(DialogueState::AwaitingUserInput).await;
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(()).await;
        self.task
            .await
            .expect("session task panicked")
            .expect("session failed");
    }
}
