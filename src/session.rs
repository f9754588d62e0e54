//! Chat session state machine
//!
//! Orchestrates one voice turn: listen, forward the transcript to the chat
//! flow, synthesize the reply, publish the audio, update UI-visible status.
//! A single session exists for the lifetime of the process; its state is
//! lost on restart.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{RwLock, mpsc, watch};

use crate::config::{AUDIO_LOGICAL_NAME, Config};
use crate::flow::FlowClient;
use crate::store::BlobRepo;
use crate::Error;
use crate::voice::VoiceBridge;

/// Fixed diagnostic shown when the flow reply is missing the text path
pub const RESPONSE_FORMAT_MESSAGE: &str = "Error in response format. Check the API response.";

/// Spoken apology published when the flow reply cannot be parsed
pub const APOLOGY_TEXT: &str = "Sorry, there was an error in processing your request.";

/// Message shown when no interpretable speech was captured
const UNRECOGNIZED_MESSAGE: &str = "Speech not recognized.";

/// Session status, surfaced to the UI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Idle,
    Listening,
    Speaking,
    Done,
    Exited,
    Error,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "Idle",
            Self::Listening => "Listening",
            Self::Speaking => "Speaking",
            Self::Done => "Done",
            Self::Exited => "Exited",
            Self::Error => "Error",
        };
        f.write_str(s)
    }
}

/// Commands accepted by the session loop
#[derive(Debug, Clone, Copy)]
pub enum SessionCommand {
    /// Flip the listening toggle (starts the session if not yet running)
    Toggle,
}

/// A point-in-time copy of the session state, serialized for the UI
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSnapshot {
    pub running: bool,
    pub listening: bool,
    pub status: Status,
    pub last_message: String,
    pub audio_url: String,
}

/// Mutable session fields, guarded by the state lock
#[derive(Debug, Default)]
struct SessionFields {
    running: bool,
    listening: bool,
    status: Status,
    last_message: String,
    audio_url: String,
}

impl SessionFields {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            running: self.running,
            listening: self.listening,
            status: self.status,
            last_message: self.last_message.clone(),
            audio_url: self.audio_url.clone(),
        }
    }
}

/// Shared session state
///
/// Mutated only by the session loop; read by the HTTP layer. Every mutation
/// republishes a snapshot on the watch channel so status updates are
/// observable before the next blocking sub-operation begins.
pub struct SessionState {
    inner: RwLock<SessionFields>,
    tx: watch::Sender<SessionSnapshot>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// Create a fresh idle session
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::default());
        Self {
            inner: RwLock::new(SessionFields::default()),
            tx,
        }
    }

    /// Subscribe to snapshot updates
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    /// Current snapshot
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.read().await.snapshot()
    }

    /// Current status
    pub async fn status(&self) -> Status {
        self.inner.read().await.status
    }

    /// Whether the session is running
    pub async fn is_running(&self) -> bool {
        self.inner.read().await.running
    }

    /// Whether the session is listening
    pub async fn is_listening(&self) -> bool {
        self.inner.read().await.listening
    }

    async fn mutate<F: FnOnce(&mut SessionFields)>(&self, f: F) {
        let mut fields = self.inner.write().await;
        f(&mut fields);
        let _ = self.tx.send(fields.snapshot());
    }

    /// Set the status and publish
    pub async fn set_status(&self, status: Status) {
        self.mutate(|f| f.status = status).await;
    }

    /// Set the last message and publish
    pub async fn set_last_message(&self, message: impl Into<String>) {
        self.mutate(|f| f.last_message = message.into()).await;
    }

    /// Set the published audio URL
    pub async fn set_audio_url(&self, url: impl Into<String>) {
        self.mutate(|f| f.audio_url = url.into()).await;
    }

    /// Set the listening flag
    pub async fn set_listening(&self, listening: bool) {
        self.mutate(|f| f.listening = listening).await;
    }

    /// Flip the listening toggle; marks the session running on first use
    ///
    /// Returns the new listening value.
    pub async fn toggle_listening(&self) -> bool {
        let mut result = false;
        self.mutate(|f| {
            f.listening = !f.listening;
            if !f.running {
                f.running = true;
            }
            result = f.listening;
        })
        .await;
        result
    }

    /// Record an error message with error status
    pub async fn record_error(&self, message: impl Into<String>) {
        self.mutate(|f| {
            f.status = Status::Error;
            f.last_message = message.into();
        })
        .await;
    }

    /// Terminate the session: not running, not listening, exited
    pub async fn exit(&self) {
        self.mutate(|f| {
            f.running = false;
            f.listening = false;
            f.status = Status::Exited;
        })
        .await;
    }
}

/// Per-session fixed parameters
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Transcript that ends the session, matched case-insensitively
    pub stop_phrase: String,
    /// Fixed path the TTS step writes and the turn always cleans up
    pub temp_audio_path: PathBuf,
    /// Logical name the reply audio is published under
    pub logical_name: String,
    /// Base URL for the published audio link
    pub public_base_url: String,
}

impl SessionOptions {
    /// Build options from the application config
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            stop_phrase: config.voice.stop_phrase.clone(),
            temp_audio_path: config.temp_audio_path(),
            logical_name: AUDIO_LOGICAL_NAME.to_string(),
            public_base_url: config.server.public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Drives the session state machine
///
/// Owns the voice bridge, flow client, and blob repo; consumes toggle
/// commands from the HTTP layer and runs turns until the session exits.
pub struct SessionRunner {
    state: Arc<SessionState>,
    bridge: Box<dyn VoiceBridge>,
    flow: FlowClient,
    blobs: BlobRepo,
    options: SessionOptions,
}

impl SessionRunner {
    /// Create a new session runner
    #[must_use]
    pub fn new(
        state: Arc<SessionState>,
        bridge: Box<dyn VoiceBridge>,
        flow: FlowClient,
        blobs: BlobRepo,
        options: SessionOptions,
    ) -> Self {
        Self {
            state,
            bridge,
            flow,
            blobs,
            options,
        }
    }

    /// Run the session loop until the command channel closes
    ///
    /// The loop outlives a stop-phrase exit; the next toggle re-arms
    /// `running` and starts a fresh session.
    pub async fn run(self, mut commands: mpsc::Receiver<SessionCommand>) {
        tracing::info!(stop_phrase = %self.options.stop_phrase, "session loop started");

        while let Some(command) = commands.recv().await {
            match command {
                SessionCommand::Toggle => self.toggle().await,
            }

            // A toggle queued while the turn ran targets listening state
            // that the turn-end reset already replaced; applying it late
            // would start a turn the user meant to stop.
            while commands.try_recv().is_ok() {
                tracing::debug!("discarding toggle queued during turn");
            }
        }

        tracing::info!("session loop stopped");
    }

    /// Flip the listening toggle and run turns while listening
    async fn toggle(&self) {
        let listening = self.state.toggle_listening().await;
        tracing::debug!(listening, "toggle");

        while self.state.is_listening().await && self.state.is_running().await {
            self.state.set_status(Status::Listening).await;
            // Let the status update reach observers before the blocking
            // listen begins.
            tokio::task::yield_now().await;

            self.run_turn().await;

            if self.state.is_running().await {
                self.state.set_status(Status::Speaking).await;
            } else {
                self.state.set_status(Status::Exited).await;
            }
        }
    }

    /// One listen -> respond -> speak -> publish cycle
    async fn run_turn(&self) {
        let transcript = match self.bridge.listen().await {
            Ok(transcript) => transcript,
            Err(Error::UnrecognizedSpeech) => {
                tracing::info!("no speech recognized, skipping turn");
                self.state.set_last_message(UNRECOGNIZED_MESSAGE).await;
                self.state.set_listening(false).await;
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "listen failed");
                self.state.record_error(format!("Recognition error: {e}")).await;
                self.state.set_listening(false).await;
                return;
            }
        };

        tracing::info!(transcript = %transcript, "utterance captured");

        if self.is_stop_phrase(&transcript) {
            tracing::info!("stop phrase received, exiting session");
            self.state.exit().await;
            return;
        }

        self.process_message(&transcript).await;
        self.state.set_listening(false).await;
    }

    /// Whether a transcript matches the configured stop phrase
    fn is_stop_phrase(&self, transcript: &str) -> bool {
        transcript.trim().to_lowercase() == self.options.stop_phrase.to_lowercase()
    }

    /// Forward the transcript to the flow and publish the spoken reply
    async fn process_message(&self, transcript: &str) {
        match self.flow.run(transcript).await {
            Ok(reply) => {
                self.state.set_status(Status::Done).await;
                self.state.set_last_message(format!("System: {reply}")).await;
                self.speak_and_publish(&reply).await;
            }
            Err(Error::ResponseFormat) => {
                tracing::warn!("flow reply missing text path");
                self.state.set_last_message(RESPONSE_FORMAT_MESSAGE).await;
                self.speak_and_publish(APOLOGY_TEXT).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "flow call failed");
                self.state.record_error(format!("An error occurred: {e}")).await;
            }
        }

        // Cleanup runs on every branch, upload success or not.
        self.cleanup_temp_audio().await;
    }

    /// Synthesize `text`, upload it under the fixed logical name, and
    /// publish a cache-busted URL
    ///
    /// Upload failures are logged and skip the URL update; they never abort
    /// the turn.
    async fn speak_and_publish(&self, text: &str) {
        if let Err(e) = self
            .bridge
            .speak_to_file(text, &self.options.temp_audio_path)
            .await
        {
            tracing::error!(error = %e, "speech synthesis failed");
            return;
        }

        match self
            .blobs
            .upload(&self.options.temp_audio_path, &self.options.logical_name)
        {
            Ok(_) => {
                let timestamp = chrono::Utc::now().timestamp();
                let url = format!(
                    "{}/audio/{}?t={timestamp}",
                    self.options.public_base_url, self.options.logical_name
                );
                self.state.set_audio_url(url).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "audio upload failed, skipping URL update");
            }
        }
    }

    /// Delete the local temp audio file if it exists
    async fn cleanup_temp_audio(&self) {
        match tokio::fs::remove_file(&self.options.temp_audio_path).await {
            Ok(()) => tracing::debug!("temp audio file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(error = %e, "failed to remove temp audio file"),
        }
    }
}

/// Spawn a session runner on its own task, returning the command sender
#[must_use]
pub fn spawn(runner: SessionRunner) -> mpsc::Sender<SessionCommand> {
    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(runner.run(rx));
    tx
}
