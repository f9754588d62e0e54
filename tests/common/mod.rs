//! Shared test utilities

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{Json, Router, routing::post};
use tokio::sync::{Semaphore, watch};

use voxflow::session::{SessionOptions, SessionSnapshot};
use voxflow::store::DbPool;
use voxflow::voice::VoiceBridge;
use voxflow::{Error, Result, store};

/// Set up an in-memory blob store
#[must_use]
pub fn setup_test_store() -> DbPool {
    store::init_memory().expect("failed to init test store")
}

/// What the scripted bridge does when asked to speak
#[derive(Debug, Clone, Copy)]
pub enum SpeakBehavior {
    /// Write placeholder audio bytes to the requested path
    WriteFile,
    /// Report success without writing the file
    SkipWrite,
    /// Fail synthesis outright
    Fail,
}

/// A voice bridge driven by a pre-scripted list of listen outcomes
pub struct ScriptedBridge {
    transcripts: Mutex<VecDeque<Result<String>>>,
    spoken: Arc<Mutex<Vec<String>>>,
    speak: SpeakBehavior,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedBridge {
    pub fn new(transcripts: Vec<Result<String>>) -> Self {
        Self::with_speak(transcripts, SpeakBehavior::WriteFile)
    }

    pub fn with_speak(transcripts: Vec<Result<String>>, speak: SpeakBehavior) -> Self {
        Self {
            transcripts: Mutex::new(transcripts.into()),
            spoken: Arc::new(Mutex::new(Vec::new())),
            speak,
            gate: None,
        }
    }

    /// Block each `listen` until a permit is added to `gate`, letting a
    /// test hold a turn open
    #[must_use]
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Handle on the texts passed to `speak_to_file`, usable after the
    /// bridge has been moved into a runner
    pub fn spoken_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.spoken)
    }
}

#[async_trait]
impl VoiceBridge for ScriptedBridge {
    async fn listen(&self) -> Result<String> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        self.transcripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Stt("script exhausted".to_string())))
    }

    async fn speak_to_file(&self, text: &str, path: &Path) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());

        match self.speak {
            SpeakBehavior::WriteFile => {
                tokio::fs::write(path, b"mp3 bytes").await?;
                Ok(())
            }
            SpeakBehavior::SkipWrite => Ok(()),
            SpeakBehavior::Fail => Err(Error::Tts("synthesis unavailable".to_string())),
        }
    }
}

/// Nest a reply text inside the flow response structure
#[must_use]
pub fn flow_reply(text: &str) -> serde_json::Value {
    serde_json::json!({
        "outputs": [{
            "outputs": [{
                "results": {"message": {"data": {"text": text}}}
            }]
        }]
    })
}

/// Spawn a local flow endpoint that answers every run with `reply`
///
/// Returns the base URL and a hit counter.
pub async fn spawn_flow_server(reply: serde_json::Value) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let handler_hits = Arc::clone(&hits);

    let app = Router::new().route(
        "/lf/{namespace}/api/v1/run/{flow_id}",
        post(move || {
            handler_hits.fetch_add(1, Ordering::SeqCst);
            let reply = reply.clone();
            async move { Json(reply) }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind flow server");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), hits)
}

/// Spawn a local flow endpoint that fails every run with a 500
pub async fn spawn_failing_flow_server() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let handler_hits = Arc::clone(&hits);

    let app = Router::new().route(
        "/lf/{namespace}/api/v1/run/{flow_id}",
        post(move || {
            handler_hits.fetch_add(1, Ordering::SeqCst);
            async move {
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "flow exploded",
                )
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind flow server");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), hits)
}

/// Session options pointing at a test temp directory
#[must_use]
pub fn test_options(dir: &Path) -> SessionOptions {
    SessionOptions {
        stop_phrase: "stop the chat".to_string(),
        temp_audio_path: dir.join("response_audio.mp3"),
        logical_name: "audio.mp3".to_string(),
        public_base_url: "http://127.0.0.1:5000".to_string(),
    }
}

/// Wait until the session snapshot satisfies `pred`, with a timeout
pub async fn wait_for<F>(rx: &mut watch::Receiver<SessionSnapshot>, pred: F) -> SessionSnapshot
where
    F: Fn(&SessionSnapshot) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let snapshot = rx.borrow();
                if pred(&snapshot) {
                    return snapshot.clone();
                }
            }
            rx.changed().await.expect("session state dropped");
        }
    })
    .await
    .expect("timed out waiting for session state")
}
