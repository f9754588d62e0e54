//! Text-to-speech (TTS) processing

use std::path::Path;

use crate::{Error, Result};

/// TTS synthesis API endpoint
const SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    speed: f32,
    model: String,
}

impl TextToSpeech {
    /// Create a new TTS instance
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(api_key: String, voice: String, speed: f32, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            speed,
            model,
        })
    }

    /// Synthesize text to speech
    ///
    /// # Returns
    ///
    /// Audio bytes (MP3 format)
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post(SPEECH_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Tts(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("TTS API error {status}: {body}")));
        }

        let audio = response.bytes().await.map_err(|e| Error::Tts(e.to_string()))?;
        Ok(audio.to_vec())
    }

    /// Synthesize text and write the audio to a file
    ///
    /// The file is fully written and flushed before this returns; callers
    /// may hand the path off for upload immediately.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or the file write fails
    pub async fn synthesize_to_file(&self, text: &str, path: &Path) -> Result<()> {
        let audio = self.synthesize(text).await?;
        tokio::fs::write(path, &audio).await?;
        tracing::debug!(path = %path.display(), bytes = audio.len(), "reply audio written");
        Ok(())
    }
}
