//! Voice processing: microphone capture, speech recognition, synthesis

pub mod capture;
pub mod stt;
pub mod tts;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

pub use capture::{
    AudioCapture, DetectorState, SAMPLE_RATE, UtteranceDetector, calculate_rms, samples_to_wav,
};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;

use crate::{Error, Result};

/// The seam between the session loop and audio hardware/services
///
/// The production implementation is [`AudioBridge`]; tests substitute
/// scripted implementations.
#[async_trait]
pub trait VoiceBridge: Send + Sync {
    /// Capture one utterance and return its transcript
    ///
    /// May block for an unbounded period; implementations must keep the
    /// blocking work off the scheduler thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnrecognizedSpeech`] when no interpretable speech was
    /// captured, [`Error::Stt`] when the recognizer is unreachable or errors
    async fn listen(&self) -> Result<String>;

    /// Synthesize `text` and write the finalized audio file to `path`
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or the write fails
    async fn speak_to_file(&self, text: &str, path: &Path) -> Result<()>;
}

/// Production voice bridge: cpal capture, remote STT, remote TTS
pub struct AudioBridge {
    stt: SpeechToText,
    tts: TextToSpeech,
    calibration: Duration,
    max_utterance: Duration,
}

impl AudioBridge {
    /// Create an audio bridge from the voice configuration
    ///
    /// # Errors
    ///
    /// Returns error if the STT/TTS API key is missing
    pub fn new(config: &crate::config::VoiceConfig, api_key: &str) -> Result<Self> {
        Ok(Self {
            stt: SpeechToText::new(api_key.to_string(), config.stt_model.clone())?,
            tts: TextToSpeech::new(
                api_key.to_string(),
                config.tts_voice.clone(),
                config.tts_speed,
                config.tts_model.clone(),
            )?,
            calibration: Duration::from_millis(config.calibration_ms),
            max_utterance: Duration::from_secs(config.max_utterance_secs),
        })
    }
}

#[async_trait]
impl VoiceBridge for AudioBridge {
    async fn listen(&self) -> Result<String> {
        let calibration = self.calibration;
        let max_utterance = self.max_utterance;

        // The microphone is opened, held exclusively, and dropped entirely
        // inside this blocking task; cpal streams are not Send.
        let samples = tokio::task::spawn_blocking(move || -> Result<Vec<f32>> {
            let mut capture = AudioCapture::new()?;
            capture.start()?;
            let threshold = capture.calibrate_ambient(calibration);
            let samples = capture.record_utterance(threshold, max_utterance);
            capture.stop();
            Ok(samples)
        })
        .await
        .map_err(|e| Error::Audio(format!("capture task failed: {e}")))??;

        if samples.is_empty() {
            return Err(Error::UnrecognizedSpeech);
        }

        let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
        self.stt.transcribe(&wav).await
    }

    async fn speak_to_file(&self, text: &str, path: &Path) -> Result<()> {
        self.tts.synthesize_to_file(text, path).await
    }
}
