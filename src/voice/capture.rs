//! Audio capture from microphone
//!
//! Capture holds the default input device exclusively for the duration of
//! one listen call. Ambient noise is measured over a short calibration
//! window before each utterance to set the speech energy threshold.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Floor for the speech energy threshold, regardless of ambient level
const MIN_ENERGY_THRESHOLD: f32 = 0.015;

/// Ambient level multiplier applied during calibration
const AMBIENT_MARGIN: f32 = 2.0;

/// Minimum duration of speech to accept an utterance (samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Trailing silence that ends an utterance (samples at 16kHz)
const SILENCE_SAMPLES: usize = 12000; // 0.75 seconds

/// Capture polling interval while waiting for samples
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captures audio from the default input device
pub struct AudioCapture {
    #[allow(dead_code)]
    device: Device,
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// # Errors
    ///
    /// Returns error if no input device supports mono 16kHz capture
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Start capturing audio
    ///
    /// # Errors
    ///
    /// Returns error if the input stream cannot be built or started
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Get captured audio buffer and clear it
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Get captured audio buffer without clearing
    #[must_use]
    pub fn peek_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    /// Clear the audio buffer
    pub fn clear_buffer(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    /// Get the sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// Measure ambient noise and return the speech energy threshold
    ///
    /// Blocks for the calibration window, discarding the sampled audio.
    pub fn calibrate_ambient(&self, window: Duration) -> f32 {
        self.clear_buffer();
        std::thread::sleep(window);
        let ambient = calculate_rms(&self.take_buffer());
        let threshold = (ambient * AMBIENT_MARGIN).max(MIN_ENERGY_THRESHOLD);

        tracing::debug!(ambient, threshold, "ambient calibration complete");
        threshold
    }

    /// Block until one utterance is captured and return its samples
    ///
    /// Waits for speech above `threshold`, accumulates until a trailing
    /// silence window elapses, and cuts off at `max_duration`. Returns an
    /// empty vec when `max_duration` passes without enough speech.
    #[must_use]
    pub fn record_utterance(&self, threshold: f32, max_duration: Duration) -> Vec<f32> {
        let mut detector = UtteranceDetector::new(threshold);
        let deadline = Instant::now() + max_duration;

        loop {
            std::thread::sleep(POLL_INTERVAL);
            let chunk = self.take_buffer();

            if detector.process(&chunk) {
                return detector.take_speech_buffer();
            }

            if Instant::now() >= deadline {
                let samples = detector.take_speech_buffer();
                if samples.len() > MIN_SPEECH_SAMPLES {
                    tracing::debug!(samples = samples.len(), "utterance cut off at max duration");
                    return samples;
                }
                return Vec::new();
            }
        }
    }
}

/// State of the utterance detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for speech
    Waiting,
    /// Speech detected, accumulating samples
    Capturing,
}

/// Segments one utterance out of a sample stream by energy thresholding
pub struct UtteranceDetector {
    threshold: f32,
    state: DetectorState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
}

impl UtteranceDetector {
    /// Create a detector with the given speech energy threshold
    #[must_use]
    pub const fn new(threshold: f32) -> Self {
        Self {
            threshold,
            state: DetectorState::Waiting,
            speech_buffer: Vec::new(),
            silence_counter: 0,
        }
    }

    /// Process a chunk of samples
    ///
    /// Returns true when the utterance is complete (enough speech followed
    /// by the trailing silence window).
    pub fn process(&mut self, samples: &[f32]) -> bool {
        if samples.is_empty() {
            return false;
        }

        let energy = calculate_rms(samples);
        let is_speech = energy > self.threshold;

        match self.state {
            DetectorState::Waiting => {
                if is_speech {
                    self.state = DetectorState::Capturing;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected, capturing");
                }
            }
            DetectorState::Capturing => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.silence_counter > SILENCE_SAMPLES
                    && self.speech_buffer.len() > MIN_SPEECH_SAMPLES
                {
                    tracing::debug!(samples = self.speech_buffer.len(), "utterance complete");
                    return true;
                }
            }
        }

        false
    }

    /// Take the accumulated speech samples, clearing the buffer
    pub fn take_speech_buffer(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.speech_buffer)
    }

    /// Get the accumulated speech samples
    #[must_use]
    pub fn speech_buffer(&self) -> &[f32] {
        &self.speech_buffer
    }

    /// Current detector state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }

    /// Reset to the waiting state
    pub fn reset(&mut self) {
        self.state = DetectorState::Waiting;
        self.speech_buffer.clear();
        self.silence_counter = 0;
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Convert f32 samples to WAV bytes for the STT API
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

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
