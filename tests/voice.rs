//! Voice pipeline tests
//!
//! Exercises utterance segmentation and WAV encoding without audio hardware

use std::io::Cursor;

use voxflow::voice::{DetectorState, SAMPLE_RATE, UtteranceDetector, calculate_rms, samples_to_wav};

mod common;

/// Generate sine wave audio samples
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
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
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

#[test]
fn detector_starts_waiting() {
    let detector = UtteranceDetector::new(0.1);
    assert_eq!(detector.state(), DetectorState::Waiting);
    assert!(detector.speech_buffer().is_empty());
}

#[test]
fn detector_ignores_silence() {
    let mut detector = UtteranceDetector::new(0.1);

    for _ in 0..20 {
        assert!(!detector.process(&generate_silence(0.1)));
    }

    assert_eq!(detector.state(), DetectorState::Waiting);
    assert!(detector.speech_buffer().is_empty());
}

#[test]
fn detector_ignores_audio_below_threshold() {
    let mut detector = UtteranceDetector::new(0.1);

    let quiet = generate_sine_samples(440.0, 0.5, 0.01);
    assert!(!detector.process(&quiet));
    assert_eq!(detector.state(), DetectorState::Waiting);
}

#[test]
fn detector_captures_speech_above_threshold() {
    let mut detector = UtteranceDetector::new(0.1);

    let speech = generate_sine_samples(440.0, 0.1, 0.5);
    assert!(!detector.process(&speech));
    assert_eq!(detector.state(), DetectorState::Capturing);
    assert_eq!(detector.speech_buffer().len(), speech.len());
}

#[test]
fn utterance_completes_after_trailing_silence() {
    let mut detector = UtteranceDetector::new(0.1);

    // Half a second of speech in 0.1s chunks
    for _ in 0..5 {
        assert!(!detector.process(&generate_sine_samples(440.0, 0.1, 0.5)));
    }
    assert_eq!(detector.state(), DetectorState::Capturing);

    // Trailing silence ends the utterance once the window elapses
    let mut completed = false;
    for _ in 0..10 {
        if detector.process(&generate_silence(0.1)) {
            completed = true;
            break;
        }
    }

    assert!(completed);
    let samples = detector.take_speech_buffer();
    assert!(!samples.is_empty());
    assert!(detector.speech_buffer().is_empty());
}

#[test]
fn speech_resets_silence_window() {
    let mut detector = UtteranceDetector::new(0.1);

    detector.process(&generate_sine_samples(440.0, 0.2, 0.5));

    // Half the silence window, then more speech, then silence again
    for _ in 0..5 {
        assert!(!detector.process(&generate_silence(0.1)));
    }
    assert!(!detector.process(&generate_sine_samples(440.0, 0.1, 0.5)));

    let mut chunks_to_complete = 0;
    for _ in 0..10 {
        chunks_to_complete += 1;
        if detector.process(&generate_silence(0.1)) {
            break;
        }
    }

    // The full silence window is required again after the interruption
    assert!(chunks_to_complete > 7);
}

#[test]
fn reset_returns_to_waiting() {
    let mut detector = UtteranceDetector::new(0.1);

    detector.process(&generate_sine_samples(440.0, 0.2, 0.5));
    assert_eq!(detector.state(), DetectorState::Capturing);

    detector.reset();
    assert_eq!(detector.state(), DetectorState::Waiting);
    assert!(detector.speech_buffer().is_empty());
}

#[test]
fn rms_scales_with_amplitude() {
    let quiet = calculate_rms(&generate_sine_samples(440.0, 0.1, 0.1));
    let loud = calculate_rms(&generate_sine_samples(440.0, 0.1, 0.5));

    assert!(quiet < loud);
    // Sine RMS is amplitude / sqrt(2)
    assert!((loud - 0.5 / std::f32::consts::SQRT_2).abs() < 0.01);
}

#[test]
fn wav_encoding_preserves_format_and_length() {
    let samples = generate_sine_samples(440.0, 0.25, 0.5);
    let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let spec = reader.spec();

    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);
    assert_eq!(reader.len() as usize, samples.len());
}

#[test]
fn wav_encoding_clamps_overdriven_samples() {
    let samples = vec![2.0f32, -2.0f32];
    let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let decoded: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();

    assert_eq!(decoded, vec![32767, -32768]);
}

#[test]
fn empty_input_yields_valid_empty_wav() {
    let wav = samples_to_wav(&[], SAMPLE_RATE).unwrap();

    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    assert_eq!(reader.len(), 0);
}
