//! Voxflow - voice-driven chat gateway for conversational AI flows
//!
//! This library provides the core functionality for the voxflow gateway:
//! - Voice capture, speech recognition, and speech synthesis
//! - A single-session chat state machine (listen, respond, speak, publish)
//! - A blob store publishing the reply audio to a browser UI
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   Browser UI                         │
//! │   toggle  │  status text  │  audio element          │
//! └────────────────────┬────────────────────────────────┘
//!                      │ HTTP
//! ┌────────────────────▼────────────────────────────────┐
//! │                Voxflow Gateway                       │
//! │   Session  │  Mic/STT  │  TTS  │  Blob Store        │
//! └────────────────────┬────────────────────────────────┘
//!                      │ HTTPS
//! ┌────────────────────▼────────────────────────────────┐
//! │              Chat Flow (remote run API)              │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod flow;
pub mod session;
pub mod store;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use flow::FlowClient;
pub use session::{
    SessionCommand, SessionOptions, SessionRunner, SessionSnapshot, SessionState, Status,
};
pub use store::{Blob, BlobRepo};
pub use voice::{AudioBridge, VoiceBridge};
