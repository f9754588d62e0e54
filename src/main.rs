use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voxflow::api::{ApiServer, ApiState};
use voxflow::session::{self, SessionOptions, SessionRunner, SessionState};
use voxflow::store::{self, BlobRepo};
use voxflow::voice::{AudioBridge, AudioCapture, TextToSpeech, calculate_rms};
use voxflow::{Config, FlowClient};

/// Voxflow - voice-driven chat gateway for conversational AI flows
#[derive(Parser)]
#[command(name = "voxflow", version, about)]
struct Cli {
    /// Path to the config file (defaults to the XDG config dir)
    #[arg(short, long, env = "VOXFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(long, env = "VOXFLOW_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable voice capture (serving-only mode, no audio hardware needed)
    #[arg(long, env = "VOXFLOW_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test TTS output
    TestTts {
        /// Text to synthesize
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Send one text message to the chat flow (skips the microphone)
    Ask {
        /// Message text
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voxflow=info",
        1 => "info,voxflow=debug",
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

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.disable_voice {
        config.voice.enabled = false;
    }

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestTts { text } => test_tts(&config, &text).await,
            Command::Ask { text } => ask(&config, &text).await,
        };
    }

    tracing::info!(
        port = config.server.port,
        voice = config.voice.enabled,
        "starting voxflow gateway"
    );

    let pool = store::init(config.store_db_path())?;
    let blobs = BlobRepo::new(pool);
    let state = Arc::new(SessionState::new());

    // The session loop runs only when voice is available; in serving-only
    // mode the toggle endpoint reports the session unavailable.
    let commands = if let (true, Some(api_key)) = (config.voice.enabled, &config.api_keys.openai) {
        let bridge = AudioBridge::new(&config.voice, api_key)?;
        let runner = SessionRunner::new(
            Arc::clone(&state),
            Box::new(bridge),
            FlowClient::new(&config.flow),
            blobs.clone(),
            SessionOptions::from_config(&config),
        );
        session::spawn(runner)
    } else {
        if config.voice.enabled {
            tracing::warn!("OPENAI_API_KEY not set, voice unavailable");
        }
        tracing::info!("running in serving-only mode");
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        drop(rx);
        tx
    };

    let static_dir = config.server.static_dir.clone().or_else(|| {
        let local = PathBuf::from("static");
        local.is_dir().then_some(local)
    });

    let server = ApiServer::new(
        ApiState {
            blobs,
            session: state,
            commands,
        },
        config.server.port,
        static_dir,
    );
    let server_handle = server.spawn();

    tracing::info!("voxflow gateway ready");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
        result = server_handle => {
            result??;
        }
    }

    Ok(())
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    let sample_rate = capture.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        capture.clear_buffer();
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");

    Ok(())
}

/// Test TTS output
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let api_key = config
        .api_keys
        .openai
        .clone()
        .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

    let tts = TextToSpeech::new(
        api_key,
        config.voice.tts_voice.clone(),
        config.voice.tts_speed,
        config.voice.tts_model.clone(),
    )?;

    println!("Synthesizing speech...");
    let audio = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", audio.len());

    let out = config.temp_audio_path();
    tokio::fs::write(&out, &audio).await?;
    println!("Wrote {}", out.display());

    Ok(())
}

/// Send one text message to the chat flow and print the reply
async fn ask(config: &Config, text: &str) -> anyhow::Result<()> {
    let flow = FlowClient::new(&config.flow);
    let reply = flow.run(text).await?;
    println!("{reply}");
    Ok(())
}
