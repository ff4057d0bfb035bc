use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use ember_satellite::audio::{self, MicrophoneInput, SpeakerOutput};
use ember_satellite::client::CoreClient;
use ember_satellite::endpoint::EndpointConfig;
use ember_satellite::leds::Lantern;
use ember_satellite::listener::{spawn_listener, ListenerConfig};
use ember_satellite::runner::{run_forever, Satellite};
use ember_satellite::tts::{PiperSpeech, Synthesizer};
use ember_satellite::Config;

#[derive(Parser, Debug)]
#[command(name = "ember-satellite")]
#[command(about = "Edge voice satellite for the Ember assistant")]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "satellite.json")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// List available audio devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Audio input device name (default device if not set)
    #[arg(long)]
    input_device: Option<String>,

    /// Audio output device name (default device if not set)
    #[arg(long)]
    output_device: Option<String>,

    /// Save each captured utterance as a WAV file into this directory
    #[arg(long)]
    save_captures: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    dotenvy::dotenv().ok();

    if args.list_devices {
        println!("Available input devices:");
        match audio::list_input_devices() {
            Ok(devices) => {
                for name in devices {
                    println!("  - {}", name);
                }
            }
            Err(e) => println!("  <error: {}>", e),
        }
        println!("\nAvailable output devices:");
        match audio::list_output_devices() {
            Ok(devices) => {
                for name in devices {
                    println!("  - {}", name);
                }
            }
            Err(e) => println!("  <error: {}>", e),
        }
        return Ok(());
    }

    log::info!("Loading config from {}", args.config.display());
    let config = Config::from_file(&args.config);

    let lantern = Lantern::new(&config.led);

    // Audio hardware failures are fatal; the LED driver already degraded to
    // mock if absent.
    let microphone =
        MicrophoneInput::open(args.input_device.clone()).context("opening microphone")?;
    let speaker = SpeakerOutput::open(args.output_device.clone()).context("opening speaker")?;

    let listener = spawn_listener(
        microphone.frames(),
        ListenerConfig {
            wake: config.wake.clone(),
            asr: config.asr.clone(),
            endpoint: EndpointConfig::default(),
            capture_dir: args.save_captures.clone(),
        },
    )
    .context("starting listener worker")?;

    let synthesizer = Synthesizer::from_config(&config.tts).context("initialising TTS")?;
    let speech = Arc::new(PiperSpeech::new(synthesizer, speaker.handle()));

    let backend = Arc::new(CoreClient::from_config(&config.core));

    let satellite = Satellite::new(lantern, listener, backend, speech, "satellite");

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Received Ctrl+C, shutting down...");
            signal_cancel.cancel();
        }
    });

    log::info!("Listening for the wake word. Press Ctrl+C to exit.");
    run_forever(satellite, cancel).await;

    if microphone.dropped_frames() > 0 {
        log::debug!(
            "{} frames dropped while busy",
            microphone.dropped_frames()
        );
    }

    Ok(())
}
