use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sculpture_runtime::config::{CALIBRATION_PATH, SculptureConfig};
use sculpture_runtime::motor::protocol::DEFAULT_BAUDRATE;
use sculpture_runtime::runtime::{self, RunOptions};

/// Drive the kinetic sculpture from tracked detections
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// JSON file with sculpture settings (defaults used for missing fields)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Calibrated motor positions (JSON array, wiring order)
    #[arg(short = 'l', long, default_value = CALIBRATION_PATH)]
    calibration: PathBuf,

    /// Minimum probability to accept a detection
    #[arg(short, long)]
    confidence: Option<f64>,

    /// Override the rise speed of the response curve
    #[arg(long)]
    rise_speed: Option<f64>,

    /// Replay frame reports (JSON lines) instead of subscribing to the detector
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Delay between replayed frames, in milliseconds
    #[arg(long)]
    replay_interval_ms: Option<u64>,

    /// Motor controller serial device (dry run without it)
    #[arg(short, long)]
    serial: Option<String>,

    #[arg(long, default_value_t = DEFAULT_BAUDRATE)]
    baud: u32,

    /// Don't publish motor state and health over zenoh
    #[arg(long)]
    no_publish: bool,

    /// Stop when `q` is pressed in this terminal
    #[arg(short, long)]
    keyboard: bool,
}

impl Cli {
    fn into_options(self) -> Result<RunOptions, Box<dyn std::error::Error + Send + Sync>> {
        let mut config = match &self.config {
            Some(path) => SculptureConfig::load(path)?,
            None => SculptureConfig::default(),
        };
        if let Some(confidence) = self.confidence {
            config.confidence_threshold = confidence;
        }
        if let Some(rise_speed) = self.rise_speed {
            config.rise_speed = rise_speed;
        }

        Ok(RunOptions {
            config,
            calibration_path: self.calibration,
            replay: self.replay,
            replay_interval: self.replay_interval_ms.map(Duration::from_millis),
            serial_port: self.serial,
            baud_rate: self.baud,
            publish_state: !self.no_publish,
            keyboard: self.keyboard,
        })
    }
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let options = match Cli::parse().into_options() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
