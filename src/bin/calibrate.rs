// Calibrate: write the motor positions file the runtime loads at startup
//
// Motor x positions are read off the camera preview, which is usually wider than the frame
// the detector processes. Pass them in wiring order and they are scaled to processing pixels.
// With `--motor`, a single motor is moved in an existing file instead.
//
// Usage: cargo run --bin calibrate -- --viewing-width 1280 [x0 x1 ...]
// Example: cargo run --bin calibrate -- --viewing-width 1280 40 180 320 460 600 740 880 1020
//          cargo run --bin calibrate -- --viewing-width 1280 --motor 2 350

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sculpture_runtime::calibration;
use sculpture_runtime::config::{CALIBRATION_PATH, FRAME_WIDTH, NUM_MOTORS, SculptureConfig};
use sculpture_runtime::motor::MotorArray;

/// Record motor positions for the sculpture runtime
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Width of the preview the positions were read from, in pixels
    #[arg(long)]
    viewing_width: u32,

    /// Width of the frame the detector processes, in pixels
    #[arg(long, default_value_t = FRAME_WIDTH)]
    processing_width: u32,

    /// Number of motors on the sculpture
    #[arg(short = 'n', long, default_value_t = NUM_MOTORS)]
    motors: usize,

    /// Calibration file to write
    #[arg(short, long, default_value = CALIBRATION_PATH)]
    output: PathBuf,

    /// Re-pick one motor (wiring index) in the existing file
    #[arg(short, long)]
    motor: Option<usize>,

    /// Motor x positions in the preview, wiring order
    #[arg(allow_negative_numbers = true)]
    positions: Vec<i32>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if cli.viewing_width == 0 {
        return Err("viewing width must be positive".into());
    }
    let scaled = calibration::scale_to_processing(&cli.positions, cli.viewing_width, cli.processing_width);

    let positions = match cli.motor {
        Some(index) => {
            let &[x] = scaled.as_slice() else {
                return Err(format!("--motor takes exactly one position, got {}", scaled.len()).into());
            };
            let existing = calibration::load(&cli.output, cli.motors)?;
            let config = SculptureConfig::default();
            let mut array = MotorArray::new(&existing, config.curve(), config.bounds(), cli.processing_width);
            array
                .recalibrate(index, x)
                .ok_or_else(|| format!("motor {} out of range (0..{})", index, cli.motors))?;
            array.motors().iter().map(|m| m.position()).collect::<Vec<_>>()
        }
        None => {
            calibration::check_len(&scaled, cli.motors)?;
            scaled
        }
    };

    calibration::save(&cli.output, &positions)?;
    info!("Wrote {} motor positions to {}", positions.len(), cli.output.display());
    println!("{:?}", positions);
    Ok(())
}
