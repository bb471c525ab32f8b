// Motor sweep: step every motor through a few uniform speeds
//
// Use this to check the wiring and the controller's frame parsing before running the
// full tracking loop. Angles are sent as 0 for every step.
//
// Usage: cargo run --bin motor_sweep -- [port] [num_motors]
// Example: cargo run --bin motor_sweep -- /dev/ttyACM0 8

use sculpture_runtime::config::NUM_MOTORS;
use sculpture_runtime::messages::MotorCommand;
use sculpture_runtime::motor::{SerialLink, encode_frame};
use std::io::{self, Write};
use std::thread::sleep;
use std::time::Duration;

const SWEEP_SPEEDS: [i32; 4] = [100, 90, 80, 70];
const STEP_DURATION: Duration = Duration::from_secs(1);

fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let port = args.next().unwrap_or_else(|| "/dev/ttyACM0".to_string());
    let num_motors = match args.next() {
        Some(n) => n.parse()?,
        None => NUM_MOTORS,
    };

    println!("Sculpture motor sweep");
    println!("Serial port: {}", port);
    println!("Motors: {}", num_motors);
    println!("Speeds: {:?}, {:?} each", SWEEP_SPEEDS, STEP_DURATION);
    println!();

    if !confirm("Is the sculpture clear to move?")? {
        return Ok(());
    }

    // Dropping the link sends a stop frame, including on early error returns
    let mut link = SerialLink::open(&port, num_motors)?;
    println!("✓ Connected");

    for speed in SWEEP_SPEEDS {
        let commands = vec![MotorCommand::new(speed, 0.0); num_motors];
        print!("  {}", encode_frame(&commands));
        link.write_commands(&commands)?;
        sleep(STEP_DURATION);
    }

    println!();
    print!("Holding last speed, press Enter to stop...");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    link.stop()?;
    println!("✓ Motors stopped");
    Ok(())
}
