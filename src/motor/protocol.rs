// Motor controller command protocol
//
// Frame format (ASCII): [speed0, angle0, speed1, angle1, ...] joined by ',' and terminated
// by '\n'. Pairs are in motor wiring order; speed is an integer, angle a decimal in radians.

use serialport::{self, SerialPort};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::messages::{MotorCommand, RuntimeHealth, SculptureState};

/// Default serial configuration for the motor controller
pub const DEFAULT_BAUDRATE: u32 = 9600;
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

const FIELD_SEPARATOR: char = ',';
const FRAME_TERMINATOR: char = '\n';

/// Error types for frame decoding
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ProtocolError {
    #[error("Empty command frame")]
    Empty,

    #[error("Command frame has {0} fields, expected speed/angle pairs")]
    OddFieldCount(usize),

    #[error("Invalid speed for motor {index}: {value:?}")]
    InvalidSpeed { index: usize, value: String },

    #[error("Invalid angle for motor {index}: {value:?}")]
    InvalidAngle { index: usize, value: String },
}

/// Error types for sending frames to a collaborator
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Zenoh error: {0}")]
    Zenoh(String),
}

/// Encode motor commands into one text frame
pub fn encode_frame(commands: &[MotorCommand]) -> String {
    let mut frame = commands
        .iter()
        .map(|c| format!("{}{}{}", c.speed, FIELD_SEPARATOR, c.angle))
        .collect::<Vec<_>>()
        .join(",");
    frame.push(FRAME_TERMINATOR);
    frame
}

/// Decode a text frame back into motor commands
pub fn decode_frame(frame: &str) -> Result<Vec<MotorCommand>, ProtocolError> {
    let body = frame.trim_end_matches(['\r', '\n']);
    if body.trim().is_empty() {
        return Err(ProtocolError::Empty);
    }

    let fields: Vec<&str> = body.split(FIELD_SEPARATOR).map(str::trim).collect();
    if fields.len() % 2 != 0 {
        return Err(ProtocolError::OddFieldCount(fields.len()));
    }

    fields
        .chunks_exact(2)
        .enumerate()
        .map(|(index, pair)| -> Result<MotorCommand, ProtocolError> {
            let speed = pair[0]
                .parse::<i32>()
                .map_err(|_| ProtocolError::InvalidSpeed {
                    index,
                    value: pair[0].to_string(),
                })?;
            let angle = pair[1]
                .parse::<f64>()
                .map_err(|_| ProtocolError::InvalidAngle {
                    index,
                    value: pair[1].to_string(),
                })?;
            Ok(MotorCommand::new(speed, angle))
        })
        .collect()
}

/// Anything that consumes the per-tick motor state
pub trait CommandSink {
    fn send(&mut self, state: &SculptureState) -> Result<(), TransportError>;

    /// Tracking status changed; most sinks don't care
    fn health(&mut self, _health: RuntimeHealth) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Serial link to the motor controller driving `num_motors` motors
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    num_motors: usize,
}

impl SerialLink {
    /// Open a new connection to the motor controller
    pub fn open(port_name: &str, num_motors: usize) -> Result<Self, TransportError> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE, num_motors)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(
        port_name: &str,
        baudrate: u32,
        num_motors: usize,
    ) -> Result<Self, TransportError> {
        info!("Opening motor controller on {} @ {} baud", port_name, baudrate);
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port, num_motors })
    }

    /// Write one frame of commands
    pub fn write_commands(&mut self, commands: &[MotorCommand]) -> Result<(), TransportError> {
        let frame = encode_frame(commands);
        debug!("Serial frame: {}", frame.trim_end());
        self.port.write_all(frame.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }

    /// Halt every motor
    pub fn stop(&mut self) -> Result<(), TransportError> {
        info!("Stopping all motors");
        self.write_commands(&MotorCommand::stop_frame(self.num_motors))
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        // Don't leave the sculpture spinning when the link goes away
        if let Err(e) = self.stop() {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}

impl CommandSink for SerialLink {
    fn send(&mut self, state: &SculptureState) -> Result<(), TransportError> {
        self.write_commands(&state.commands)
    }
}

/// Dry-run sink: logs the frame instead of sending it
#[derive(Debug, Default)]
pub struct NullSink;

impl CommandSink for NullSink {
    fn send(&mut self, state: &SculptureState) -> Result<(), TransportError> {
        debug!("Dry run frame: {}", encode_frame(&state.commands).trim_end());
        Ok(())
    }
}
