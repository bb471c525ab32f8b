// Define message types for the runtime

use serde::{Deserialize, Serialize};

/// Bounding box in processing-frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
}

impl BoundingBox {
    pub fn new(start_x: f64, start_y: f64, end_x: f64, end_y: f64) -> Self {
        Self {
            start_x,
            start_y,
            end_x,
            end_y,
        }
    }

    /// Horizontal midpoint of the box
    pub fn center_x(&self) -> f64 {
        (self.start_x + self.end_x) / 2.0
    }
}

// Detection from the vision process -> runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// Result of running the detector on one frame: zero or one detection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    #[serde(default)]
    pub detection: Option<Detection>,
}

impl FrameReport {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_detection(detection: Detection) -> Self {
        Self {
            detection: Some(detection),
        }
    }
}

/// Command for one motor, as sent to the motor controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct MotorCommand {
    pub speed: i32,
    pub angle: f64,
}

impl MotorCommand {
    pub fn new(speed: i32, angle: f64) -> Self {
        Self { speed, angle }
    }

    /// All motors halted
    pub fn stop_frame(num_motors: usize) -> Vec<MotorCommand> {
        vec![MotorCommand::default(); num_motors]
    }
}

/// Snapshot published by the runtime after every tracked tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SculptureState {
    pub target_x: f64,
    pub velocity: f64,
    pub commands: Vec<MotorCommand>,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Idle,
    Tracking,
}
