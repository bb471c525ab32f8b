// Topics, motor limits, response curve defaults
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::motor::curve::{AngleCurve, SpeedBounds, SpeedRange};

// Sculpture layout
pub const NUM_MOTORS: usize = 8;
pub const FRAME_WIDTH: u32 = 300; // processing frame, pixels

// Motor limits
pub const MOTOR_STALL_SPEED: i32 = 20;
pub const MOTOR_MAX_SPEED: i32 = 200;

// Response curve
pub const RISE_SPEED: f64 = 18.0;
pub const FLATTENING: f64 = 0.15;
pub const SENSITIVITY: f64 = 1.0;
pub const FORWARD_SHIFT: f64 = 0.0;

// Detection filtering
pub const CONFIDENCE_THRESHOLD: f64 = 0.2;
pub const TRACKED_CLASS: &str = "person";

// Calibration file written by the calibration tool
pub const CALIBRATION_PATH: &str = "motor_locations.json";

// Zenoh topics
pub const TOPIC_DETECTIONS: &str = "sculpture/vision/detections"; // detector output
pub const TOPIC_MOTOR_STATE: &str = "sculpture/state/motors"; // per-tick commands
pub const TOPIC_HEALTH: &str = "sculpture/state/health"; // tracking status

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Resolved runtime configuration, validated once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SculptureConfig {
    pub num_motors: usize,
    pub frame_width: u32,
    pub stall_speed: i32,
    pub max_speed: i32,
    pub rise_speed: f64,
    pub flattening: f64,
    pub sensitivity: f64,
    pub forward_shift: f64,
    pub confidence_threshold: f64,
    pub tracked_class: String,
    /// Overrides the uniform stall/max window when set
    pub speed_bounds: Option<SpeedBounds>,
}

impl Default for SculptureConfig {
    fn default() -> Self {
        Self {
            num_motors: NUM_MOTORS,
            frame_width: FRAME_WIDTH,
            stall_speed: MOTOR_STALL_SPEED,
            max_speed: MOTOR_MAX_SPEED,
            rise_speed: RISE_SPEED,
            flattening: FLATTENING,
            sensitivity: SENSITIVITY,
            forward_shift: FORWARD_SHIFT,
            confidence_threshold: CONFIDENCE_THRESHOLD,
            tracked_class: TRACKED_CLASS.to_string(),
            speed_bounds: None,
        }
    }
}

impl SculptureConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn curve(&self) -> AngleCurve {
        AngleCurve::new(
            self.rise_speed,
            self.forward_shift,
            self.flattening,
            self.sensitivity,
        )
    }

    pub fn bounds(&self) -> SpeedBounds {
        self.speed_bounds.unwrap_or(SpeedBounds::Uniform(SpeedRange::new(
            self.stall_speed,
            self.max_speed,
        )))
    }

    /// Reject configurations that would divide by zero or make no physical sense
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.num_motors == 0 {
            return invalid("num_motors must be at least 1".into());
        }
        if self.frame_width == 0 {
            return invalid("frame_width must be non-zero".into());
        }
        if !(self.flattening.is_finite() && self.flattening > 0.0) {
            return invalid(format!("flattening must be positive, got {}", self.flattening));
        }
        if !(self.rise_speed.is_finite() && self.rise_speed > 0.0) {
            return invalid(format!(
                "rise_speed must be positive (angle domain would be empty), got {}",
                self.rise_speed
            ));
        }
        if !self.sensitivity.is_finite() || !self.forward_shift.is_finite() {
            return invalid("sensitivity and forward_shift must be finite".into());
        }
        if self.stall_speed >= self.max_speed {
            return invalid(format!(
                "stall_speed ({}) must be below max_speed ({})",
                self.stall_speed, self.max_speed
            ));
        }
        if self.max_speed.checked_sub(self.stall_speed).is_none() {
            return invalid(format!(
                "speed window {}..{} is wider than a motor speed can express",
                self.stall_speed, self.max_speed
            ));
        }
        match self.speed_bounds {
            Some(SpeedBounds::Uniform(range)) => check_window("uniform", range, true)?,
            Some(SpeedBounds::Asymmetric { positive, negative }) => {
                check_window("positive", positive, true)?;
                // The negative branch runs from `min` at zero towards `max` at the domain edge
                check_window("negative", negative, false)?;
            }
            None => {}
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return invalid(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            ));
        }
        if self.tracked_class.trim().is_empty() {
            return invalid("tracked_class must not be empty".into());
        }
        Ok(())
    }
}

/// A speed window must have non-zero width, fit in an i32 and point away from zero
/// the way its branch does: rising for angles above zero, falling below it.
fn check_window(name: &str, range: SpeedRange, rising: bool) -> Result<(), ConfigError> {
    let Some(width) = range.max.checked_sub(range.min) else {
        return Err(ConfigError::Invalid(format!(
            "{} speed window {}..{} overflows",
            name, range.min, range.max
        )));
    };
    if width == 0 {
        return Err(ConfigError::Invalid(format!(
            "{} speed window has zero width",
            name
        )));
    }
    if (width > 0) != rising {
        return Err(ConfigError::Invalid(format!(
            "{} speed window {}..{} is inverted",
            name, range.min, range.max
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        SculptureConfig::default().validate().unwrap();
    }

    #[test]
    fn test_zero_flattening_rejected() {
        let config = SculptureConfig {
            flattening: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_rise_speed_rejected() {
        let config = SculptureConfig {
            rise_speed: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_speed_limits_rejected() {
        let config = SculptureConfig {
            stall_speed: 200,
            max_speed: 20,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_confidence_out_of_range_rejected() {
        let config = SculptureConfig {
            confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_width_asymmetric_branch_rejected() {
        let config = SculptureConfig {
            speed_bounds: Some(SpeedBounds::Asymmetric {
                positive: SpeedRange::new(20, 200),
                negative: SpeedRange::new(50, 50),
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_uniform_window_rejected() {
        let config: SculptureConfig =
            serde_json::from_str(r#"{"speed_bounds":{"kind":"uniform","min":200,"max":20}}"#)
                .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_inverted_asymmetric_branches_rejected() {
        let falling_positive = SculptureConfig {
            speed_bounds: Some(SpeedBounds::Asymmetric {
                positive: SpeedRange::new(200, 20),
                negative: SpeedRange::new(-20, -200),
            }),
            ..Default::default()
        };
        assert!(falling_positive.validate().is_err());

        let rising_negative = SculptureConfig {
            speed_bounds: Some(SpeedBounds::Asymmetric {
                positive: SpeedRange::new(20, 200),
                negative: SpeedRange::new(10, 60),
            }),
            ..Default::default()
        };
        assert!(rising_negative.validate().is_err());
    }

    #[test]
    fn test_speed_window_overflow_rejected() {
        let config = SculptureConfig {
            stall_speed: -2_000_000_000,
            max_speed: 2_000_000_000,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = SculptureConfig {
            speed_bounds: Some(SpeedBounds::Asymmetric {
                positive: SpeedRange::new(20, 200),
                negative: SpeedRange::new(i32::MAX, i32::MIN),
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SculptureConfig =
            serde_json::from_str(r#"{"rise_speed": 10.0, "num_motors": 4}"#).unwrap();
        assert_eq!(config.rise_speed, 10.0);
        assert_eq!(config.num_motors, 4);
        assert_eq!(config.stall_speed, MOTOR_STALL_SPEED);
        assert_eq!(
            config.bounds(),
            SpeedBounds::Uniform(SpeedRange::new(MOTOR_STALL_SPEED, MOTOR_MAX_SPEED))
        );
    }

    #[test]
    fn test_asymmetric_bounds_from_json() {
        let config: SculptureConfig = serde_json::from_str(
            r#"{"speed_bounds": {"kind": "asymmetric",
                "positive": {"min": 20, "max": 200},
                "negative": {"min": -20, "max": -120}}}"#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.bounds().select(-1.0), SpeedRange::new(-20, -120));
    }
}
