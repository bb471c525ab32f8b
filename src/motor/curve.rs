// Response curves for the sculpture motors
// Converts target distance into a steering angle, and steering angle into an actuator speed.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_8};

use serde::{Deserialize, Serialize};

/// Re-centering offset applied to the raw arctangent
const CENTER_OFFSET: f64 = FRAC_PI_8;

/// Width of the re-centered half range (3π/8), rescaled onto π/2
const CENTERED_SPAN: f64 = 3.0 * FRAC_PI_8;

/// Half width of the angle domain before the rise speed multiply
pub const HALF_DOMAIN: f64 = FRAC_PI_2;

/// Shape parameters of the angle transform
///
/// `flattening` must be non-zero; `SculptureConfig::validate` enforces it before a curve
/// ever reaches the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleCurve {
    pub rise_speed: f64,
    pub forward_shift: f64,
    pub flattening: f64,
    pub sensitivity: f64,
}

impl AngleCurve {
    pub fn new(rise_speed: f64, forward_shift: f64, flattening: f64, sensitivity: f64) -> Self {
        Self {
            rise_speed,
            forward_shift,
            flattening,
            sensitivity,
        }
    }

    /// Steering angle for a motor whose target sits `distance` away (normalized, signed)
    ///
    /// Only the sign of `velocity` is used: the forward shift leans toward the direction of
    /// travel, and a stationary target counts as moving forward.
    pub fn angle(&self, distance: f64, velocity: f64) -> f64 {
        let shift = if velocity < 0.0 {
            -self.forward_shift
        } else {
            self.forward_shift
        };

        // Always <= 0: the motor reaches toward the target on either side
        let reach = -(distance + shift).abs();
        let x = reach / self.flattening + self.sensitivity;

        let centered = x.atan() + CENTER_OFFSET;
        let normalized = centered / CENTERED_SPAN * HALF_DOMAIN;

        normalized * self.rise_speed
    }

    /// Interval every output of `angle` lies in, as (exclusive lower, inclusive upper)
    pub fn bounds(&self) -> (f64, f64) {
        let lower = (-FRAC_PI_2 + CENTER_OFFSET) / CENTERED_SPAN * HALF_DOMAIN;
        let upper = (self.sensitivity.atan() + CENTER_OFFSET) / CENTERED_SPAN * HALF_DOMAIN;
        (lower * self.rise_speed, upper * self.rise_speed)
    }

    /// Symmetric angle domain `(-D, D)` scaled by the rise speed
    pub fn domain(&self) -> (f64, f64) {
        (-HALF_DOMAIN * self.rise_speed, HALF_DOMAIN * self.rise_speed)
    }
}

/// Speed window of one branch of the speed mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedRange {
    pub min: i32,
    pub max: i32,
}

impl SpeedRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, speed: i32) -> bool {
        let (lo, hi) = if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        };
        (lo..=hi).contains(&speed)
    }
}

/// Which speed window the mapping uses for a given angle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpeedBounds {
    /// Same window for both signs (stall speed floor, hardware ceiling)
    Uniform(SpeedRange),
    /// `positive` when the angle is > 0, `negative` otherwise
    Asymmetric {
        positive: SpeedRange,
        negative: SpeedRange,
    },
}

impl SpeedBounds {
    pub fn select(&self, angle: f64) -> SpeedRange {
        match *self {
            SpeedBounds::Uniform(range) => range,
            SpeedBounds::Asymmetric { positive, negative } => {
                if angle > 0.0 {
                    positive
                } else {
                    negative
                }
            }
        }
    }
}

/// Map an angle onto an integer actuator speed
///
/// The mapping is linear and not clamped: an angle outside `domain` yields a speed outside
/// the selected window.
pub fn angle_to_speed(angle: f64, domain: (f64, f64), bounds: &SpeedBounds) -> i32 {
    let range = bounds.select(angle);

    let domain_size = (domain.1 - domain.0) / 2.0;
    let ratio = angle / domain_size;
    let speed_range = (range.max as f64 - range.min as f64).abs();

    (range.min as f64 + ratio * speed_range) as i32
}
