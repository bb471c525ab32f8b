// Motor array for the sculpture
//
// Holds one `Motor` per physical actuator in wiring order and recomputes every motor's
// angle and speed from the tracked target position once per tick.

use tracing::{debug, warn};

use super::curve::{angle_to_speed, AngleCurve, SpeedBounds};
use crate::messages::MotorCommand;

/// One actuator of the sculpture
#[derive(Debug, Clone, PartialEq)]
pub struct Motor {
    position: i32,
    angle: f64,
    speed: i32,
}

impl Motor {
    /// Create a motor at its calibrated x position (processing frame pixels)
    pub fn new(position: i32) -> Self {
        Self {
            position,
            angle: 0.0,
            speed: 0,
        }
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn speed(&self) -> i32 {
        self.speed
    }

    pub fn command(&self) -> MotorCommand {
        MotorCommand::new(self.speed, self.angle)
    }
}

/// Fixed-size ordered set of motors sharing one response curve
pub struct MotorArray {
    motors: Vec<Motor>,
    curve: AngleCurve,
    bounds: SpeedBounds,
    frame_width: f64,
}

impl MotorArray {
    /// Build the array from calibrated positions, in wiring order
    pub fn new(positions: &[i32], curve: AngleCurve, bounds: SpeedBounds, frame_width: u32) -> Self {
        Self {
            motors: positions.iter().copied().map(Motor::new).collect(),
            curve,
            bounds,
            frame_width: frame_width as f64,
        }
    }

    pub fn len(&self) -> usize {
        self.motors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.motors.is_empty()
    }

    pub fn motors(&self) -> &[Motor] {
        &self.motors
    }

    pub fn rise_speed(&self) -> f64 {
        self.curve.rise_speed
    }

    pub fn curve(&self) -> &AngleCurve {
        &self.curve
    }

    /// Move one motor to a new calibrated position; its angle and speed are kept until the
    /// next update
    pub fn recalibrate(&mut self, index: usize, position: i32) -> Option<()> {
        let motor = self.motors.get_mut(index)?;
        debug!("Motor {} recalibrated: {} -> {}", index, motor.position, position);
        motor.position = position;
        Some(())
    }

    /// Recompute every motor for a target at `avg_x` (pixels) moving with `diff_x`
    pub fn update(&mut self, avg_x: f64, diff_x: f64) {
        let domain = self.curve.domain();

        for (i, motor) in self.motors.iter_mut().enumerate() {
            let distance = (avg_x - motor.position as f64) / self.frame_width;
            let angle = self.curve.angle(distance, diff_x);
            let speed = angle_to_speed(angle, domain, &self.bounds);

            if !self.bounds.select(angle).contains(speed) {
                warn!(
                    "Motor {} speed {} outside its window (angle {:.3}), sending unclamped",
                    i, speed, angle
                );
            }

            motor.angle = angle;
            motor.speed = speed;
        }
    }

    /// Current (speed, angle) of every motor, in wiring order
    pub fn commands(&self) -> Vec<MotorCommand> {
        self.motors.iter().map(Motor::command).collect()
    }

    pub fn speeds(&self) -> Vec<i32> {
        self.motors.iter().map(Motor::speed).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::curve::SpeedRange;

    const POSITIONS: [i32; 8] = [0, 40, 80, 120, 160, 200, 240, 280];
    const STALL: i32 = 20;
    const MAX: i32 = 200;

    fn scenario_array() -> MotorArray {
        MotorArray::new(
            &POSITIONS,
            AngleCurve::new(10.0, 0.0, 0.15, 1.0),
            SpeedBounds::Uniform(SpeedRange::new(STALL, MAX)),
            300,
        )
    }

    #[test]
    fn test_new_preserves_wiring_order() {
        let array = scenario_array();
        assert_eq!(array.len(), 8);
        let positions: Vec<i32> = array.motors().iter().map(Motor::position).collect();
        assert_eq!(positions, POSITIONS);
        assert!(array.motors().iter().all(|m| m.speed() == 0 && m.angle() == 0.0));
    }

    #[test]
    fn test_scenario_target_at_center() {
        let mut array = scenario_array();
        array.update(150.0, 0.0);

        let near = &array.motors()[4]; // position 160
        let far = &array.motors()[0]; // position 0
        println!(
            "near: angle={:.4} speed={}, far: angle={:.4} speed={}",
            near.angle(),
            near.speed(),
            far.angle(),
            far.speed()
        );

        // Near motor: x = -0.0333/0.15 + 1, small reach, high in the domain
        assert!((near.angle() - 14.05).abs() < 0.01);
        assert_eq!(near.speed(), 180);
        assert!(SpeedRange::new(STALL, MAX).contains(near.speed()));

        // Far motor reaches less and ends up on the other side of the domain
        assert!(far.angle() < 0.0);
        assert!((far.angle() - (-10.31)).abs() < 0.01);
        assert_eq!(far.speed(), -98);
        assert_ne!(near.speed(), far.speed());
    }

    #[test]
    fn test_symmetric_motors_match() {
        let mut array = scenario_array();
        array.update(140.0, 0.0);
        // Motors at 120 and 160 are both 20px from the target
        assert_eq!(array.motors()[3].angle(), array.motors()[4].angle());
        assert_eq!(array.motors()[3].speed(), array.motors()[4].speed());
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut array = scenario_array();
        array.update(97.0, 0.02);
        let first = array.commands();
        array.update(97.0, 0.02);
        assert_eq!(first, array.commands());
    }

    #[test]
    fn test_speed_is_image_of_angle() {
        let mut array = scenario_array();
        array.update(233.0, -0.1);
        let domain = array.curve().domain();
        let bounds = SpeedBounds::Uniform(SpeedRange::new(STALL, MAX));
        for motor in array.motors() {
            assert_eq!(motor.speed(), angle_to_speed(motor.angle(), domain, &bounds));
        }
    }

    #[test]
    fn test_recalibrate() {
        let mut array = scenario_array();
        assert_eq!(array.recalibrate(2, 95), Some(()));
        assert_eq!(array.motors()[2].position(), 95);
        assert_eq!(array.recalibrate(8, 10), None);
        assert_eq!(array.len(), 8);
    }
}
