// Motor control module for the kinetic sculpture
//
// Provides:
// - Response curves (target distance -> angle -> speed)
// - The motor array updated once per tick
// - Text command protocol and the serial link to the motor controller

pub mod curve;
pub mod protocol;
mod sculpture;

pub use curve::{angle_to_speed, AngleCurve, SpeedBounds, SpeedRange};
pub use protocol::{decode_frame, encode_frame, CommandSink, SerialLink, TransportError};
pub use sculpture::{Motor, MotorArray};
