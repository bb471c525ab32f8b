pub mod calibration;
pub mod config;
pub mod detection;
pub mod messages;
pub mod motor;
pub mod runtime;
