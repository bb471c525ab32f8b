// Persisted motor positions
//
// The calibration tool records each motor's x position (processing frame pixels) as a JSON
// array in wiring order, e.g. `[0, 40, 80, 120, 160, 200, 240, 280]`.

use std::path::Path;

use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("Failed to access calibration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed calibration data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Calibration has {found} motor positions, expected {expected}")]
    WrongLength { expected: usize, found: usize },
}

/// Load motor positions, refusing data that does not match the motor count
pub fn load(path: impl AsRef<Path>, expected_len: usize) -> Result<Vec<i32>, CalibrationError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let positions: Vec<i32> = serde_json::from_str(&text)?;
    check_len(&positions, expected_len)?;

    info!("Loaded {} motor positions from {}", positions.len(), path.display());
    Ok(positions)
}

/// Write motor positions in the format `load` expects
pub fn save(path: impl AsRef<Path>, positions: &[i32]) -> Result<(), CalibrationError> {
    let text = serde_json::to_string_pretty(positions)?;
    std::fs::write(path, text)?;
    Ok(())
}

pub fn check_len(positions: &[i32], expected_len: usize) -> Result<(), CalibrationError> {
    if positions.len() != expected_len {
        return Err(CalibrationError::WrongLength {
            expected: expected_len,
            found: positions.len(),
        });
    }
    Ok(())
}

/// Convert x positions picked in the (larger) viewing window into processing frame pixels
pub fn scale_to_processing(viewing_xs: &[i32], viewing_width: u32, processing_width: u32) -> Vec<i32> {
    viewing_xs
        .iter()
        .map(|&x| (x as f64 / viewing_width as f64 * processing_width as f64) as i32)
        .collect()
}
