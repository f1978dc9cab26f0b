pub type UserId = String;

/// Altitude value meaning "unknown" in the dataset.
pub const ALTITUDE_UNKNOWN: i32 = -777;

pub const FEET_TO_METERS: f64 = 0.3048;
