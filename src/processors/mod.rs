pub mod altitude;
pub mod distance;
pub mod proximity;
pub mod validity;
pub mod yearly;
