pub mod geo;
pub mod logging;
pub mod table;
pub mod time;
