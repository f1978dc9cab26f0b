pub mod common;
pub mod document;
pub mod geolife;
pub mod relational;
pub mod report;
