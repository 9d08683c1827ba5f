//! Logging setup and small shared helpers.

pub mod logger;

pub use logger::init_logger;
