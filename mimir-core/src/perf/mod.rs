//! Thread placement utilities for the hot-path roster.

pub mod cpu;

pub use cpu::{num_cores, optimize_hot_thread, pin_to_core, set_realtime_priority};
