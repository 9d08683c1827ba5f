//! Shared scaffolding for the Mimir binaries.

pub mod common;
