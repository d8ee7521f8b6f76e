//! Core types and constants for the deformation pipeline

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
