//! Congestion and CO₂ analyses.
//!
//! The metric modules (`capacity`, `congestion`, `emissions`, `ranking`,
//! `quadrant`) are pure functions over typed records; `analyzer` wires them to
//! the input tables and output files.

pub mod analyzer;
pub mod capacity;
pub mod congestion;
pub mod emissions;
pub mod quadrant;
pub mod ranking;
pub mod types;
pub mod utility;
