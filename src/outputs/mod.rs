//! Presentation of confirmed events.
//!
//! # Submodules
//!
//! - [`console`]: event panels and location tables for the terminal
//! - [`json`]: a JSON report file for downstream tools

pub mod console;
pub mod json;
