//! Report output
//!
//! - [`text`]: console report on stdout
//! - [`json`]: machine-readable report written to a file

pub mod json;
pub mod text;
