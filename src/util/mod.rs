//! Utility modules

pub mod cancel;
pub mod time;
