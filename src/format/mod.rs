//! Formatting helpers shared by value display and logging.

pub mod hex;
