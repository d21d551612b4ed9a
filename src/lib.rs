//! Playtime counter for user-designated applications. A small daemon samples
//! the process list on a fixed interval, turns appearances and disappearances
//! of registered executables into sessions, and accumulates session durations
//! into a crash-safe totals file.
//!

pub mod cli;
pub mod daemon;
pub mod utils;
