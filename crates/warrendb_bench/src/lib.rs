//! Benchmark support for WarrenDB.

pub mod utils;
