// Library crate exposing modules for integration tests and benchmarks

pub mod config;
pub mod error;
pub mod model;
pub mod report;
pub mod repository;
pub mod util;
