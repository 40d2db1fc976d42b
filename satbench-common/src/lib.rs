//! Benchmark execution and verification core for comparing SAT solver builds

pub mod config;
#[macro_use]
pub mod macros;
pub mod output;
pub mod error;
pub mod input;
pub mod literal;
pub mod assignment;
pub mod cnf;
pub mod files;
pub mod timedrun;
pub mod batch;
pub mod results;
pub mod benchmark;
pub mod aggregate;
pub mod verify;
pub mod campaign;
