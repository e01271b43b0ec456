//! gearbox CLI library
//!
//! Exposes the CLI entry point so it can be bundled by other binaries.

mod cli;

pub use cli::run;
