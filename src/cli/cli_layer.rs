// CLI layer - argument parsing and console output.

#[path = "args.rs"]
pub mod args;

#[path = "summary.rs"]
pub mod summary;

pub use args::Cli;
