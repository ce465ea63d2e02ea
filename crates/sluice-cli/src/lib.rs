//! Sluice CLI library.
//!
//! This library provides the core functionality for the `sluice` command-line
//! interface, including configuration management, argument parsing, and
//! output formatting.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;

pub use cli::{Cli, Command, ModeArg};
pub use config::Config;
pub use error::{CliError, Result};
pub use output::Formatter;
