//! CLI module for promptbake
//!
//! Handles command-line argument parsing and configuration management.

pub mod args;
pub mod config;

pub use args::{Args, Commands, HistoryCommand, Verbosity};
pub use config::Config;
