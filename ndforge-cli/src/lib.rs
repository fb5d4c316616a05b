//! CLI interface for ndforge
//!
//! This crate provides the command-line interface for ndforge,
//! including argument parsing and help text.

pub mod args;

pub use args::{Cli, Commands, SendOptions};
