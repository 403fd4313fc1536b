//! # parley-cli
//!
//! Command-line interface for Parley.
//!
//! ## Commands
//!
//! - `parley start`: run the web server and the Telegram bot
//! - `parley chat`: interactive chat in the terminal
//! - `parley status`: query a running server
//! - `parley config`: show the resolved configuration
//! - `parley doctor`: validate the configuration

pub mod commands;

pub use commands::Cli;
