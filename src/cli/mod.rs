//! Command-line interface module.

mod args;
pub mod common;
pub mod deploy;
pub mod domain;
pub mod generate;
pub mod preview;
pub mod setup;

pub use args::{Cli, Commands};
