//! Shared helpers for the commands and the pipeline.

pub mod date;
pub mod exec;
pub mod mime;
pub mod path;
