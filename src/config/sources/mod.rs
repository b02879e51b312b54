//! Configuration sources.

pub mod environment;
pub mod workspace_file;
