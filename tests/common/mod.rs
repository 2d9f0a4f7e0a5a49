//! Shared fixtures for integration tests
//!
//! - `fixtures`: payload encoders, program builders and model directories
//! - `tempfile_helpers`: temp files and directories with error context

#![allow(dead_code)]

mod fixtures;
mod tempfile_helpers;

pub use fixtures::*;
pub use serial_test::serial;
pub use tempfile_helpers::*;
