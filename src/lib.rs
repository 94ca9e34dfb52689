//! ESAL regression harness
//!
//! Runs YAML test cases against the vendor switch layer on a rig and
//! exposes the vendor library through a small FFI shell.

pub mod cli;
pub mod commands;
pub mod common;
pub mod literal;
pub mod rig;
pub mod testing;
pub mod traffic;
pub mod vendor;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use rig::{PromptSettings, RigShell, Transport};
pub use testing::{Engine, EngineSettings, RunReport, TestCase};
