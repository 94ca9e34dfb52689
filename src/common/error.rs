//! Error types for the ESAL regression harness
//!
//! Messages name the command, file or interface involved so a failed
//! overnight run can be diagnosed from its log alone.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Rig Session Errors ===
    #[error("Failed to start rig session: {0}")]
    SessionStartFailed(String),

    #[error("Rig session closed unexpectedly. Last output: {output}")]
    SessionClosed { output: String },

    #[error("Failed to detect prompt {prompt} for {retries} times after '{command}'")]
    PromptTimeout {
        prompt: String,
        retries: u32,
        command: String,
        output: String,
    },

    #[error("Invalid input for '{command}': {output}")]
    InvalidInput { command: String, output: String },

    #[error("Could not parse '{what}' from rig output: {output}")]
    UnexpectedOutput { what: String, output: String },

    // === Test Case Errors ===
    #[error("Failed to load test case '{path}': {reason}")]
    TestCaseLoad { path: String, reason: String },

    #[error("Test case '{name}' has no expected data for '{key}'")]
    MissingExpectation { name: String, key: String },

    #[error("Captured variable '${0}' is not defined")]
    UndefinedVariable(String),

    #[error("Literal error: {0}")]
    Literal(String),

    // === Traffic Errors ===
    #[error("Packet capture error on '{iface}': {message}")]
    Capture { iface: String, message: String },

    #[error("Packet injection error on '{iface}': {message}")]
    Inject { iface: String, message: String },

    #[error("Invalid packet description: {0}")]
    InvalidPacket(String),

    // === Vendor Library Errors ===
    #[error("Failed to load vendor library '{path}': {message}")]
    LibraryLoad { path: String, message: String },

    #[error("Function \"{0}\" is unavailable")]
    UnknownFunction(String),

    #[error("Bad arguments for {function}: {reason}")]
    BadArguments { function: String, reason: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a prompt timeout error
    pub fn prompt_timeout(prompt: &str, retries: u32, command: &str, output: &str) -> Self {
        Self::PromptTimeout {
            prompt: prompt.to_string(),
            retries,
            command: command.to_string(),
            output: output.to_string(),
        }
    }

    /// Create an unexpected output error
    pub fn unexpected_output(what: &str, output: &str) -> Self {
        Self::UnexpectedOutput {
            what: what.to_string(),
            output: output.to_string(),
        }
    }

    /// Create a test case load error
    pub fn test_case_load<S: ToString>(path: &std::path::Path, reason: S) -> Self {
        Self::TestCaseLoad {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a capture error
    pub fn capture<S: ToString>(iface: &str, message: S) -> Self {
        Self::Capture {
            iface: iface.to_string(),
            message: message.to_string(),
        }
    }

    /// Create an injection error
    pub fn inject<S: ToString>(iface: &str, message: S) -> Self {
        Self::Inject {
            iface: iface.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a bad arguments error
    pub fn bad_arguments(function: &str, reason: &str) -> Self {
        Self::BadArguments {
            function: function.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error leaves the rig session in an unknown state.
    ///
    /// Such errors end the run instead of just failing the current case.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::SessionClosed { .. }
                | Error::PromptTimeout { .. }
                | Error::InvalidInput { .. }
                | Error::Io(_)
        )
    }

    /// Short status text recorded in the run report
    pub fn status_text(&self) -> String {
        match self {
            Error::InvalidInput { .. } => "Aborted: invalid input".to_string(),
            Error::PromptTimeout { .. } => "Aborted: prompt timeout".to_string(),
            Error::SessionClosed { .. } => "Aborted: session closed".to_string(),
            other => format!("Failed: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let invalid = Error::InvalidInput {
            command: "VendorFoo".to_string(),
            output: "Invalid command".to_string(),
        };
        assert!(invalid.is_fatal());
        assert_eq!(invalid.status_text(), "Aborted: invalid input");

        let missing = Error::UndefinedVariable("vlan".to_string());
        assert!(!missing.is_fatal());
        assert!(missing.status_text().starts_with("Failed:"));
        assert!(missing.status_text().contains("$vlan"));
    }
}
