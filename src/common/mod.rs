//! Common utilities shared by the runner, the rig driver and the vendor shell

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};

/// Remove ANSI escape sequences from terminal output
pub fn strip_ansi(text: &str) -> std::borrow::Cow<'_, str> {
    use std::sync::OnceLock;

    static ANSI: OnceLock<regex::Regex> = OnceLock::new();
    let re = ANSI.get_or_init(|| {
        regex::Regex::new(r"(\x9B|\x1B\[)[0-?]*[ -/]*[@-~]").expect("static regex is valid")
    });
    re.replace_all(text, "")
}

/// Remove every whitespace character
pub fn squash_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[96mrc:\x1b[0m 0"), "rc: 0");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn test_squash_whitespace() {
        assert_eq!(squash_whitespace(" a b\r\n\tc "), "abc");
    }
}
