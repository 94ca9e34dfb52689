//! Captured variables
//!
//! A program line `<command> > name` stores the command's output as `name`.
//! Later expected strings refer to it as `$name`.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::common::{Error, Result};

fn var_ref() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$(\w+)").expect("static regex is valid"))
}

fn marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*?)\s*>\s*(\w+)\s*$").expect("static regex is valid"))
}

/// Split `<command> > name` into the command and the variable name
pub fn split_capture(line: &str) -> (&str, Option<&str>) {
    match marker().captures(line) {
        Some(caps) => match (caps.get(1), caps.get(2)) {
            (Some(cmd), Some(name)) => (cmd.as_str(), Some(name.as_str())),
            _ => (line, None),
        },
        None => (line, None),
    }
}

/// Variables captured during a run
#[derive(Debug, Default)]
pub struct Vars {
    values: HashMap<String, String>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store command output under `name`
    pub fn capture(&mut self, name: &str, output: &str) {
        let value = output.trim_matches(|c| c == '\n' || c == '\r' || c == ' ');
        tracing::debug!("${} = {:?}", name, value);
        self.values.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Replace every `$name` in `text`
    pub fn substitute(&self, text: &str) -> Result<String> {
        let mut missing = None;
        let replaced = var_ref().replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            match self.values.get(name) {
                Some(value) => value.clone(),
                None => {
                    missing.get_or_insert_with(|| name.to_string());
                    caps[0].to_string()
                }
            }
        });

        match missing {
            Some(name) => Err(Error::UndefinedVariable(name)),
            None => Ok(replaced.into_owned()),
        }
    }
}

/// Whether `text` references any variable
pub fn has_refs(text: &str) -> bool {
    var_ref().is_match(text)
}
