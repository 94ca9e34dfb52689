//! Per-test transcript
//!
//! Every command sent and every output read during a test goes to
//! `<run dir>/<test>.txt`. With `--verbose` the same lines go to stdout.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::common::Result;

pub struct Transcript {
    file: Option<File>,
    path: Option<PathBuf>,
    echo: bool,
}

impl Transcript {
    /// Append to a transcript file, creating parent directories
    pub fn create(path: &Path, echo: bool) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Some(file),
            path: Some(path.to_path_buf()),
            echo,
        })
    }

    /// A transcript that only echoes (or discards)
    pub fn console(echo: bool) -> Self {
        Self {
            file: None,
            path: None,
            echo,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if self.echo {
            println!("{}", text);
        }
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = writeln!(file, "{}", text) {
                tracing::warn!("Failed to write transcript: {}", e);
                self.file = None;
            }
        }
    }
}
