//! Interactive rig session with prompt polling
//!
//! A command is written as one line, then output is collected in fixed
//! poll slices until the prompt regex matches or the retry budget runs out.
//! The text before the first prompt match is the command's output,
//! including the terminal echo of the command itself.

use std::time::Duration;

use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::process::{Child, ChildStdin};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::common::config::RigConfig;
use crate::common::{Error, Result};

use super::transport::Transport;

/// Delay between writing a command and starting to poll
const SEND_DELAY: Duration = Duration::from_millis(20);

/// Read chunk size for the session output pumps
const READ_CHUNK: usize = 4096;

/// Prompt detection settings for a session
#[derive(Debug, Clone)]
pub struct PromptSettings {
    pub prompt: String,
    pub retries: u32,
    pub poll: Duration,
    pub settle: Duration,
}

impl From<&RigConfig> for PromptSettings {
    fn from(config: &RigConfig) -> Self {
        Self {
            prompt: config.prompt.clone(),
            retries: config.prompt_retries,
            poll: Duration::from_millis(config.poll_ms),
            settle: Duration::from_secs(config.settle_secs),
        }
    }
}

/// A live session to the device under test
pub struct RigShell {
    /// Session subprocess (ssh or local stand-in)
    child: Child,
    /// Buffered writer for session stdin
    writer: BufWriter<ChildStdin>,
    /// Output chunks from stdout and stderr pumps
    output_rx: mpsc::UnboundedReceiver<String>,
    /// Compiled prompt pattern
    prompt: Regex,
    settings: PromptSettings,
    target: String,
}

impl RigShell {
    /// Start a session and wait for the first prompt
    pub async fn open(transport: &Transport, settings: PromptSettings) -> Result<Self> {
        let target = transport.describe();
        tracing::info!("Connecting to {}", target);

        let mut child = transport
            .command()?
            .spawn()
            .map_err(|e| Error::SessionStartFailed(format!("Failed to start {}: {}", target, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::SessionStartFailed("Failed to get session stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::SessionStartFailed("Failed to get session stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::SessionStartFailed("Failed to get session stderr".to_string()))?;

        let (output_tx, output_rx) = mpsc::unbounded_channel();
        spawn_pump(stdout, output_tx.clone());
        spawn_pump(stderr, output_tx);

        let prompt = compile_prompt(&settings.prompt)?;

        let mut shell = Self {
            child,
            writer: BufWriter::new(stdin),
            output_rx,
            prompt,
            settings,
            target,
        };

        shell.wait_for_prompt("<login>").await.map_err(|e| match e {
            Error::SessionClosed { output } => {
                Error::SessionStartFailed(format!("Login failed: {}", output.trim()))
            }
            other => other,
        })?;
        tracing::info!("Connected to {}", shell.target);

        Ok(shell)
    }

    /// Current prompt pattern
    pub fn prompt(&self) -> &str {
        &self.settings.prompt
    }

    /// Change the prompt pattern (e.g. after launching the vendor CLI)
    pub fn set_prompt(&mut self, pattern: &str) -> Result<()> {
        self.prompt = compile_prompt(pattern)?;
        self.settings.prompt = pattern.to_string();
        Ok(())
    }

    /// Send a command and return its output
    pub async fn cmd(&mut self, command: &str) -> Result<String> {
        self.send(command, false).await
    }

    /// Send a command that needs time to come up before prompting
    pub async fn cmd_settled(&mut self, command: &str) -> Result<String> {
        self.send(command, true).await
    }

    async fn send(&mut self, command: &str, settle: bool) -> Result<String> {
        // drop whatever trailed the previous prompt
        self.drain();

        tracing::debug!("rig >>> {}", command);
        self.writer.write_all(command.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        tokio::time::sleep(SEND_DELAY).await;

        if command.contains("exit") {
            return Ok(self.drain());
        }

        if settle {
            tokio::time::sleep(self.settings.settle).await;
        }

        let output = self.wait_for_prompt(command).await?;
        tracing::debug!("rig <<< {}", output);
        Ok(output)
    }

    /// Take everything received so far without waiting
    fn drain(&mut self) -> String {
        let mut buffer = String::new();
        while let Ok(chunk) = self.output_rx.try_recv() {
            buffer.push_str(&chunk);
        }
        buffer
    }

    async fn wait_for_prompt(&mut self, command: &str) -> Result<String> {
        let mut buffer = String::new();

        // one initial slice plus the retry budget
        for _ in 0..=self.settings.retries {
            let deadline = Instant::now() + self.settings.poll;
            loop {
                if let Some(m) = self.prompt.find(&buffer) {
                    return Ok(buffer[..m.start()].to_string());
                }
                match tokio::time::timeout_at(deadline, self.output_rx.recv()).await {
                    Ok(Some(chunk)) => buffer.push_str(&chunk),
                    Ok(None) => return Err(Error::SessionClosed { output: buffer }),
                    Err(_) => break,
                }
            }
        }

        tracing::warn!(
            "Failed to detect prompt {} for {} times",
            self.settings.prompt,
            self.settings.retries
        );
        Err(Error::prompt_timeout(
            &self.settings.prompt,
            self.settings.retries,
            command,
            &buffer,
        ))
    }

    /// End the session; failures are logged, not returned
    pub async fn close(mut self) {
        if let Err(e) = self.send("exit", false).await {
            tracing::warn!("Failed to send exit to {}: {}", self.target, e);
        }
        drop(self.writer);

        match tokio::time::timeout(Duration::from_secs(2), self.child.wait()).await {
            Ok(Ok(status)) => tracing::info!("Connection to {} closed ({})", self.target, status),
            Ok(Err(e)) => tracing::warn!("Failed to reap session process: {}", e),
            Err(_) => {
                if let Err(e) = self.child.kill().await {
                    tracing::warn!("Failed to kill session process: {}", e);
                }
            }
        }
    }
}

fn compile_prompt(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Config(format!("Invalid prompt '{}': {}", pattern, e)))
}

/// Forward a session stream into the output channel until EOF
fn spawn_pump<R>(mut reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                    if tx.send(chunk).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("Session stream closed: {}", e);
                    break;
                }
            }
        }
    });
}
