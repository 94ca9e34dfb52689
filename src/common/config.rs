//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Rig session settings
    #[serde(default)]
    pub rig: RigConfig,

    /// Packet injection and capture timing
    #[serde(default)]
    pub traffic: TrafficConfig,

    /// File locations
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Remote shell settings
#[derive(Debug, Deserialize, Clone)]
pub struct RigConfig {
    /// Prompt regex used before the vendor application is running
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Prompt regex of the vendor application CLI
    #[serde(default = "default_app_prompt")]
    pub app_prompt: String,

    /// Number of poll slices to wait for a prompt
    #[serde(default = "default_prompt_retries")]
    pub prompt_retries: u32,

    /// Length of one poll slice in milliseconds
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,

    /// Wait after commands that need to settle (application launch)
    #[serde(default = "default_settle")]
    pub settle_secs: u64,

    /// SSH client binary
    #[serde(default = "default_ssh")]
    pub ssh: String,

    /// SSH connect timeout
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            app_prompt: default_app_prompt(),
            prompt_retries: default_prompt_retries(),
            poll_ms: default_poll_ms(),
            settle_secs: default_settle(),
            ssh: default_ssh(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_prompt() -> String {
    "[#>$]".to_string()
}
fn default_app_prompt() -> String {
    "CLI:".to_string()
}
fn default_prompt_retries() -> u32 {
    5000
}
fn default_poll_ms() -> u64 {
    1000
}
fn default_settle() -> u64 {
    20
}
fn default_ssh() -> String {
    "ssh".to_string()
}
fn default_connect_timeout() -> u64 {
    30
}

/// Traffic timing in seconds
#[derive(Debug, Deserialize, Clone)]
pub struct TrafficConfig {
    /// How long the sniffer listens on the egress taps
    #[serde(default = "default_sniff_timeout")]
    pub sniff_timeout_secs: u64,

    /// Wait after injecting before joining the sniffer
    #[serde(default = "default_inject_settle")]
    pub inject_settle_secs: u64,

    /// Wait before re-reading ACL/RIF counters
    #[serde(default = "default_counter_settle")]
    pub counter_settle_secs: u64,

    /// Capture snapshot length
    #[serde(default = "default_snaplen")]
    pub snaplen: i32,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            sniff_timeout_secs: default_sniff_timeout(),
            inject_settle_secs: default_inject_settle(),
            counter_settle_secs: default_counter_settle(),
            snaplen: default_snaplen(),
        }
    }
}

fn default_sniff_timeout() -> u64 {
    30
}
fn default_inject_settle() -> u64 {
    4
}
fn default_counter_settle() -> u64 {
    3
}
fn default_snaplen() -> i32 {
    65535
}

/// File locations
#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Directory holding test-case YAML files and suites.toml
    #[serde(default = "default_cases_dir")]
    pub cases_dir: PathBuf,

    /// Root directory for run results
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Vendor shared library for the interactive shell
    #[serde(default = "default_vendor_lib")]
    pub vendor_lib: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cases_dir: default_cases_dir(),
            results_dir: default_results_dir(),
            vendor_lib: default_vendor_lib(),
        }
    }
}

fn default_cases_dir() -> PathBuf {
    PathBuf::from("testcases")
}
fn default_results_dir() -> PathBuf {
    PathBuf::from("TestResults")
}
fn default_vendor_lib() -> PathBuf {
    PathBuf::from("libesal.so")
}

impl TrafficConfig {
    pub fn sniff_timeout(&self) -> Duration {
        Duration::from_secs(self.sniff_timeout_secs)
    }

    pub fn inject_settle(&self) -> Duration {
        Duration::from_secs(self.inject_settle_secs)
    }

    pub fn counter_settle(&self) -> Duration {
        Duration::from_secs(self.counter_settle_secs)
    }
}

impl Config {
    /// Load configuration from an explicit path or the default config file
    ///
    /// Returns default configuration if no file exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => config_path().filter(|p| p.exists()),
        };

        if let Some(path) = path {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                super::Error::FileRead {
                    path: path.display().to_string(),
                    error: e.to_string(),
                }
            })?;
            return Self::from_toml(&content);
        }
        Ok(Self::default())
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}
