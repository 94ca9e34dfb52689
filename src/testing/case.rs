//! Test case files
//!
//! Defines the data structures for deserializing YAML test cases.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::common::{Error, Result};
use crate::traffic::PacketSpec;

/// A complete test case loaded from a YAML file
#[derive(Deserialize, Debug, Clone)]
pub struct TestCase {
    /// Name of the test case (defaults to the file stem)
    #[serde(default)]
    pub name: String,
    /// Optional description of what the test verifies
    pub description: Option<String>,
    /// Vendor CLI command lines, one per line
    #[serde(default)]
    pub program: String,
    /// Teardown command lines, one per line
    #[serde(default)]
    pub flush: String,
    /// Ports, taps, verdict selection and loop control
    #[serde(default)]
    pub params: CaseParams,
    /// Ingress packet; present only for traffic cases
    pub packet: Option<PacketSpec>,
    /// Expected output literals keyed `expect1`, `expect2`, ...
    #[serde(default)]
    pub expected: BTreeMap<String, String>,
}

/// Test case parameters
#[derive(Deserialize, Debug, Clone)]
pub struct CaseParams {
    #[serde(default)]
    pub ingress_ports: Vec<String>,
    #[serde(default)]
    pub egress_ports: Vec<String>,
    #[serde(default)]
    pub packet_action: PacketAction,
    /// Tap wired to the ingress port
    pub ingress_tap: Option<String>,
    /// Taps wired to the egress ports, in `expectN` order
    #[serde(default)]
    pub egress_taps: Vec<String>,
    /// Number of expected strings to check
    #[serde(default)]
    pub count: u32,
    /// Copies of the packet to inject
    #[serde(default = "default_packet_count")]
    pub packet_count: u32,
    /// Seconds to wait before the case starts
    pub sleep_time: Option<u64>,
    /// Loop selector
    pub counter: Option<LoopCounter>,
    /// ACL counter names whose ids are tracked
    #[serde(default)]
    pub acl_counters: Vec<String>,
    /// Router interface names whose ids are tracked
    #[serde(default)]
    pub rif_counters: Vec<String>,
}

impl Default for CaseParams {
    fn default() -> Self {
        Self {
            ingress_ports: Vec::new(),
            egress_ports: Vec::new(),
            packet_action: PacketAction::None,
            ingress_tap: None,
            egress_taps: Vec::new(),
            count: 0,
            packet_count: default_packet_count(),
            sleep_time: None,
            counter: None,
            acl_counters: Vec::new(),
            rif_counters: Vec::new(),
        }
    }
}

fn default_packet_count() -> u32 {
    1
}

/// What the switch is expected to do with the injected packet
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PacketAction {
    #[default]
    #[serde(rename = "", alias = "NONE")]
    None,
    #[serde(rename = "FORWARD")]
    Forward,
    #[serde(rename = "FORWARD AND MIRROR")]
    ForwardAndMirror,
    #[serde(rename = "DROP")]
    Drop,
    #[serde(rename = "TRAP")]
    Trap,
}

/// How many times the program runs, and what `$counter` expands to
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "CounterRepr")]
pub enum LoopCounter {
    /// Once per front-panel port, `$counter` is the port number
    MaxPorts,
    /// Once per SAI port object, `$counter` is the object id
    SaiPorts,
    /// A fixed number of passes
    Count(u32),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CounterRepr {
    Count(u32),
    Named(String),
}

impl TryFrom<CounterRepr> for LoopCounter {
    type Error = String;

    fn try_from(repr: CounterRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            CounterRepr::Count(n) => Ok(LoopCounter::Count(n)),
            CounterRepr::Named(name) => match name.trim() {
                "max_ports" => Ok(LoopCounter::MaxPorts),
                "sai_ports" => Ok(LoopCounter::SaiPorts),
                other => other
                    .parse()
                    .map(LoopCounter::Count)
                    .map_err(|_| format!("unknown counter '{}'", other)),
            },
        }
    }
}

impl TestCase {
    /// Load a test case from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::test_case_load(path, e))?;
        let mut case: TestCase =
            serde_yaml::from_str(&content).map_err(|e| Error::test_case_load(path, e))?;

        if case.name.trim().is_empty() {
            case.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        if case.packet.is_some() && case.params.ingress_tap.is_none() {
            return Err(Error::test_case_load(path, "packet given without params.ingress_tap"));
        }
        Ok(case)
    }

    /// Program lines with blanks removed
    pub fn commands(&self) -> Vec<&str> {
        non_blank_lines(&self.program)
    }

    /// Teardown lines with blanks removed
    pub fn flush_commands(&self) -> Vec<&str> {
        non_blank_lines(&self.flush)
    }

    /// The `expect{index}` literal
    pub fn expected(&self, index: u32) -> Result<&str> {
        let key = format!("expect{}", index);
        self.expected
            .get(&key)
            .map(String::as_str)
            .ok_or_else(|| Error::MissingExpectation {
                name: self.name.clone(),
                key,
            })
    }

    pub fn ingress_ports(&self) -> Vec<&str> {
        non_empty(&self.params.ingress_ports)
    }

    pub fn egress_ports(&self) -> Vec<&str> {
        non_empty(&self.params.egress_ports)
    }

    /// Whether the case injects a packet
    pub fn has_traffic(&self) -> bool {
        self.packet.is_some()
    }
}

fn non_blank_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .collect()
}

fn non_empty(items: &[String]) -> Vec<&str> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect()
}
