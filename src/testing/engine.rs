//! Test case execution against a live rig
//!
//! The engine owns the rig session for the length of a run. For each case it
//! sends the program (optionally once per port), captures variables, tracks
//! ACL and router interface counters, drives traffic through the [`Wire`],
//! and turns what it saw into a [`Verdict`].
//!
//! Errors that leave the session in an unknown state are returned as
//! `Err` and end the run (see [`Error::is_fatal`]). Everything the case
//! itself got wrong is a `Verdict`.

use std::sync::Arc;
use std::time::Duration;

use crate::common::config::TrafficConfig;
use crate::common::{squash_whitespace, Error, Result};
use crate::literal;
use crate::rig::{DeviceType, RigShell};
use crate::traffic::summary::render_tap;
use crate::traffic::{Captured, Wire};

use super::case::{LoopCounter, PacketAction, TestCase};
use super::compare::output_contains;
use super::scrape;
use super::transcript::Transcript;
use super::vars::{self, Vars};

/// Outcome of a case that ran to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Failed,
    AclCounterMismatch,
    RifCounterMismatch,
}

impl Verdict {
    /// Status text recorded in the run report
    pub fn status(self) -> &'static str {
        match self {
            Verdict::Passed => "Passed",
            Verdict::Failed => "Failed",
            Verdict::AclCounterMismatch => "Failed in Acl Counter check",
            Verdict::RifCounterMismatch => "Failed in RIF Counter check",
        }
    }
}

/// Traffic timing used by the engine
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub sniff_timeout: Duration,
    pub inject_settle: Duration,
    pub counter_settle: Duration,
}

impl From<&TrafficConfig> for EngineSettings {
    fn from(config: &TrafficConfig) -> Self {
        Self {
            sniff_timeout: config.sniff_timeout(),
            inject_settle: config.inject_settle(),
            counter_settle: config.counter_settle(),
        }
    }
}

/// What `$counter` expands to on each pass
enum PortCursor {
    None,
    /// Current front-panel port, advanced with `port_get_next`
    Port(String),
    /// SAI port object ids, one per pass
    Sai(Vec<String>),
}

/// Counter ids created by the program and their readings
#[derive(Default)]
struct Counters {
    acl_ids: Vec<String>,
    rif_ids: Vec<String>,
    acl_base: Vec<u64>,
    rif_base: Vec<u64>,
}

pub struct Engine {
    shell: RigShell,
    wire: Arc<dyn Wire>,
    device: DeviceType,
    settings: EngineSettings,
    vars: Vars,
}

impl Engine {
    pub fn new(
        shell: RigShell,
        wire: Arc<dyn Wire>,
        device: DeviceType,
        settings: EngineSettings,
    ) -> Self {
        Self {
            shell,
            wire,
            device,
            settings,
            vars: Vars::new(),
        }
    }

    /// Variables captured so far in this run
    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    /// Give the session back (to close it)
    pub fn into_shell(self) -> RigShell {
        self.shell
    }

    /// Send one command, logging it and its output to the transcript
    ///
    /// The returned text still starts with the terminal echo; the
    /// transcript gets the command once.
    async fn cmd(&mut self, command: &str, t: &mut Transcript) -> Result<String> {
        t.line(command);
        let output = self.shell.cmd(command).await?;
        let reply = drop_echo(&output);
        if !reply.trim().is_empty() {
            t.line(reply.trim_end());
        }
        Ok(output)
    }

    /// Navigate to a CLI context from the top (`home`, then each level)
    async fn enter(&mut self, path: &[&str], t: &mut Transcript) -> Result<()> {
        self.cmd("home", t).await?;
        for level in path {
            self.cmd(level, t).await?;
        }
        Ok(())
    }

    /// Fail the run on an `Invalid` reply after navigating home
    async fn reject_invalid(&mut self, command: &str, output: &str, t: &mut Transcript) -> Result<()> {
        if output.contains("Invalid") {
            t.line(format!("invalid input {}", output));
            self.shell.cmd("home").await?;
            return Err(Error::InvalidInput {
                command: command.to_string(),
                output: output.to_string(),
            });
        }
        Ok(())
    }

    /// Run one test case
    pub async fn run_case(&mut self, case: &TestCase, t: &mut Transcript) -> Result<Verdict> {
        if let Some(secs) = case.params.sleep_time {
            t.line(format!("Received sleep time of {} seconds", secs));
            tokio::time::sleep(Duration::from_secs(secs)).await;
        }

        let (passes, mut cursor) = self.loop_plan(case, t).await?;
        let mut counters = Counters::default();
        let mut mismatches = 0u32;
        let mut last_output = String::new();

        for pass in 0..passes {
            let substitution = match &cursor {
                PortCursor::None => None,
                PortCursor::Port(port) => Some(port.clone()),
                PortCursor::Sai(ports) => ports.get(pass as usize).cloned(),
            };

            for line in case.commands() {
                let line = match &substitution {
                    Some(value) => line.replace("$counter", value),
                    None => line.to_string(),
                };
                let (command, capture) = vars::split_capture(&line);

                let raw = self.cmd(command, t).await?;
                if raw.contains("ERROR") {
                    last_output = raw;
                    break;
                }

                let output = drop_echo(&raw);
                if let Some(name) = capture {
                    self.vars.capture(name, &output);
                }
                self.reject_invalid(command, &output, t).await?;

                self.track_counters(case, command, &output, &mut counters);
                last_output = output;
            }

            if !case.params.acl_counters.is_empty() {
                self.enter(&["sai", "acl"], t).await?;
                counters.acl_base = self.read_acl(&counters.acl_ids, t).await?;
            }
            if !case.params.rif_counters.is_empty() {
                self.enter(&["sai", "routerinterface"], t).await?;
                counters.rif_base = self
                    .read_rif(&counters.rif_ids, case.params.packet_action, t)
                    .await?
                    .into_iter()
                    .map(|(_, value)| value)
                    .collect();
            }

            if case.has_traffic() {
                if let Some(verdict) = self.run_traffic(case, &counters, t).await? {
                    self.flush(case, t).await;
                    return Ok(verdict);
                }
            } else {
                mismatches += self.check_expected(case, &last_output, t)?;
            }

            if let PortCursor::Port(port) = &cursor {
                let next = self.next_port(port, t).await?;
                cursor = PortCursor::Port(next);
            }
        }

        self.flush(case, t).await;
        Ok(if mismatches == 0 {
            Verdict::Passed
        } else {
            Verdict::Failed
        })
    }

    /// Number of passes and the `$counter` source
    async fn loop_plan(&mut self, case: &TestCase, t: &mut Transcript) -> Result<(u32, PortCursor)> {
        match case.params.counter {
            None => Ok((1, PortCursor::None)),
            Some(LoopCounter::Count(n)) => Ok((n, PortCursor::None)),
            Some(LoopCounter::MaxPorts) => {
                let max = self.max_ports(t).await?;
                let first = self.port_query("port_get_first", t).await?;
                Ok((self.device.usable_ports(max), PortCursor::Port(first)))
            }
            Some(LoopCounter::SaiPorts) => {
                let max = self.max_ports(t).await?;
                self.enter(&["sai", "switch"], t).await?;
                let output = self
                    .cmd(
                        &format!(
                            "sai_get_switch_attribute 9288674231451648 SAI_SWITCH_ATTR_PORT_LIST {}",
                            max
                        ),
                        t,
                    )
                    .await?;
                let ports = scrape::last_tokens(&output, max as usize);
                Ok((self.device.usable_ports(max), PortCursor::Sai(ports)))
            }
        }
    }

    async fn port_query(&mut self, command: &str, t: &mut Transcript) -> Result<String> {
        self.enter(&["xps", "port"], t).await?;
        let output = self.cmd(command, t).await?;
        scrape::value_after_eq(&output).ok_or_else(|| Error::unexpected_output(command, &output))
    }

    async fn max_ports(&mut self, t: &mut Transcript) -> Result<u32> {
        let value = self.port_query("port_get_max_num 0", t).await?;
        value
            .parse()
            .map_err(|_| Error::unexpected_output("port_get_max_num 0", &value))
    }

    async fn next_port(&mut self, port: &str, t: &mut Transcript) -> Result<String> {
        self.port_query(&format!("port_get_next {}", port), t).await
    }

    /// Remember counter object ids created by tracked commands
    fn track_counters(&self, case: &TestCase, command: &str, output: &str, counters: &mut Counters) {
        let names_counter = |names: &[String]| names.iter().any(|n| command.contains(n.as_str()));

        if command.contains("sai_create_acl_counter") && names_counter(&case.params.acl_counters) {
            counters
                .acl_ids
                .extend(scrape::digit_tokens(output).map(str::to_string));
        }
        if command.contains("sai_create_router_interface")
            && names_counter(&case.params.rif_counters)
        {
            counters.rif_ids.extend(scrape::rif_ids(output).map(str::to_string));
        }
    }

    /// Read the packet count of each ACL counter (context `sai/acl`)
    async fn read_acl(&mut self, ids: &[String], t: &mut Transcript) -> Result<Vec<u64>> {
        let mut values = Vec::with_capacity(ids.len());
        for id in ids {
            let command = format!("sai_get_acl_counter_attribute {} SAI_ACL_COUNTER_ATTR_PACKETS 1", id);
            let output = self.cmd(&command, t).await?;
            self.reject_invalid(&command, &output, t).await?;
            let value = scrape::acl_packet_count(&output, id)
                .ok_or_else(|| Error::unexpected_output("ACL packet count", &output))?;
            values.push(value);
        }
        Ok(values)
    }

    /// Read one statistic per router interface (context `sai/routerinterface`)
    ///
    /// Statistic numbers start at 1 (5 when dropping) and advance by 2 per id.
    async fn read_rif(
        &mut self,
        ids: &[String],
        action: PacketAction,
        t: &mut Transcript,
    ) -> Result<Vec<(u32, u64)>> {
        let mut stat = rif_first_stat(action);
        let mut values = Vec::with_capacity(ids.len());
        for id in ids {
            let command = format!("sai_get_router_interface_stats {} {}", id, stat);
            let output = self.cmd(&command, t).await?;
            self.reject_invalid(&command, &output, t).await?;
            let value = scrape::rif_stat(&output, id)
                .ok_or_else(|| Error::unexpected_output("router interface statistic", &output))?;
            values.push((stat, value));
            stat += 2;
        }
        Ok(values)
    }

    /// Inject the case's packet and judge the result
    ///
    /// Returns `None` when the case names no ingress port.
    async fn run_traffic(
        &mut self,
        case: &TestCase,
        counters: &Counters,
        t: &mut Transcript,
    ) -> Result<Option<Verdict>> {
        let (Some(packet), Some(ingress_tap)) = (&case.packet, &case.params.ingress_tap) else {
            return Ok(None);
        };
        let frame = packet.build()?;
        let action = case.params.packet_action;
        let packet_count = case.params.packet_count;

        for port in case.egress_ports() {
            self.cmd(&format!("VendorEnablePort {}", port), t).await?;
        }

        let Some(ingress) = case.ingress_ports().first().map(|p| p.to_string()) else {
            return Ok(None);
        };
        self.cmd(&format!("VendorEnablePort {}", ingress), t).await?;

        let taps: Vec<String> = case
            .params
            .egress_taps
            .iter()
            .filter(|tap| !tap.trim().is_empty())
            .cloned()
            .collect();

        let sniffer = if taps.is_empty() {
            None
        } else {
            let wire = Arc::clone(&self.wire);
            let ifaces = taps.clone();
            let listener = tokio::task::spawn_blocking(move || wire.listen(&ifaces))
                .await
                .map_err(|e| Error::Internal(format!("listener task failed: {}", e)))??;
            let window = self.settings.sniff_timeout;
            Some(tokio::task::spawn_blocking(move || listener.collect(window)))
        };

        let rx_base = if action == PacketAction::Trap {
            let stats = self.cpu_statistics(t).await?;
            Some(
                scrape::rx_counter(&stats)
                    .ok_or_else(|| Error::unexpected_output("CPU RX counter", &stats))?,
            )
        } else {
            None
        };

        let wire = Arc::clone(&self.wire);
        let tap = ingress_tap.clone();
        tokio::task::spawn_blocking(move || wire.inject(&tap, &frame, packet_count))
            .await
            .map_err(|e| Error::Internal(format!("injection task failed: {}", e)))??;
        t.line(format!("Sent {} packet(s) on {}", packet_count, ingress_tap));

        tokio::time::sleep(self.settings.inject_settle).await;

        let captured = match sniffer {
            Some(handle) => handle
                .await
                .map_err(|e| Error::Internal(format!("sniffer task failed: {}", e)))??,
            None => Captured::new(),
        };
        for (iface, frames) in &captured {
            t.line(format!("{}: {} frame(s) captured", iface, frames.len()));
        }

        if !case.params.acl_counters.is_empty() {
            self.enter(&["sai", "acl"], t).await?;
            tokio::time::sleep(self.settings.counter_settle).await;
            let now = self.read_acl(&counters.acl_ids, t).await?;
            for (after, before) in now.iter().zip(&counters.acl_base) {
                if after.saturating_sub(*before) != u64::from(packet_count) {
                    t.line(format!("ACL counter moved {} -> {}", before, after));
                    return Ok(Some(Verdict::AclCounterMismatch));
                }
            }
            t.line("Acl Counters incremented as expected !");
            self.cmd("home", t).await?;
        }

        if !case.params.rif_counters.is_empty() {
            self.enter(&["sai", "routerinterface"], t).await?;
            tokio::time::sleep(self.settings.counter_settle).await;
            let now = self.read_rif(&counters.rif_ids, action, t).await?;
            for ((stat, after), before) in now.iter().zip(&counters.rif_base) {
                if action == PacketAction::Drop && *stat == 3 {
                    continue;
                }
                if after.saturating_sub(*before) < u64::from(packet_count) {
                    t.line(format!("RIF counter moved {} -> {}", before, after));
                    return Ok(Some(Verdict::RifCounterMismatch));
                }
            }
            t.line("RIF Counters incremented as expected !");
            self.cmd("home", t).await?;
        }

        let verdict = match action {
            PacketAction::Drop => {
                let command = format!("VendorGetMacTbl {} 0 \"/\"*6", ingress);
                let output = self.cmd(&command, t).await?;
                let macs = scrape::mac_count(&output)
                    .ok_or_else(|| Error::unexpected_output("learned MAC count", &output))?;
                if macs == 0 {
                    t.line(format!("No macs on port {}", ingress));
                    Verdict::Passed
                } else {
                    t.line("Mac counters matched in DROP case implies drop is not happening");
                    Verdict::Failed
                }
            }
            PacketAction::Forward | PacketAction::ForwardAndMirror => {
                if self.check_captured(case, &taps, &captured, t)? == 0 {
                    Verdict::Passed
                } else {
                    Verdict::Failed
                }
            }
            PacketAction::Trap => {
                let expected = rx_base.unwrap_or_default() + u64::from(packet_count);
                let stats = squash_whitespace(&self.cpu_statistics(t).await?);
                if stats.contains(&format!("RxCounters={}", expected)) {
                    Verdict::Passed
                } else {
                    t.line("CPU counters not Updated");
                    Verdict::Failed
                }
            }
            PacketAction::None => return Ok(None),
        };
        Ok(Some(verdict))
    }

    /// Packet driver statistics; the first read after entering is stale
    async fn cpu_statistics(&mut self, t: &mut Transcript) -> Result<String> {
        self.enter(&["xps", "packetdrv"], t).await?;
        self.cmd("packet_driver_get_pkt_rx_tx_statistics 0", t).await?;
        self.cmd("packet_driver_get_pkt_rx_tx_statistics 0", t).await
    }

    /// Compare captured frames with `expect1..expectN`; returns the mismatch count
    fn check_captured(
        &self,
        case: &TestCase,
        taps: &[String],
        captured: &Captured,
        t: &mut Transcript,
    ) -> Result<u32> {
        let mut mismatches = 0;
        for i in 1..=case.params.count {
            let expected = case.expected(i)?;
            let frames = taps
                .get(i as usize - 1)
                .and_then(|tap| captured.get(tap).map(|f| (tap, f)))
                .filter(|(_, frames)| !frames.is_empty());

            match frames {
                Some((tap, frames)) => {
                    let seen = render_tap(tap, frames);
                    t.line(&seen);
                    if output_contains(&seen, expected) {
                        t.line(format!("expected data {} matched", i));
                    } else {
                        t.line(format!("expected data {} mismatched", i));
                        mismatches += 1;
                    }
                }
                None => {
                    t.line(format!("No packets are captured by the sniffer for expected data {}", i));
                    mismatches += 1;
                }
            }
        }
        Ok(mismatches)
    }

    /// Compare the last command output with `expect1..expectN`
    fn check_expected(&self, case: &TestCase, output: &str, t: &mut Transcript) -> Result<u32> {
        let mut mismatches = 0;
        for i in 1..=case.params.count {
            let raw = case.expected(i)?;
            let expected = if vars::has_refs(raw) {
                literal::eval_or_text(&self.vars.substitute(raw)?)
            } else {
                raw.to_string()
            };

            if output_contains(output, &expected) {
                t.line(format!("expected data {} matched", i));
            } else {
                t.line(format!("expected data {} mismatched: {}", i, expected));
                mismatches += 1;
            }
        }
        Ok(mismatches)
    }

    /// Run the teardown script; problems are logged, never returned
    pub async fn flush(&mut self, case: &TestCase, t: &mut Transcript) {
        for command in case.flush_commands() {
            let output = match self.cmd(command, t).await {
                Ok(output) => output.replace(command, ""),
                Err(e) => {
                    tracing::warn!("Flush command '{}' failed: {}", command, e);
                    continue;
                }
            };
            for marker in ["invalid", "error"] {
                if output.contains(marker) {
                    t.line(format!("flush: {} in output of '{}'", marker, command));
                    tracing::warn!("Flush command '{}' reported {}: {}", command, marker, output.trim());
                    if let Err(e) = self.shell.cmd("home").await {
                        tracing::warn!("Failed to navigate home after flush: {}", e);
                    }
                }
            }
        }
    }
}

fn rif_first_stat(action: PacketAction) -> u32 {
    if action == PacketAction::Drop {
        5
    } else {
        1
    }
}

/// Remove the terminal echo (first line) from command output
fn drop_echo(raw: &str) -> String {
    match raw.split_once('\n') {
        Some((_, rest)) => rest.to_string(),
        None => String::new(),
    }
}
