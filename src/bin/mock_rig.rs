//! Mock rig binary for integration testing
//!
//! Plays the part of an SSH session to a switch: a `$ ` shell prompt until
//! `./esalApp` is started, then the vendor CLI with a `CLI: ` prompt. Every
//! input line is echoed like a terminal would. Vendor calls from the
//! signature table answer `rc:0` and keep a little VLAN and STP state.
//!
//! Counters move by a fixed step every time their CLI context is entered,
//! so a before/after reading around an injection sees one step:
//! - `MOCK_RIG_ACL_STEP`: ACL packet counters (context `acl`)
//! - `MOCK_RIG_RIF_STEP`: router interface statistics (context `routerinterface`)
//! - `MOCK_RIG_RX_STEP`: CPU RX counter (context `packetdrv`)
//!
//! `MOCK_RIG_PORTS` sets the reported port count (default 4, first port 28)
//! and `MOCK_RIG_MACS` the learned MAC count. `fail` and `fdb_flush` answer
//! with the two error shapes the CLI uses.

use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, Write};

use esal_harness::literal::{self, Value};
use esal_harness::vendor::{lookup, CType, Signature};

const SHELL_PROMPT: &str = "$ ";
const APP_PROMPT: &str = "CLI: ";
const FIRST_PORT: u64 = 28;
const ACL_OID_BASE: u64 = 9_007_199_254_740_993;
const RIF_OID_BASE: u64 = 1_688_849_860_263_937;
const PORT_OID_BASE: u64 = 281_474_976_710_657;

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Default)]
struct MockState {
    in_app: bool,
    vlans: BTreeMap<i64, Vec<i64>>,
    stp: HashMap<i64, i64>,
    acl_ids: Vec<u64>,
    rif_ids: Vec<u64>,
    acl_packets: u64,
    rif_packets: u64,
    rx_packets: u64,
    acl_step: u64,
    rif_step: u64,
    rx_step: u64,
    ports: u64,
    macs: u64,
}

fn main() {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut writer = stdout.lock();

    let mut state = MockState {
        acl_step: env_u64("MOCK_RIG_ACL_STEP", 1),
        rif_step: env_u64("MOCK_RIG_RIF_STEP", 1),
        rx_step: env_u64("MOCK_RIG_RX_STEP", 1),
        ports: env_u64("MOCK_RIG_PORTS", 4),
        macs: env_u64("MOCK_RIG_MACS", 0),
        ..MockState::default()
    };

    write!(writer, "Welcome to the mock rig\n{}", SHELL_PROMPT).ok();
    writer.flush().ok();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim_end_matches('\r');

        // terminal echo
        writeln!(writer, "{}", line).ok();

        let command = line.trim();
        if command == "exit" {
            writer.flush().ok();
            break;
        }

        let response = if state.in_app {
            state.app_command(command)
        } else {
            state.shell_command(command)
        };
        if !response.is_empty() {
            writeln!(writer, "{}", response).ok();
        }
        let prompt = if state.in_app { APP_PROMPT } else { SHELL_PROMPT };
        write!(writer, "{}", prompt).ok();
        writer.flush().ok();
    }
}

impl MockState {
    fn shell_command(&mut self, command: &str) -> String {
        if command.is_empty() || command.starts_with("cd ") {
            String::new()
        } else if command == "./esalApp" || command.starts_with("./dist/xpSaiApp") {
            self.in_app = true;
            "ESAL application started".to_string()
        } else {
            format!("sh: {}: not found", command)
        }
    }

    fn app_command(&mut self, command: &str) -> String {
        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        match name {
            "" | "home" | "sai" | "xps" | "port" | "switch" => String::new(),
            "acl" => {
                self.acl_packets += self.acl_step;
                String::new()
            }
            "routerinterface" => {
                self.rif_packets += self.rif_step;
                String::new()
            }
            "packetdrv" => {
                self.rx_packets += self.rx_step;
                String::new()
            }
            "port_get_max_num" => format!("maxPorts = {}", self.ports),
            "port_get_first" => format!("port = {}", FIRST_PORT),
            "port_get_next" => {
                let current: u64 = args.first().and_then(|a| a.parse().ok()).unwrap_or(FIRST_PORT);
                format!("port = {}", current + 1)
            }
            "sai_get_switch_attribute" => {
                let count: u64 = args.last().and_then(|a| a.parse().ok()).unwrap_or(0);
                let oids: Vec<String> = (0..count).map(|i| (PORT_OID_BASE + i).to_string()).collect();
                format!("count = {} : {}", count, oids.join(" "))
            }
            "sai_create_acl_counter" => {
                let id = ACL_OID_BASE + self.acl_ids.len() as u64;
                self.acl_ids.push(id);
                format!("aclCounterId = {}", id)
            }
            "sai_get_acl_counter_attribute" => format!("packets = {}", self.acl_packets),
            "sai_create_router_interface" => {
                let id = RIF_OID_BASE + self.rif_ids.len() as u64;
                self.rif_ids.push(id);
                format!("rifId = {}", id)
            }
            "sai_get_router_interface_stats" => format!("value = {}", self.rif_packets),
            "packet_driver_get_pkt_rx_tx_statistics" => {
                format!("Rx Counters = {} , Tx Counters = 0", self.rx_packets)
            }
            "fail" => "ERROR: command failed".to_string(),
            "fdb_flush" => "error: no entries to flush".to_string(),
            _ => match lookup(name) {
                Some(sig) => self.vendor_call(sig, rest),
                None => format!("Invalid command {}", name),
            },
        }
    }

    fn vendor_call(&mut self, sig: &Signature, rest: &str) -> String {
        let mut args = match literal::eval_args(rest) {
            Ok(args) if args.len() == sig.params.len() => args,
            _ => return format!("Invalid arguments for {}", sig.name),
        };
        let int = |v: &Value| v.as_int().unwrap_or_default();

        let rc = match sig.name {
            "VendorCreateVlan" => {
                self.vlans.entry(int(&args[0])).or_default();
                0
            }
            "VendorDeleteVlan" => {
                self.vlans.remove(&int(&args[0]));
                0
            }
            "VendorAddPortsToVlan" => {
                let count = int(&args[1]).max(0) as usize;
                let ports: Vec<i64> = args[2]
                    .as_list()
                    .unwrap_or_default()
                    .iter()
                    .take(count)
                    .map(int)
                    .collect();
                match self.vlans.get_mut(&int(&args[0])) {
                    Some(members) => {
                        members.extend(ports);
                        0
                    }
                    None => -1,
                }
            }
            "VendorGetPortsInVlan" => match self.vlans.get(&int(&args[0])) {
                Some(members) => {
                    let slots = args[2].as_list().map(|l| l.len()).unwrap_or_default();
                    let mut ports: Vec<Value> = members.iter().map(|p| Value::Int(*p)).collect();
                    ports.resize(slots.max(ports.len()), Value::Int(0));
                    args[1] = Value::Int(members.len() as i64);
                    args[2] = Value::List(ports);
                    0
                }
                None => -1,
            },
            "VendorSetPortStpState" => {
                self.stp.insert(int(&args[0]), int(&args[1]));
                0
            }
            "VendorGetPortStpState" => {
                args[1] = Value::Int(self.stp.get(&int(&args[0])).copied().unwrap_or(0));
                0
            }
            "VendorGetMacTbl" => {
                return format!(
                    "{}\nrc:0 numMacs:{} macs:[]",
                    call_header(sig, &args),
                    self.macs
                );
            }
            _ => 0,
        };

        let mut fields: Vec<(&str, String)> = sig
            .params
            .iter()
            .zip(&args)
            .filter(|(param, _)| param.ty != CType::CharBuf && param.name != "rc")
            .map(|(param, value)| (param.name, value.to_string()))
            .collect();
        fields.sort();
        let fields: Vec<String> = fields.iter().map(|(k, v)| format!("{}:{}", k, v)).collect();
        format!("{}\nrc:{} {}", call_header(sig, &args), rc, fields.join(" "))
    }
}

/// `int VendorCreateVlan(uint16_t) 75`
fn call_header(sig: &Signature, args: &[Value]) -> String {
    let types: Vec<&str> = sig.params.iter().map(|p| p.ty.c_name()).collect();
    let first = args.first().map(|a| a.to_string()).unwrap_or_default();
    format!("{} {}({}) {}", sig.ret.c_name(), sig.name, types.join(","), first)
}
