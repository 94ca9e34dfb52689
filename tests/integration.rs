//! End-to-end integration tests for the regression harness
//!
//! These tests drive the engine against the `mock_rig` binary:
//! 1. Opening a session through `Transport::Local` and launching the app
//! 2. Running YAML test cases written to a temporary directory
//! 3. Feeding traffic through a scripted in-memory wire
//! 4. Checking verdicts, transcripts and the run report

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use esal_harness::rig::{launch_app, DeviceType, PromptSettings, RigShell, Transport};
use esal_harness::testing::suite::{case_path, discover};
use esal_harness::testing::{
    run_selection, Engine, EngineSettings, RunReport, Selection, Suites, TestCase, Transcript,
    Verdict,
};
use esal_harness::traffic::{Captured, Listener, PacketSpec, Wire};
use esal_harness::{Error, Result};

/// Wire that replays canned frames and records injections
#[derive(Default)]
struct ScriptedWire {
    replies: Captured,
    injected: Mutex<Vec<(String, usize, u32)>>,
}

impl ScriptedWire {
    fn replying(replies: &[(&str, Vec<Vec<u8>>)]) -> Self {
        Self {
            replies: replies
                .iter()
                .map(|(iface, frames)| (iface.to_string(), frames.clone()))
                .collect(),
            injected: Mutex::new(Vec::new()),
        }
    }

    fn injected(&self) -> Vec<(String, usize, u32)> {
        self.injected.lock().unwrap().clone()
    }
}

struct CannedListener(Captured);

impl Listener for CannedListener {
    fn collect(self: Box<Self>, _window: Duration) -> Result<Captured> {
        Ok(self.0)
    }
}

impl Wire for ScriptedWire {
    fn listen(&self, ifaces: &[String]) -> Result<Box<dyn Listener>> {
        let frames: Captured = ifaces
            .iter()
            .filter_map(|iface| self.replies.get(iface).map(|f| (iface.clone(), f.clone())))
            .collect();
        Ok(Box::new(CannedListener(frames)))
    }

    fn inject(&self, iface: &str, frame: &[u8], count: u32) -> Result<()> {
        self.injected
            .lock()
            .unwrap()
            .push((iface.to_string(), frame.len(), count));
        Ok(())
    }
}

/// Untagged frame as it leaves an egress port
fn egress_frame() -> Vec<u8> {
    let spec: PacketSpec = serde_yaml::from_str(
        "src: '00:00:11:00:11:00'\n\
         dst: '00:00:11:00:11:23'\n\
         ipv4: {}\n",
    )
    .unwrap();
    spec.build().unwrap()
}

fn fast_prompt() -> PromptSettings {
    PromptSettings {
        prompt: "[#>$]".to_string(),
        retries: 50,
        poll: Duration::from_millis(100),
        settle: Duration::from_millis(0),
    }
}

fn fast_engine() -> EngineSettings {
    EngineSettings {
        sniff_timeout: Duration::from_millis(50),
        inject_settle: Duration::from_millis(0),
        counter_settle: Duration::from_millis(0),
    }
}

async fn open_rig(env: &[(&str, &str)]) -> RigShell {
    let transport = Transport::Local {
        program: PathBuf::from(env!("CARGO_BIN_EXE_mock_rig")),
        args: vec![],
        env: env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    };
    let mut shell = RigShell::open(&transport, fast_prompt())
        .await
        .expect("mock rig should start");
    let banner = launch_app(&mut shell, DeviceType::Ac3xfs, "/opt/xdk", "CLI:")
        .await
        .expect("app should launch");
    assert!(banner.contains("ESAL application started"));
    shell
}

async fn engine_with(env: &[(&str, &str)], wire: Arc<ScriptedWire>) -> Engine {
    let shell = open_rig(env).await;
    Engine::new(shell, wire, DeviceType::Ac3xfs, fast_engine())
}

fn write_case(dir: &Path, name: &str, yaml: &str) -> PathBuf {
    let path = dir.join(format!("{}.yaml", name));
    std::fs::write(&path, yaml).unwrap();
    path
}

async fn run_yaml(engine: &mut Engine, yaml: &str) -> Result<Verdict> {
    let dir = tempfile::tempdir().unwrap();
    let case = TestCase::load(&write_case(dir.path(), "case", yaml)).unwrap();
    engine.run_case(&case, &mut Transcript::console(false)).await
}

/// Run a case with a transcript file and return the verdict and the transcript
async fn run_logged(engine: &mut Engine, yaml: &str) -> (Verdict, String) {
    let dir = tempfile::tempdir().unwrap();
    let case = TestCase::load(&write_case(dir.path(), "case", yaml)).unwrap();
    let log = dir.path().join("case.txt");
    let mut transcript = Transcript::create(&log, false).unwrap();
    let verdict = engine.run_case(&case, &mut transcript).await.unwrap();
    drop(transcript);
    (verdict, std::fs::read_to_string(&log).unwrap())
}

const CREATE_VLAN: &str = r#"
description: VendorCreateVlan, VendorDeleteVlan, VendorGetPortsInVlan
program: |
  VendorCreateVlan 75
  VendorGetPortsInVlan 75 0 [0]*5
flush: |
  VendorDeleteVlan 75
params:
  count: 1
expected:
  expect1: 'intVendorGetPortsInVlan(uint16_t,uint16_t*,uint16_t[])75rc:0numPorts:0ports:[0,0,0,0,0]vlanId:75'
"#;

const FORWARD: &str = r#"
program: |
  VendorCreateVlan 75
  VendorAddPortsToVlan 75 2 [28,29]
params:
  ingress_ports: ['29']
  egress_ports: ['28']
  packet_action: FORWARD
  ingress_tap: tap1
  egress_taps: [tap0]
  count: 1
packet:
  src: '00:00:11:00:11:00'
  dst: '00:00:11:00:11:23'
  vlan: {id: 75}
  ipv4: {}
expected:
  expect1: >-
    'tap0':[<Ether  dst=00:00:11:00:11:23 src=00:00:11:00:11:00 type=IPv4
    |<IP  version=4 ihl=5 tos=0x0 len=20 id=1 flags= frag=0 ttl=64 proto=hopopt
    chksum=0x7ce7 src=127.0.0.1 dst=127.0.0.1
"#;

#[tokio::test]
async fn test_command_case_passes() {
    let mut engine = engine_with(&[], Arc::new(ScriptedWire::default())).await;
    assert_eq!(run_yaml(&mut engine, CREATE_VLAN).await.unwrap(), Verdict::Passed);

    // the flush removed the VLAN, so a second run starts clean
    assert_eq!(run_yaml(&mut engine, CREATE_VLAN).await.unwrap(), Verdict::Passed);
    engine.into_shell().close().await;
}

#[tokio::test]
async fn test_command_case_mismatch_fails() {
    let mut engine = engine_with(&[], Arc::new(ScriptedWire::default())).await;
    let yaml = r#"
program: |
  VendorCreateVlan 75
  VendorAddPortsToVlan 75 2 [28,29]
  VendorGetPortsInVlan 75 0 [0]*4
flush: VendorDeleteVlan 75
params:
  count: 2
expected:
  expect1: 'numPorts:2ports:[28,29,0,0]'
  expect2: 'numPorts:3'
"#;
    assert_eq!(run_yaml(&mut engine, yaml).await.unwrap(), Verdict::Failed);
    engine.into_shell().close().await;
}

#[tokio::test]
async fn test_captured_variable_in_expectation() {
    let mut engine = engine_with(&[], Arc::new(ScriptedWire::default())).await;
    let yaml = r#"
program: |
  VendorSetPortStpState 28 3
  VendorGetPortStpState 28 0 > stp
params:
  count: 1
expected:
  expect1: $stp
"#;
    assert_eq!(run_yaml(&mut engine, yaml).await.unwrap(), Verdict::Passed);
    let captured = engine.vars().get("stp").unwrap();
    assert!(captured.contains("stpState:3"), "captured: {captured}");
    assert!(!captured.contains('>'));
    engine.into_shell().close().await;
}

#[tokio::test]
async fn test_error_output_stops_program() {
    let mut engine = engine_with(&[], Arc::new(ScriptedWire::default())).await;
    let yaml = r#"
program: |
  fail
  VendorCreateVlan 75
params:
  count: 1
expected:
  expect1: 'ERROR:commandfailed'
"#;
    assert_eq!(run_yaml(&mut engine, yaml).await.unwrap(), Verdict::Passed);
    engine.into_shell().close().await;
}

#[tokio::test]
async fn test_invalid_input_is_fatal() {
    let mut engine = engine_with(&[], Arc::new(ScriptedWire::default())).await;
    let yaml = "program: no_such_command 1\nparams:\n  count: 0\n";
    let err = run_yaml(&mut engine, yaml).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput { .. }), "got {err:?}");
    assert!(err.is_fatal());
    engine.into_shell().close().await;
}

#[tokio::test]
async fn test_max_ports_loop_substitutes_each_port() {
    let mut engine = engine_with(&[("MOCK_RIG_PORTS", "3")], Arc::new(ScriptedWire::default())).await;
    let dir = tempfile::tempdir().unwrap();
    let case = TestCase::load(&write_case(
        dir.path(),
        "stp_all_ports",
        r#"
program: VendorGetPortStpState $counter 0
params:
  counter: max_ports
  count: 1
expected:
  expect1: rc:0
"#,
    ))
    .unwrap();

    let log = dir.path().join("stp_all_ports.txt");
    let mut transcript = Transcript::create(&log, false).unwrap();
    assert_eq!(engine.run_case(&case, &mut transcript).await.unwrap(), Verdict::Passed);
    drop(transcript);

    let text = std::fs::read_to_string(&log).unwrap();
    for port in 28..31 {
        assert!(text.contains(&format!("VendorGetPortStpState {} 0", port)), "{text}");
    }
    assert!(!text.contains("VendorGetPortStpState 31 0"));
    engine.into_shell().close().await;
}

#[tokio::test]
async fn test_sai_ports_loop_substitutes_each_object_id() {
    let mut engine = engine_with(&[("MOCK_RIG_PORTS", "3")], Arc::new(ScriptedWire::default())).await;
    let yaml = r#"
program: VendorEnablePort $counter
params:
  counter: sai_ports
  count: 1
expected:
  expect1: rc:0
"#;
    let (verdict, text) = run_logged(&mut engine, yaml).await;
    assert_eq!(verdict, Verdict::Passed);
    assert!(text.contains("SAI_SWITCH_ATTR_PORT_LIST 3"), "{text}");
    for oid in ["281474976710657", "281474976710658", "281474976710659"] {
        assert_eq!(text.matches(&format!("VendorEnablePort {}\n", oid)).count(), 1, "{text}");
    }
    assert!(!text.contains("$counter"));
    engine.into_shell().close().await;
}

#[tokio::test]
async fn test_integer_counter_repeats_program() {
    let mut engine = engine_with(&[], Arc::new(ScriptedWire::default())).await;
    let yaml = r#"
program: VendorCreateVlan 75
flush: VendorDeleteVlan 75
params:
  counter: 3
  count: 1
expected:
  expect1: rc:0vlanid:75
"#;
    let (verdict, text) = run_logged(&mut engine, yaml).await;
    assert_eq!(verdict, Verdict::Passed);
    // each command is logged once, the echo is not repeated
    assert_eq!(text.matches("VendorCreateVlan 75\n").count(), 3, "{text}");
    assert_eq!(text.matches("VendorDeleteVlan 75\n").count(), 1, "{text}");
    assert_eq!(text.matches("rc:0 vlanid:75").count(), 4, "{text}");
    engine.into_shell().close().await;
}

#[tokio::test]
async fn test_sleep_time_delays_case() {
    let mut engine = engine_with(&[], Arc::new(ScriptedWire::default())).await;
    let yaml = "program: VendorEnablePort 28\nparams:\n  sleep_time: 1\n";
    let started = Instant::now();
    let (verdict, text) = run_logged(&mut engine, yaml).await;
    assert_eq!(verdict, Verdict::Passed);
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert!(text.starts_with("Received sleep time of 1 seconds\n"), "{text}");
    engine.into_shell().close().await;
}

#[tokio::test]
async fn test_flush_errors_are_logged_and_run_continues() {
    let mut engine = engine_with(&[], Arc::new(ScriptedWire::default())).await;
    let yaml = r#"
program: VendorCreateVlan 75
flush: |
  fdb_flush
  VendorDeleteVlan 75
params:
  count: 1
expected:
  expect1: rc:0
"#;
    let (verdict, text) = run_logged(&mut engine, yaml).await;
    assert_eq!(verdict, Verdict::Passed);
    assert!(text.contains("flush: error in output of 'fdb_flush'"), "{text}");
    assert!(text.contains("VendorDeleteVlan 75"), "{text}");

    // the session is still usable and the VLAN was removed
    assert_eq!(run_yaml(&mut engine, CREATE_VLAN).await.unwrap(), Verdict::Passed);
    engine.into_shell().close().await;
}

#[tokio::test]
async fn test_forward_case_matches_capture() {
    let wire = Arc::new(ScriptedWire::replying(&[("tap0", vec![egress_frame()])]));
    let mut engine = engine_with(&[], wire.clone()).await;

    assert_eq!(run_yaml(&mut engine, FORWARD).await.unwrap(), Verdict::Passed);

    let injected = wire.injected();
    assert_eq!(injected.len(), 1);
    assert_eq!(injected[0].0, "tap1");
    assert_eq!(injected[0].2, 1);
    engine.into_shell().close().await;
}

#[tokio::test]
async fn test_forward_case_without_capture_fails() {
    let wire = Arc::new(ScriptedWire::default());
    let mut engine = engine_with(&[], wire).await;
    assert_eq!(run_yaml(&mut engine, FORWARD).await.unwrap(), Verdict::Failed);
    engine.into_shell().close().await;
}

fn action_case(action: &str, extra: &str) -> String {
    format!(
        r#"
program: |
  VendorCreateVlan 75
  VendorAddPortsToVlan 75 2 [28,29]
{extra}params:
  ingress_ports: ['28']
  egress_ports: ['29']
  packet_action: {action}
  ingress_tap: tap0
  egress_taps: [tap1]
  packet_count: 1
packet:
  src: '00:00:11:00:11:00'
  dst: '00:00:11:00:11:23'
  ipv4: {{}}
"#
    )
}

#[tokio::test]
async fn test_drop_case_checks_mac_table() {
    let yaml = action_case("DROP", "");

    let mut engine = engine_with(&[("MOCK_RIG_MACS", "0")], Arc::new(ScriptedWire::default())).await;
    assert_eq!(run_yaml(&mut engine, &yaml).await.unwrap(), Verdict::Passed);
    engine.into_shell().close().await;

    let mut engine = engine_with(&[("MOCK_RIG_MACS", "2")], Arc::new(ScriptedWire::default())).await;
    assert_eq!(run_yaml(&mut engine, &yaml).await.unwrap(), Verdict::Failed);
    engine.into_shell().close().await;
}

#[tokio::test]
async fn test_trap_case_checks_cpu_counter() {
    let yaml = action_case("TRAP", "");

    let mut engine = engine_with(&[("MOCK_RIG_RX_STEP", "1")], Arc::new(ScriptedWire::default())).await;
    assert_eq!(run_yaml(&mut engine, &yaml).await.unwrap(), Verdict::Passed);
    engine.into_shell().close().await;

    let mut engine = engine_with(&[("MOCK_RIG_RX_STEP", "0")], Arc::new(ScriptedWire::default())).await;
    assert_eq!(run_yaml(&mut engine, &yaml).await.unwrap(), Verdict::Failed);
    engine.into_shell().close().await;
}

#[tokio::test]
async fn test_acl_counter_mismatch() {
    let extra = "  sai_create_acl_counter aclcnt1\nflush: VendorDeleteVlan 75\n";
    let yaml = action_case("FORWARD", extra).replace(
        "  packet_count: 1\n",
        "  packet_count: 1\n  acl_counters: [aclcnt1]\n",
    );
    let wire = Arc::new(ScriptedWire::replying(&[("tap1", vec![egress_frame()])]));

    let mut engine = engine_with(&[("MOCK_RIG_ACL_STEP", "1")], wire.clone()).await;
    assert_eq!(run_yaml(&mut engine, &yaml).await.unwrap(), Verdict::Passed);
    engine.into_shell().close().await;

    let mut engine = engine_with(&[("MOCK_RIG_ACL_STEP", "0")], wire).await;
    assert_eq!(
        run_yaml(&mut engine, &yaml).await.unwrap(),
        Verdict::AclCounterMismatch
    );
    engine.into_shell().close().await;
}

fn rif_case(action: &str) -> String {
    let extra = "  sai_create_router_interface rif0\nflush: VendorDeleteVlan 75\n";
    action_case(action, extra).replace(
        "  packet_count: 1\n",
        "  packet_count: 1\n  rif_counters: [rif0]\n",
    )
}

#[tokio::test]
async fn test_rif_counter_check() {
    let yaml = rif_case("FORWARD");
    let wire = Arc::new(ScriptedWire::replying(&[("tap1", vec![egress_frame()])]));

    let mut engine = engine_with(&[("MOCK_RIG_RIF_STEP", "1")], wire.clone()).await;
    let (verdict, text) = run_logged(&mut engine, &yaml).await;
    assert_eq!(verdict, Verdict::Passed);
    assert!(text.contains("sai_get_router_interface_stats 1688849860263937 1"), "{text}");
    assert!(text.contains("RIF Counters incremented as expected !"));
    engine.into_shell().close().await;

    let mut engine = engine_with(&[("MOCK_RIG_RIF_STEP", "0")], wire).await;
    assert_eq!(
        run_yaml(&mut engine, &yaml).await.unwrap(),
        Verdict::RifCounterMismatch
    );
    assert_eq!(Verdict::RifCounterMismatch.status(), "Failed in RIF Counter check");
    engine.into_shell().close().await;
}

#[tokio::test]
async fn test_rif_counter_drop_reads_from_stat_five() {
    let yaml = rif_case("DROP");
    let env = [("MOCK_RIG_RIF_STEP", "1"), ("MOCK_RIG_MACS", "0")];
    let mut engine = engine_with(&env, Arc::new(ScriptedWire::default())).await;

    let (verdict, text) = run_logged(&mut engine, &yaml).await;
    assert_eq!(verdict, Verdict::Passed);
    assert!(text.contains("sai_get_router_interface_stats 1688849860263937 5"), "{text}");
    assert!(!text.contains("sai_get_router_interface_stats 1688849860263937 1"));
    engine.into_shell().close().await;
}

#[tokio::test]
async fn test_run_selection_writes_report() {
    let cases = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    write_case(cases.path(), "esalVendorCreateVlan", CREATE_VLAN);
    write_case(cases.path(), "esalBroken", "params: [not, a, map]\n");

    let selection = Selection {
        total: 3,
        tests: vec!["esalVendorCreateVlan".to_string(), "esalBroken".to_string()],
    };
    let mut engine = engine_with(&[], Arc::new(ScriptedWire::default())).await;
    let mut report = RunReport::new(selection.total);
    run_selection(&mut engine, cases.path(), &selection, results.path(), false, &mut report)
        .await
        .unwrap();
    engine.into_shell().close().await;

    assert_eq!(report.total, 3);
    assert_eq!(report.executed, 2);
    assert_eq!(report.passed, 1);
    assert_eq!(report.failed, 1);
    assert!(results.path().join("esalVendorCreateVlan.txt").exists());

    let written = report.write(results.path()).unwrap();
    let records: Vec<BTreeMap<String, serde_json::Value>> =
        serde_json::from_str(&std::fs::read_to_string(written).unwrap()).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["status"], "Passed");
    assert!(records[1]["status"].as_str().unwrap().starts_with("Failed"));
}

#[tokio::test]
async fn test_run_selection_stops_on_fatal_error() {
    let cases = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    write_case(cases.path(), "esalInvalid", "program: no_such_command\n");
    write_case(cases.path(), "esalVendorCreateVlan", CREATE_VLAN);

    let selection = Selection {
        total: 2,
        tests: vec!["esalInvalid".to_string(), "esalVendorCreateVlan".to_string()],
    };
    let mut engine = engine_with(&[], Arc::new(ScriptedWire::default())).await;
    let mut report = RunReport::new(selection.total);
    let err = run_selection(&mut engine, cases.path(), &selection, results.path(), false, &mut report)
        .await
        .unwrap_err();
    engine.into_shell().close().await;

    assert!(err.is_fatal());
    assert_eq!(report.executed, 1);
    assert_eq!(report.failed_cases.len(), 1);
}

#[test]
fn test_shipped_cases_load() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("testcases");
    let names = discover(&dir).unwrap();
    assert!(!names.is_empty());
    for name in &names {
        if let Err(e) = TestCase::load(&case_path(&dir, name)) {
            panic!("{name}: {e}");
        }
    }

    let suites = Suites::load(&dir).unwrap();
    for name in suites.sanity.iter().chain(&suites.fujitsu).chain(&suites.m0) {
        assert!(names.contains(name), "suite entry {name} has no case file");
    }
    for name in &names {
        assert!(suites.fujitsu.contains(name) || suites.m0.contains(name), "{name} is in no feature suite");
    }

    let purge = TestCase::load(&case_path(&dir, "esalVendorPurgeMacEntriesPerPort_II")).unwrap();
    assert!(purge.expected(1).unwrap().contains("macs:\0\0\u{11}\0\u{11}\0numMacs:1"));
    let stp = TestCase::load(&case_path(&dir, "esalVendorSetPortStpState_IV")).unwrap();
    assert!(stp.commands().is_empty());
    assert_eq!(stp.expected(1).unwrap(), "");
}
