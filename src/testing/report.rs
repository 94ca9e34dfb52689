//! Run results
//!
//! Accumulates per-test outcomes for one run, writes `results.json` and
//! prints the end-of-run summary.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use colored::Colorize;
use serde::Serialize;

use crate::common::Result;

/// File name of the machine-readable report in a run directory
pub const RESULTS_FILE: &str = "results.json";

/// SAI feature prefixes that get an underscore appended in reports
const TEST_PREFIXES: &[&str] = &[
    "saiCrm",
    "saiFdb",
    "saiL3",
    "saiMtu",
    "saiQos",
    "saiEverflow",
    "saiAclIngr",
    "saiAclEgr",
    "saiMac",
    "saiPort",
    "saiCopp",
    "saiDecap",
    "saiSpan",
    "saiErspan",
    "saiVxlan",
    "saiHash",
    "saiSample",
];

/// One executed test; fields are declared in key order for the JSON output
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TestRecord {
    pub log: Option<String>,
    pub name: String,
    pub status: String,
    /// Whole seconds, rounded
    pub time: u64,
}

/// Aggregated results of one run
#[derive(Debug, Default)]
pub struct RunReport {
    pub total: usize,
    pub executed: usize,
    pub passed: usize,
    pub failed: usize,
    pub failed_cases: Vec<String>,
    pub tests: Vec<TestRecord>,
}

impl RunReport {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Record one test outcome
    pub fn add_result(&mut self, name: &str, status: &str, elapsed: Duration, log: Option<&Path>) {
        let name = report_name(name);

        let passed = status.to_lowercase().contains("pass");
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
            self.failed_cases.push(name.clone());
        }
        self.executed += 1;

        let status_text = if passed { status.green() } else { status.red() };
        println!(
            "Test {} {} ({:.2}s)\n",
            name.white().bold(),
            status_text,
            elapsed.as_secs_f64()
        );

        self.tests.push(TestRecord {
            log: log.map(|p| p.display().to_string()),
            name,
            status: status.to_string(),
            time: elapsed.as_secs_f64().round() as u64,
        });
    }

    /// Per-test records as 4-space indented JSON
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.tests.serialize(&mut ser)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Write `results.json` into the run directory
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(RESULTS_FILE);
        std::fs::write(&path, self.to_json()?)?;
        tracing::info!("Results written to {}", path.display());
        Ok(path)
    }

    /// Summary table plus the failed-case list
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "--------------- TEST SUMMARY ---------------");
        let _ = writeln!(out, "***Total Test Cases***\t\t{}", self.total);
        let _ = writeln!(out, "***Test Cases Executed***\t{}", self.executed);
        let _ = writeln!(out, "***Test Cases Passed***\t\t{}", self.passed);
        let _ = writeln!(out, "***Test Cases Failed***\t\t{}", self.failed);
        let _ = writeln!(out, "--------------------------------------------");
        if self.failed != 0 {
            let _ = writeln!(out, "--------------- FAILED TEST CASES ---------------\n");
            for name in &self.failed_cases {
                let _ = writeln!(out, "\t{}", name);
            }
        }
        out
    }

    pub fn print_summary(&self) {
        let summary = self.summary();
        if self.failed == 0 {
            print!("{}", summary.green());
        } else {
            print!("{}", summary.yellow());
        }
    }
}

/// Insert an underscore after a known SAI feature prefix
fn report_name(name: &str) -> String {
    match TEST_PREFIXES.iter().find(|p| name.contains(*p)) {
        Some(prefix) => name.replacen(prefix, &format!("{}_", prefix), 1),
        None => name.to_string(),
    }
}
