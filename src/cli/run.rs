//! `esaltest run`: execute a suite on a rig

use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use colored::Colorize;

use crate::common::config::Config;
use crate::common::paths::{open_permissions, run_dir};
use crate::common::{logging, Error, Result};
use crate::rig::{launch_app, DeviceType, PromptSettings, RigShell, Transport};
use crate::testing::{self, suite, Engine, EngineSettings, RunReport, Selection, Suites};
use crate::traffic::PcapWire;

/// Positional arguments of a run
pub struct RunRequest {
    pub host: String,
    pub user: String,
    pub password: String,
    pub xdk_path: String,
    pub xp_type: String,
    pub test_type: String,
    pub test_name: String,
    pub verbose: bool,
}

pub async fn run(config: &Config, request: RunRequest) -> Result<()> {
    let device = DeviceType::from_xp_type(&request.xp_type);
    let run_dir = run_dir(
        &config.paths.results_dir,
        &request.xp_type,
        device.as_str(),
        Local::now(),
    );

    let _guard = logging::init_run(&run_dir);
    println!(
        "{} {}",
        "Results will be stored in".blue().bold(),
        run_dir.display()
    );
    tracing::info!(
        "Run: device={} test_type={} test_name={}",
        device,
        request.test_type,
        request.test_name
    );

    run_in(config, &request, device, &run_dir).await
}

/// Select and run the tests; the report is written on every path out
async fn run_in(
    config: &Config,
    request: &RunRequest,
    device: DeviceType,
    run_dir: &Path,
) -> Result<()> {
    let mut report = RunReport::new(0);
    let outcome = match select_tests(config, request, device) {
        Ok(selection) => {
            report = RunReport::new(selection.total);
            tokio::select! {
                result = execute(config, request, device, &selection, run_dir, &mut report) => result,
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("Interrupted");
                    Err(Error::Internal("run interrupted".to_string()))
                }
            }
        }
        Err(e) => {
            tracing::error!("{}", e);
            Err(e)
        }
    };

    finish(&report, run_dir, &config.paths.results_dir);
    outcome
}

fn select_tests(config: &Config, request: &RunRequest, device: DeviceType) -> Result<Selection> {
    let cases_dir = &config.paths.cases_dir;
    let suites = Suites::load(cases_dir)?;
    let selection = suite::select(
        cases_dir,
        &suites,
        &request.test_type,
        device,
        &request.test_name,
    )?;
    testing::ensure_selected(&selection)?;
    Ok(selection)
}

async fn execute(
    config: &Config,
    request: &RunRequest,
    device: DeviceType,
    selection: &Selection,
    run_dir: &Path,
    report: &mut RunReport,
) -> Result<()> {
    let transport = Transport::Ssh {
        host: request.host.clone(),
        user: request.user.clone(),
        password: Some(request.password.clone()),
        ssh: config.rig.ssh.clone(),
        connect_timeout_secs: config.rig.connect_timeout_secs,
    };
    println!("{} {}", "Connecting to".blue(), transport.describe());
    let mut shell = RigShell::open(&transport, PromptSettings::from(&config.rig)).await?;

    if let Err(e) = launch_app(&mut shell, device, &request.xdk_path, &config.rig.app_prompt).await {
        shell.close().await;
        return Err(e);
    }

    let wire = Arc::new(PcapWire::new(&config.traffic));
    let mut engine = Engine::new(shell, wire, device, EngineSettings::from(&config.traffic));

    let result = testing::run_selection(
        &mut engine,
        &config.paths.cases_dir,
        selection,
        run_dir,
        request.verbose,
        report,
    )
    .await;

    engine.into_shell().close().await;
    result
}

/// Results, summary and permissions are handled whatever the outcome
fn finish(report: &RunReport, run_dir: &Path, results_root: &Path) {
    if let Err(e) = report.write(run_dir) {
        tracing::error!("Failed to write results: {}", e);
    }
    report.print_summary();
    if let Err(e) = open_permissions(results_root) {
        tracing::warn!("Failed to open permissions on {}: {}", results_root.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(test_name: &str) -> RunRequest {
        RunRequest {
            host: "rig".to_string(),
            user: "root".to_string(),
            password: "secret".to_string(),
            xdk_path: "/opt/xdk".to_string(),
            xp_type: "esal-fs".to_string(),
            test_type: "sanity".to_string(),
            test_name: test_name.to_string(),
            verbose: false,
        }
    }

    fn config(cases: &Path, results: &Path) -> Config {
        let mut config = Config::default();
        config.paths.cases_dir = cases.to_path_buf();
        config.paths.results_dir = results.to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_empty_selection_still_writes_results() {
        let cases = tempfile::tempdir().unwrap();
        let results = tempfile::tempdir().unwrap();
        std::fs::write(cases.path().join("suites.toml"), "sanity = []\n").unwrap();
        std::fs::write(cases.path().join("esalVendorCreateVlan.yaml"), "program: VendorCreateVlan 75\n").unwrap();
        let run_dir = results.path().join("esal-fs-AC3XFS-run");

        let err = run_in(
            &config(cases.path(), results.path()),
            &request("nomatch"),
            DeviceType::Ac3xfs,
            &run_dir,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("Test list empty"), "{err}");
        let written = std::fs::read_to_string(run_dir.join("results.json")).unwrap();
        assert_eq!(written.trim(), "[]");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&run_dir).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o777);
        }
    }

    #[tokio::test]
    async fn test_missing_suites_file_still_writes_results() {
        let cases = tempfile::tempdir().unwrap();
        let results = tempfile::tempdir().unwrap();
        let run_dir = results.path().join("run");

        let err = run_in(
            &config(cases.path(), results.path()),
            &request("all"),
            DeviceType::Falcon,
            &run_dir,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::FileRead { .. }), "{err:?}");
        assert!(run_dir.join("results.json").exists());
    }
}
