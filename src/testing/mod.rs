//! Regression test execution
//!
//! Loads YAML test cases, runs them on the rig through the [`Engine`] and
//! collects the outcomes in a [`RunReport`].

pub mod case;
pub mod compare;
pub mod engine;
pub mod report;
pub mod scrape;
pub mod suite;
pub mod transcript;
pub mod vars;

use std::path::Path;
use std::time::Instant;

use colored::Colorize;

use crate::common::paths::transcript_path;
use crate::common::{Error, Result};

pub use case::{LoopCounter, PacketAction, TestCase};
pub use engine::{Engine, EngineSettings, Verdict};
pub use report::RunReport;
pub use suite::{Selection, Suites};
pub use transcript::Transcript;

/// Run the selected tests in order
///
/// A case that fails to load, or fails in a way the rig survives, is
/// recorded and the run moves on. A fatal error is recorded against the
/// current case and returned.
pub async fn run_selection(
    engine: &mut Engine,
    cases_dir: &Path,
    selection: &Selection,
    run_dir: &Path,
    verbose: bool,
    report: &mut RunReport,
) -> Result<()> {
    for name in &selection.tests {
        let path = suite::case_path(cases_dir, name);
        let log_path = transcript_path(run_dir, name);
        let mut transcript = Transcript::create(&log_path, verbose).unwrap_or_else(|e| {
            tracing::warn!("Could not open transcript {}: {}", log_path.display(), e);
            Transcript::console(verbose)
        });

        println!(
            "\n{} {} from {}",
            "Loading test".blue().bold(),
            name.white().bold(),
            path.display().to_string().dimmed()
        );
        let started = Instant::now();

        let case = match TestCase::load(&path) {
            Ok(case) => case,
            Err(e) => {
                tracing::error!("{}", e);
                report.add_result(name, &e.status_text(), started.elapsed(), transcript.path());
                continue;
            }
        };
        if let Some(desc) = &case.description {
            transcript.line(desc);
        }

        match engine.run_case(&case, &mut transcript).await {
            Ok(verdict) => {
                report.add_result(name, verdict.status(), started.elapsed(), transcript.path());
            }
            Err(e) if e.is_fatal() => {
                tracing::error!("Aborting run in {}: {}", name, e);
                transcript.line(e.to_string());
                report.add_result(name, &e.status_text(), started.elapsed(), transcript.path());
                return Err(e);
            }
            Err(e) => {
                tracing::warn!("{} failed: {}", name, e);
                transcript.line(e.to_string());
                engine.flush(&case, &mut transcript).await;
                report.add_result(name, &e.status_text(), started.elapsed(), transcript.path());
            }
        }
    }
    Ok(())
}

/// Fail early when nothing was selected
pub fn ensure_selected(selection: &Selection) -> Result<()> {
    if selection.tests.is_empty() {
        return Err(Error::Config("No test to run. Test list empty.".to_string()));
    }
    Ok(())
}
