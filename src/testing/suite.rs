//! Test selection
//!
//! Named suites live in `suites.toml` at the root of the case directory.
//! A run either takes a whole suite or every case whose file name starts
//! with a given prefix.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::common::{Error, Result};
use crate::rig::DeviceType;

/// Suite file name inside the case directory
pub const SUITES_FILE: &str = "suites.toml";

/// Test name that selects the whole suite
pub const ALL: &str = "all";

/// Named test lists
#[derive(Debug, Default, Deserialize)]
pub struct Suites {
    /// Sanity regression
    #[serde(default)]
    pub sanity: Vec<String>,
    /// Feature regression for AC3XFS and ALDRIN2XLFL
    #[serde(default)]
    pub fujitsu: Vec<String>,
    /// Feature regression for Falcon
    #[serde(default)]
    pub m0: Vec<String>,
}

impl Suites {
    /// Load `suites.toml` from the case directory
    pub fn load(cases_dir: &Path) -> Result<Self> {
        let path = cases_dir.join(SUITES_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(format!("{}: {}", SUITES_FILE, e)))
    }

    /// The suite a test type runs on a device
    pub fn for_test_type(&self, test_type: &str, device: DeviceType) -> &[String] {
        match test_type {
            "sanity" => &self.sanity,
            "feature" => match device {
                DeviceType::Ac3xfs | DeviceType::Aldrin2xlfl => &self.fujitsu,
                DeviceType::Falcon => &self.m0,
            },
            other => {
                tracing::warn!("Invalid argument for testType '{}'. Taking sanity as default", other);
                &self.sanity
            }
        }
    }
}

/// Tests chosen for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Length of the selected suite; reported as the run total
    pub total: usize,
    /// Test names to execute, in order
    pub tests: Vec<String>,
}

/// Resolve the tests for a run
pub fn select(
    cases_dir: &Path,
    suites: &Suites,
    test_type: &str,
    device: DeviceType,
    test_name: &str,
) -> Result<Selection> {
    let suite = suites.for_test_type(test_type, device);
    let tests = if test_name == ALL {
        suite.to_vec()
    } else {
        discover(cases_dir)?
            .into_iter()
            .filter(|name| name.starts_with(test_name))
            .collect()
    };
    Ok(Selection {
        total: suite.len(),
        tests,
    })
}

/// Sorted names of every test case file in the directory
pub fn discover(cases_dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(cases_dir).map_err(|e| Error::FileRead {
        path: cases_dir.display().to_string(),
        error: e.to_string(),
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_case = path
            .extension()
            .map(|ext| ext == "yaml" || ext == "yml")
            .unwrap_or(false);
        if !is_case {
            continue;
        }
        if let Some(stem) = path.file_stem() {
            names.push(stem.to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Path of a named test case; `.yaml` preferred over `.yml`
pub fn case_path(cases_dir: &Path, name: &str) -> PathBuf {
    let yaml = cases_dir.join(format!("{}.yaml", name));
    if yaml.exists() {
        return yaml;
    }
    let yml = cases_dir.join(format!("{}.yml", name));
    if yml.exists() {
        yml
    } else {
        yaml
    }
}
