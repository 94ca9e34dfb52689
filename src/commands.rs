//! CLI command definitions
//!
//! Defines the clap commands for the harness CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run regression tests against a rig
    Run {
        /// Rig address
        host: String,

        /// Login user
        user: String,

        /// Login password (empty string for key authentication)
        password: String,

        /// Directory on the rig holding the vendor application
        xdk_path: String,

        /// Platform type: esal-fs, esal-fl or xps
        xp_type: String,

        /// Test type: sanity or feature
        test_type: String,

        /// Test name prefix, or "all" for the whole suite
        test_name: String,

        /// Echo every command and output to stdout
        #[arg(long, short)]
        verbose: bool,

        /// Configuration file (default: platform config directory)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List the test cases in the case directory
    List {
        /// Test case directory (default from configuration)
        #[arg(long)]
        cases: Option<PathBuf>,

        /// Configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Interactive shell calling the vendor library directly
    Shell {
        /// Vendor shared library (default from configuration)
        #[arg(long)]
        lib: Option<PathBuf>,

        /// Configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Quick VLAN and port check through the vendor library
    Smoke {
        /// Vendor shared library (default from configuration)
        #[arg(long)]
        lib: Option<PathBuf>,

        /// Configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}
