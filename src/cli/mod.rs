//! CLI command handling
//!
//! Dispatches CLI commands to the test runner and the vendor library tools.

mod list;
mod repl;
mod run;
mod smoke;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            host,
            user,
            password,
            xdk_path,
            xp_type,
            test_type,
            test_name,
            verbose,
            config,
        } => {
            let config = Config::load(config.as_deref())?;
            let request = run::RunRequest {
                host,
                user,
                password,
                xdk_path,
                xp_type,
                test_type,
                test_name,
                verbose,
            };
            run::run(&config, request).await
        }

        Commands::List { cases, config } => {
            let config = Config::load(config.as_deref())?;
            let cases = cases.unwrap_or_else(|| config.paths.cases_dir.clone());
            list::list(&cases)
        }

        Commands::Shell { lib, config } => {
            let config = Config::load(config.as_deref())?;
            let lib = lib.unwrap_or_else(|| config.paths.vendor_lib.clone());
            // rustyline blocks on the terminal
            tokio::task::spawn_blocking(move || repl::repl(&lib))
                .await
                .map_err(|e| Error::Internal(e.to_string()))?
        }

        Commands::Smoke { lib, config } => {
            let config = Config::load(config.as_deref())?;
            let lib = lib.unwrap_or_else(|| config.paths.vendor_lib.clone());
            smoke::smoke(&lib)
        }
    }
}
