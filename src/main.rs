//! ESAL regression harness
//!
//! Drives the vendor CLI on a switch rig over SSH, injects and captures
//! traffic on the rig's taps, and checks every YAML test case against the
//! expected outputs. Also offers a direct shell into the vendor library.

use clap::Parser;
use commands::Commands;
use esal_harness::common::logging;
use esal_harness::{cli, commands};

#[derive(Parser)]
#[command(name = "esaltest", about = "ESAL switch regression harness")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // runs set up their own logging once the results directory is known
    if !matches!(cli.command, Commands::Run { .. }) {
        logging::init_cli();
    }

    if let Err(e) = cli::dispatch(cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
