use clap::Parser;

use tumor_cli::{run_cli_config, CliConfig};

/// Entry-point for the main "tumor" command-line executable
fn main() {
    env_logger::init();

    let cfg = CliConfig::parse();
    if let Err(error) = run_cli_config(cfg) {
        eprintln!("Error: {:#}", error);
        std::process::exit(1);
    }
}
