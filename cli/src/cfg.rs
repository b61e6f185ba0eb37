//! Configuration options specifically for the CLI portion of the simulator

use std::path::PathBuf;

use clap::{AppSettings, Parser};

/// Run one trial of the tumor simulation
#[derive(Parser)]
#[clap(
    version,
    about = "Spatial simulation of tumor growth and evolution",
    setting = AppSettings::DeriveDisplayOrder
)]
pub struct CliConfig {
    /// Path of the property file holding the trial configuration
    pub property_file: PathBuf,

    /// Property override as key=value; may be repeated
    #[clap(short = 'D', long = "define")]
    pub defines: Vec<String>,

    /// Suppress the progress bar
    #[clap(short, long)]
    pub quiet: bool,
}
