//! Report (observer) machinery and output-file plumbing

use serde::Serialize;

use crate::cfg::SimConfig;

pub mod output;

pub use output::{Report, ReportGroup, ReportGroupBuilder, SampleSchedule};

/// Information persisted alongside a trial so runs can be identified and
/// reproduced
#[derive(Serialize)]
pub struct RunManifest<'a> {
    name: String,
    version: String,
    description: String,
    config: &'a SimConfig,
}

impl<'a> RunManifest<'a> {
    /// Build a manifest for the current code version and resolved `config`
    pub fn new(config: &'a SimConfig) -> Self {
        Self {
            name: "tumor".to_string(),
            version: get_current_version_str().to_string(),
            description: "spatial simulation of tumor growth and evolution".to_string(),
            config,
        }
    }
}

/// Get the current crate version as defined in Cargo.toml
fn get_current_version_str() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
