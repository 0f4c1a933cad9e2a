use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Describes the script run by the daemon after every successful poll.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptConfig {
    /// Program to execute.
    pub command: PathBuf,
    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
    /// Prefix for the names of all exported variables.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    String::from("DLOGG_")
}

impl ScriptConfig {
    pub const DEFAULT_CONFIG_FILE: &'static str = "dlogg_script.yml";

    pub fn load(path: &Path) -> Result<Self> {
        log::debug!("Loading script config from {path:?}");
        let file =
            File::open(path).with_context(|| format!("Cannot open config file {path:?}"))?;
        serde_yaml::from_reader(file).with_context(|| format!("Invalid config file {path:?}"))
    }
}
