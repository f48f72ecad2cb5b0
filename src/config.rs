//! Run configuration loaded from a TOML file.
//!
//! ```toml
//! executable = "/home/me/.wine/drive_c/Program Files/LTC/LTspiceXVII/XVIIx64.exe"
//! schematic = "example_circuit.asc"
//! output_dir = "data"
//! naming = "number"
//! output = "raw"
//! ordering = [0, 1, 2]
//!
//! [variables]
//! time = 0
//! V_c = 2
//! I_c = 3
//!
//! [wine]
//! enabled = true
//!
//! [simulator]
//! timeout_secs = 600
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde_derive::Deserialize;

use crate::error::{LtsweepError, Result};

/// How sweep output files are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NamingConvention {
    /// Zero-padded sequence number: `000`, `001`, ...
    #[default]
    Number,
    /// `name=value` of the swept parameter.
    Parameter,
}

/// What each sweep run leaves in the output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Relocate the simulator's raw file unchanged.
    #[default]
    Raw,
    /// Extract the selected channels into a tab-separated table.
    Table,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WineConfig {
    /// Run the executable through wine and translate paths with winepath.
    pub enabled: bool,
    pub program: String,
    pub winepath: String,
}

impl Default for WineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "wine".to_string(),
            winepath: "winepath".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Kill the simulator after this many seconds. `None` waits forever.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub executable: PathBuf,
    pub schematic: PathBuf,
    /// Channel name -> index within one point of the raw file.
    pub variables: BTreeMap<String, usize>,
    /// Permutation applied to the index-sorted channels. Empty keeps index order.
    pub ordering: Vec<usize>,
    pub output_dir: PathBuf,
    pub naming: NamingConvention,
    pub output: OutputMode,
    pub wine: WineConfig,
    pub simulator: SimulatorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("XVIIx64.exe"),
            schematic: PathBuf::from("circuit.asc"),
            variables: BTreeMap::new(),
            ordering: Vec::new(),
            output_dir: PathBuf::new(),
            naming: NamingConvention::default(),
            output: OutputMode::default(),
            wine: WineConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LtsweepError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schematic.extension().and_then(|e| e.to_str()) != Some("asc") {
            return Err(LtsweepError::Config(format!(
                "schematic '{}' must be an .asc file",
                self.schematic.display()
            )));
        }

        let mut seen = BTreeSet::new();
        for (name, index) in &self.variables {
            if !seen.insert(*index) {
                return Err(LtsweepError::Config(format!(
                    "variables: index {} is used by more than one channel (last: {})",
                    index, name
                )));
            }
        }

        if !self.ordering.is_empty() && self.variables.is_empty() {
            return Err(LtsweepError::Config(
                "ordering is set but no variables are selected".to_string(),
            ));
        }
        if !self.variables.is_empty() {
            check_permutation(&self.ordering, self.variables.len())?;
        }
        Ok(())
    }

    /// Schematic path without its `.asc` extension.
    pub fn base_path(&self) -> PathBuf {
        self.schematic.with_extension("")
    }
}

/// `ordering` must be empty or a permutation of `0..len`.
pub(crate) fn check_permutation(ordering: &[usize], len: usize) -> Result<()> {
    if ordering.is_empty() {
        return Ok(());
    }
    let mut sorted = ordering.to_vec();
    sorted.sort_unstable();
    if sorted.len() != len || sorted.iter().enumerate().any(|(i, &v)| i != v) {
        return Err(LtsweepError::Config(format!(
            "ordering {:?} is not a permutation of 0..{}",
            ordering, len
        )));
    }
    Ok(())
}
