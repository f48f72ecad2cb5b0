//! Sweep driver: edit, simulate and deliver one output per parameter value.
//!
//! Runs are strictly sequential. Every run of a sweep rewrites the same
//! `<base>_generated.asc`, so a run must finish before the next one starts.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{Config, NamingConvention, OutputMode};
use crate::error::{LtsweepError, Result};
use crate::rawfile::{ChannelSelection, WaveformExtractor};
use crate::schematic::{generated_path, parameter_header, set_parameter};
use crate::script::Operation;
use crate::simulator::{artifact_path, simulate, with_suffix, SimulationReport, SimulatorRunner};
use crate::stats::Stats;

/// Name of the output produced by a run with the schematic's own values.
pub const DEFAULT_OUTPUT_NAME: &str = "result";

/// One parameter swept over a list of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sweep {
    pub parameter: String,
    pub values: Vec<String>,
}

impl Sweep {
    pub fn new<V: ToString>(parameter: impl Into<String>, values: &[V]) -> Self {
        Self {
            parameter: parameter.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// Output name for the value at `position` in a sweep.
///
/// `Number` gives `position + numbering_start` padded to at least three
/// digits; `Parameter` gives `name=value`, which must not contain a path
/// separator.
pub fn output_name(
    naming: NamingConvention,
    parameter: &str,
    value: &str,
    position: usize,
    numbering_start: usize,
) -> Result<String> {
    match naming {
        NamingConvention::Number => Ok(format!("{:03}", position + numbering_start)),
        NamingConvention::Parameter => {
            let name = format!("{}={}", parameter, value);
            if name.contains(['/', '\\']) {
                return Err(LtsweepError::Config(format!(
                    "'{}' cannot be used as an output file name with naming = \"parameter\"",
                    name
                )));
            }
            Ok(name)
        }
    }
}

/// What happened to one run of a sweep.
#[derive(Debug, Clone)]
pub struct RunRecord {
    /// `name=value`, or [`DEFAULT_OUTPUT_NAME`] for a default run.
    pub label: String,
    pub output: PathBuf,
    pub simulation: SimulationReport,
    /// The output file was written.
    pub delivered: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub records: Vec<RunRecord>,
}

impl SweepReport {
    /// Output paths in sweep order, delivered or not.
    pub fn output_paths(&self) -> Vec<PathBuf> {
        self.records.iter().map(|r| r.output.clone()).collect()
    }

    pub fn delivered(&self) -> usize {
        self.records.iter().filter(|r| r.delivered).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RunRecord> {
        self.records.iter().filter(|r| !r.delivered)
    }
}

pub struct SweepDriver<'a> {
    config: Config,
    runner: &'a dyn SimulatorRunner,
    extractor: Option<WaveformExtractor<'a>>,
}

impl<'a> SweepDriver<'a> {
    pub fn new(config: Config, runner: &'a dyn SimulatorRunner) -> Result<Self> {
        config.validate()?;
        let extractor = match config.output {
            OutputMode::Raw => None,
            OutputMode::Table => {
                let selection = ChannelSelection::for_table(&config)?;
                Some(WaveformExtractor::new(selection, runner))
            }
        };
        Ok(Self {
            config,
            runner,
            extractor,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a sweep, or a single run with the schematic's own values when
    /// `sweep` is `None`.
    ///
    /// A run whose simulation produced nothing is recorded as undelivered
    /// and the sweep continues. An unwritable output location aborts.
    pub fn run_sweep(
        &self,
        sweep: Option<&Sweep>,
        numbering_start: usize,
        mut stats: Option<&mut Stats>,
    ) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        let Some(sweep) = sweep else {
            tracing::info!("Starting simulation.");
            let base = self.config.base_path();
            let record = self.run_one(
                DEFAULT_OUTPUT_NAME.to_string(),
                &base,
                DEFAULT_OUTPUT_NAME,
                stats.as_deref_mut(),
            )?;
            report.records.push(record);
            return Ok(report);
        };

        let names = sweep
            .values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                output_name(
                    self.config.naming,
                    &sweep.parameter,
                    value,
                    i,
                    numbering_start,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let generated = generated_path(&self.config.schematic);
        let generated_base = generated.with_extension("");
        for (value, name) in sweep.values.iter().zip(&names) {
            let start = Instant::now();
            set_parameter(&self.config.schematic, &sweep.parameter, value, false)?;
            if let Some(s) = stats.as_deref_mut() {
                s.add_phase("edit", start.elapsed());
            }

            tracing::info!(
                "Starting simulation with the specified parameter: {}={}",
                sweep.parameter,
                value
            );
            let label = format!("{}={}", sweep.parameter, value);
            let record = self.run_one(label, &generated_base, name, stats.as_deref_mut())?;
            report.records.push(record);
        }

        Ok(report)
    }

    /// Execute parsed script operations in order.
    ///
    /// `set` rewrites the base schematic in place, so it affects every later
    /// run. Numbering continues across consecutive `run` operations.
    pub fn run_script(
        &self,
        operations: &[Operation],
        numbering_start: usize,
        mut stats: Option<&mut Stats>,
    ) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let mut next_number = numbering_start;

        for op in operations {
            match op {
                Operation::Set { parameter, value } => {
                    set_parameter(&self.config.schematic, parameter, value, true)?;
                    tracing::info!(
                        "Set {}={} in {}",
                        parameter,
                        value,
                        self.config.schematic.display()
                    );
                }
                Operation::Run { parameter, values } => {
                    let sweep = Sweep {
                        parameter: parameter.clone(),
                        values: values.clone(),
                    };
                    let part = self.run_sweep(Some(&sweep), next_number, stats.as_deref_mut())?;
                    next_number += values.len();
                    report.records.extend(part.records);
                }
            }
        }

        Ok(report)
    }

    /// Simulate `<base>.asc` and deliver the result under `name`.
    fn run_one(
        &self,
        label: String,
        base: &Path,
        name: &str,
        mut stats: Option<&mut Stats>,
    ) -> Result<RunRecord> {
        let simulation = simulate(self.runner, base);
        if let Some(s) = stats.as_deref_mut() {
            s.runs += 1;
            s.add_phase("simulate", simulation.elapsed);
            if simulation.succeeded() {
                s.artifacts_produced += 1;
            } else {
                s.artifacts_missing += 1;
            }
        }

        let start = Instant::now();
        let artifact_ready = simulation.succeeded() || self.recover(base, stats.as_deref_mut());
        let (output, delivered) = match self.extractor {
            None => self.relocate_raw(base, name, artifact_ready)?,
            Some(ref extractor) => self.extract_table(extractor, base, name, artifact_ready)?,
        };
        if let Some(s) = stats.as_deref_mut() {
            s.add_phase("deliver", start.elapsed());
            if delivered {
                s.outputs_delivered += 1;
            }
        }

        Ok(RunRecord {
            label,
            output,
            simulation,
            delivered,
        })
    }

    /// Simulate `<base>.asc` once more after a run that left no usable
    /// raw file. Returns whether the second attempt produced one.
    fn recover(&self, base: &Path, stats: Option<&mut Stats>) -> bool {
        tracing::warn!(
            "No usable raw file at {}, simulating again",
            artifact_path(base).display()
        );
        if let Some(s) = stats {
            s.recoveries += 1;
        }
        let retry = simulate(self.runner, base);
        if !retry.succeeded() {
            tracing::warn!("Error: no usable raw file at {}", retry.artifact.display());
        }
        retry.succeeded()
    }

    /// Move `<base>.raw` to `<output_dir>/<name>.raw`.
    fn relocate_raw(
        &self,
        base: &Path,
        name: &str,
        artifact_ready: bool,
    ) -> Result<(PathBuf, bool)> {
        let target = artifact_path(&self.config.output_dir.join(name));
        if !artifact_ready {
            return Ok((target, false));
        }

        move_file(&artifact_path(base), &target).map_err(|e| LtsweepError::OutputPath {
            path: target.clone(),
            reason: e.to_string(),
        })?;
        tracing::info!("Raw file saved to: {}", target.display());
        Ok((target, true))
    }

    fn extract_table(
        &self,
        extractor: &WaveformExtractor<'_>,
        base: &Path,
        name: &str,
        artifact_ready: bool,
    ) -> Result<(PathBuf, bool)> {
        let target = self.config.output_dir.join(name);
        if !artifact_ready {
            return Ok((target, false));
        }
        let header = parameter_header(&with_suffix(base, ".asc"))?;
        match extractor.extract(&artifact_path(base), &header, &target) {
            Ok(path) => Ok((path, true)),
            Err(e @ (LtsweepError::OutputPath { .. } | LtsweepError::Config(_))) => Err(e),
            Err(e) => {
                tracing::warn!("Could not extract {}: {}", name, e);
                Ok((target, false))
            }
        }
    }
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(source: &Path, target: &Path) -> std::io::Result<()> {
    if fs::rename(source, target).is_ok() {
        return Ok(());
    }
    fs::copy(source, target)?;
    fs::remove_file(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_name_number() {
        let name = |pos: usize, start: usize| {
            output_name(NamingConvention::Number, "R", "1k", pos, start).unwrap()
        };
        assert_eq!(name(0, 0), "000");
        assert_eq!(name(2, 7), "009");
        assert_eq!(name(0, 1234), "1234");
    }

    #[test]
    fn test_output_name_parameter() {
        assert_eq!(
            output_name(NamingConvention::Parameter, "R", "1k", 3, 0).unwrap(),
            "R=1k"
        );
    }

    #[test]
    fn test_output_name_rejects_path_separators() {
        for value in ["../x", "1/2", "a\\b"] {
            let err = output_name(NamingConvention::Parameter, "R", value, 0, 0).unwrap_err();
            assert!(matches!(err, LtsweepError::Config(_)), "{}", value);
        }
        // Numbered names never embed the value.
        assert!(output_name(NamingConvention::Number, "R", "1/2", 0, 0).is_ok());
    }

    #[test]
    fn test_sweep_new_formats_values() {
        let sweep = Sweep::new("R1", &[100, 200]);
        assert_eq!(sweep.values, vec!["100", "200"]);
    }
}
