//! Invocation of the external simulator.
//!
//! A simulation is two synchronous runs of the LTspice executable: one that
//! turns `<base>.asc` into `<base>.net`, one that simulates the netlist in
//! batch mode and writes `<base>.raw`. Success is judged only by the raw file
//! appearing with a non-zero size; the simulator's own output is not parsed.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{Config, WineConfig};
use crate::error::{LtsweepError, Result};

/// The two simulator operations the sweep needs.
///
/// Implementations block until the external process has exited.
pub trait SimulatorRunner {
    /// Materialise `<base>.net` from the schematic at `<base>.asc`.
    fn generate_netlist(&self, schematic: &Path) -> Result<()>;
    /// Simulate `<base>.net`, writing an ASCII `<base>.raw`.
    fn run_batch_simulation(&self, netlist: &Path) -> Result<()>;
}

/// Runs a Windows LTspice executable, through wine unless disabled.
#[derive(Debug, Clone)]
pub struct WineRunner {
    executable: PathBuf,
    wine: WineConfig,
    timeout: Option<Duration>,
}

impl WineRunner {
    pub fn new(executable: impl Into<PathBuf>, wine: WineConfig, timeout_secs: Option<u64>) -> Self {
        Self {
            executable: executable.into(),
            wine,
            timeout: timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.executable.clone(),
            config.wine.clone(),
            config.simulator.timeout_secs,
        )
    }

    /// Translate a local path to the convention the executable expects.
    /// Identity when wine is disabled.
    pub fn host_path(&self, path: &Path) -> Result<OsString> {
        if !self.wine.enabled {
            return Ok(path.as_os_str().to_os_string());
        }
        let output = Command::new(&self.wine.winepath)
            .arg("-w")
            .arg(path)
            .output()
            .map_err(|e| {
                LtsweepError::Simulator(format!("failed to run {}: {}", self.wine.winepath, e))
            })?;
        let translated = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() || translated.is_empty() {
            return Err(LtsweepError::Simulator(format!(
                "{} could not translate {}",
                self.wine.winepath,
                path.display()
            )));
        }
        Ok(OsString::from(translated))
    }

    fn invoke(&self, mode_args: &[&str], file: &Path) -> Result<()> {
        let mut cmd = if self.wine.enabled {
            let mut cmd = Command::new(&self.wine.program);
            cmd.arg(self.host_path(&self.executable)?);
            cmd
        } else {
            Command::new(&self.executable)
        };
        cmd.args(mode_args).arg(self.host_path(file)?);
        tracing::debug!(command = ?cmd, "running simulator");

        let child = cmd.spawn().map_err(|e| {
            LtsweepError::Simulator(format!("failed to start {:?}: {}", cmd.get_program(), e))
        })?;
        let status = wait_with_timeout(child, self.timeout)?;
        if !status.success() {
            // LTspice's exit code is unreliable; the artifact check decides.
            tracing::debug!(%status, "simulator exited with non-zero status");
        }
        Ok(())
    }
}

impl SimulatorRunner for WineRunner {
    fn generate_netlist(&self, schematic: &Path) -> Result<()> {
        self.invoke(&["-netlist"], schematic)
    }

    fn run_batch_simulation(&self, netlist: &Path) -> Result<()> {
        self.invoke(&["-b", "-ascii"], netlist)
    }
}

/// Wait for a child process, killing it if `timeout` elapses first.
fn wait_with_timeout(mut child: Child, timeout: Option<Duration>) -> Result<ExitStatus> {
    let Some(timeout) = timeout else {
        return Ok(child.wait()?);
    };

    let start = Instant::now();
    let poll_interval = Duration::from_millis(100);
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(LtsweepError::Timeout(timeout.as_secs()));
                }
                thread::sleep(poll_interval);
            }
            Err(e) => return Err(LtsweepError::Simulator(e.to_string())),
        }
    }
}

/// Which of the two invocations failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Netlist,
    Batch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Netlist => write!(f, "netlist generation"),
            Stage::Batch => write!(f, "batch simulation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationStatus {
    /// The raw file exists and has `bytes` bytes.
    Produced { bytes: u64 },
    /// Both invocations returned but no raw file appeared.
    Missing,
    /// The raw file exists but is empty.
    Empty,
    /// An invocation could not be started or did not finish.
    Failed { stage: Stage, message: String },
}

/// Outcome of one [`simulate`] call.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub base: PathBuf,
    pub artifact: PathBuf,
    pub status: SimulationStatus,
    pub elapsed: Duration,
}

impl SimulationReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, SimulationStatus::Produced { .. })
    }
}

/// `<base>` + `suffix`, keeping any dots already in the base name.
pub fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut path = base.as_os_str().to_os_string();
    path.push(suffix);
    PathBuf::from(path)
}

pub fn artifact_path(base: &Path) -> PathBuf {
    with_suffix(base, ".raw")
}

/// Simulate `<base>.asc`, best effort.
///
/// Never fails: a missing artifact or a failed invocation is logged and
/// reported in the returned status. Any stale `<base>.raw` is removed first.
pub fn simulate(runner: &dyn SimulatorRunner, base: &Path) -> SimulationReport {
    let start = Instant::now();
    let schematic = with_suffix(base, ".asc");
    let netlist = with_suffix(base, ".net");
    let artifact = artifact_path(base);
    let name = base.file_name().unwrap_or_default().to_string_lossy().into_owned();
    let _span = tracing::info_span!("simulate", %name).entered();

    tracing::info!("Simulation starting: {}.asc", name);
    if artifact.exists() {
        if let Err(e) = fs::remove_file(&artifact) {
            tracing::warn!(artifact = %artifact.display(), "could not remove stale raw file: {}", e);
        }
    }

    let status = match run_stages(runner, &schematic, &netlist) {
        Err((stage, e)) => SimulationStatus::Failed {
            stage,
            message: e.to_string(),
        },
        Ok(()) => match fs::metadata(&artifact) {
            Ok(meta) if meta.len() > 0 => SimulationStatus::Produced { bytes: meta.len() },
            Ok(_) => SimulationStatus::Empty,
            Err(_) => SimulationStatus::Missing,
        },
    };

    match &status {
        SimulationStatus::Produced { bytes } => tracing::info!(
            "Simulation finished: {}.raw created ({:.1} kB)",
            name,
            *bytes as f64 / 1000.0
        ),
        SimulationStatus::Missing | SimulationStatus::Empty => {
            tracing::warn!("{}.raw was not created. Simulation may have failed.", name)
        }
        SimulationStatus::Failed { stage, message } => {
            tracing::warn!("{} failed for {}.asc: {}", stage, name, message)
        }
    }

    SimulationReport {
        base: base.to_path_buf(),
        artifact,
        status,
        elapsed: start.elapsed(),
    }
}

fn run_stages(
    runner: &dyn SimulatorRunner,
    schematic: &Path,
    netlist: &Path,
) -> std::result::Result<(), (Stage, LtsweepError)> {
    runner
        .generate_netlist(schematic)
        .map_err(|e| (Stage::Netlist, e))?;
    runner
        .run_batch_simulation(netlist)
        .map_err(|e| (Stage::Batch, e))
}
