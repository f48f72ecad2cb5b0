//! Shared fixtures: a fake simulator and a small schematic.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ltsweep::config::{Config, NamingConvention, OutputMode};
use ltsweep::error::Result;
use ltsweep::schematic::get_parameters;
use ltsweep::simulator::SimulatorRunner;

pub const SCHEMATIC: &str = "\
Version 4
SHEET 1 880 680
WIRE 80 96 32 96
SYMBOL res 96 80 R0
SYMATTR InstName R1
SYMATTR Value {R}
TEXT -88 264 Left 2 !.param R=1k C=10n
TEXT -88 300 Left 2 !.tran 0 1m 0
";

/// Stands in for LTspice. The netlist it "generates" holds the schematic's
/// parameters, and the raw file it writes has 3 channels and 2 points with
/// those parameters as the value of channel 1.
#[derive(Default)]
pub struct FakeSimulator {
    /// Number of upcoming batch runs that write no raw file.
    pub failing_batches: Cell<usize>,
    /// Number of upcoming batch runs that leave a zero-byte raw file.
    pub empty_batches: Cell<usize>,
    pub calls: RefCell<Vec<String>>,
}

impl FakeSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn never_producing() -> Self {
        let sim = Self::default();
        sim.failing_batches.set(usize::MAX);
        sim
    }

    pub fn always_empty() -> Self {
        let sim = Self::default();
        sim.empty_batches.set(usize::MAX);
        sim
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl SimulatorRunner for FakeSimulator {
    fn generate_netlist(&self, schematic: &Path) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("-netlist {}", schematic.display()));
        let params = get_parameters(schematic)?;
        fs::write(schematic.with_extension("net"), params.join(","))?;
        Ok(())
    }

    fn run_batch_simulation(&self, netlist: &Path) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("-b -ascii {}", netlist.display()));
        let failing = self.failing_batches.get();
        if failing > 0 {
            self.failing_batches.set(failing - 1);
            return Ok(());
        }
        let empty = self.empty_batches.get();
        if empty > 0 {
            self.empty_batches.set(empty - 1);
            fs::write(netlist.with_extension("raw"), "")?;
            return Ok(());
        }
        let label = fs::read_to_string(netlist)?;
        fs::write(netlist.with_extension("raw"), raw_file(&label))?;
        Ok(())
    }
}

/// ASCII raw file with channels `time`, `V(out)`, `I(R1)` and two points.
pub fn raw_file(label: &str) -> String {
    format!(
        "Title: * fake.asc\n\
         Date: Thu Mar  7 10:00:00 2024\n\
         Plotname: Transient Analysis\n\
         Flags: real forward\n\
         No. Variables: 3\n\
         No. Points: 2\n\
         Offset:   0.0000000000000000e+000\n\
         Command: fake\n\
         Variables:\n\
         \t0\ttime\ttime\n\
         \t1\tV(out)\tvoltage\n\
         \t2\tI(R1)\tdevice_current\n\
         Values:\n\
         0\t\t0.0\n\
         \t\t{label}\n\
         \t\t1e-3\n\
         1\t\t1.0\n\
         \t\t{label}\n\
         \t\t2e-3\n"
    )
}

/// Writes `circuit.asc` and an `out/` directory into `dir`.
pub fn setup(dir: &Path, output: OutputMode, naming: NamingConvention) -> Config {
    fs::write(dir.join("circuit.asc"), SCHEMATIC).unwrap();
    fs::create_dir(dir.join("out")).unwrap();

    let variables: BTreeMap<String, usize> = [("time".to_string(), 0), ("V_out".to_string(), 1)]
        .into_iter()
        .collect();
    Config {
        schematic: dir.join("circuit.asc"),
        output_dir: dir.join("out"),
        variables,
        ordering: vec![1, 0],
        naming,
        output,
        ..Config::default()
    }
}
