//! Parameter sweeps for LTspice schematics and extraction of the resulting
//! ASCII raw files into tab-separated tables.

pub mod config;
pub mod encoding;
pub mod error;
pub mod output;
pub mod rawfile;
pub mod schematic;
pub mod script;
pub mod simulator;
pub mod stats;
pub mod sweep;
