//! Extraction of selected channels from LTspice ASCII raw files.
//!
//! An ASCII raw file starts with a line-oriented header:
//!
//! ```text
//! Title: * C:\sim\rc.asc
//! Date: Thu Mar  7 10:00:00 2024
//! Plotname: Transient Analysis
//! Flags: real forward
//! No. Variables: 3
//! No. Points: 4
//! Offset:   0.0000000000000000e+000
//! Command: Linear Technology Corporation LTspice XVII
//! Variables:
//! 	0	time	time
//! 	1	V(n001)	voltage
//! 	2	I(R1)	device_current
//! Values:
//! ```
//!
//! followed by one line per (point, channel) pair, points in order and
//! channels in index order within a point. The value is the last
//! tab-separated field of each line.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{check_permutation, Config};
use crate::encoding::decode_text;
use crate::error::{LtsweepError, Result};
use crate::output::{write_atomic, write_table};
use crate::simulator::{simulate, SimulatorRunner};

/// Header line holding the channel count.
pub const CHANNEL_COUNT_LINE: usize = 4;
/// Header line holding the point count.
pub const POINT_COUNT_LINE: usize = 5;
const CHANNEL_COUNT_LABEL: &str = "No. Variables:";
const POINT_COUNT_LABEL: &str = "No. Points:";
const VALUES_MARKER: &str = "Values:";

/// Which channels to keep and in what column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSelection {
    /// `(index, name)` sorted by index.
    channels: Vec<(usize, String)>,
    /// Permutation over `channels`; empty keeps index order.
    ordering: Vec<usize>,
}

impl ChannelSelection {
    pub fn new(variables: &BTreeMap<String, usize>, ordering: &[usize]) -> Result<Self> {
        let mut channels: Vec<(usize, String)> = variables
            .iter()
            .map(|(name, &index)| (index, name.clone()))
            .collect();
        channels.sort();
        if channels.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(LtsweepError::Config(
                "two channels share the same index".to_string(),
            ));
        }
        check_permutation(ordering, channels.len())?;
        Ok(Self {
            channels,
            ordering: ordering.to_vec(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.variables, &config.ordering)
    }

    /// Selection for writing tables, which needs at least one channel.
    pub fn for_table(config: &Config) -> Result<Self> {
        let selection = Self::from_config(config)?;
        if selection.is_empty() {
            return Err(LtsweepError::Config(
                "writing a table needs at least one entry in [variables]".to_string(),
            ));
        }
        Ok(selection)
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.channels.binary_search_by_key(&index, |(i, _)| *i).is_ok()
    }

    fn max_index(&self) -> Option<usize> {
        self.channels.last().map(|(i, _)| *i)
    }

    /// Output column names: index order, then the permutation.
    pub fn column_names(&self) -> Vec<String> {
        let names: Vec<String> = self.channels.iter().map(|(_, n)| n.clone()).collect();
        self.reorder(names)
    }

    /// Apply the permutation to one row of index-ordered fields.
    pub fn reorder(&self, fields: Vec<String>) -> Vec<String> {
        if self.ordering.is_empty() {
            return fields;
        }
        self.ordering.iter().map(|&i| fields[i].clone()).collect()
    }
}

/// Values of the selected channels, one row per complete point.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub channel_count: usize,
    pub point_count: usize,
    /// Column names after reordering.
    pub columns: Vec<String>,
    /// Rows with fields reordered like `columns`.
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy)]
enum ParseState {
    ReadingHeader,
    /// Body starts at line `first_line`; each point spans `channels` lines.
    ReadingBody {
        first_line: usize,
        channels: usize,
        points: usize,
    },
    Done,
}

/// Parse raw file text and keep only the selected channels.
///
/// Reading stops after the number of points announced in the header. A
/// trailing partial point (fewer than N body lines) is dropped.
pub fn parse_raw(text: &str, selection: &ChannelSelection) -> Result<RawTable> {
    let mut state = ParseState::ReadingHeader;
    let mut channel_count: Option<usize> = None;
    let mut point_count: Option<usize> = None;
    let mut record: Vec<String> = Vec::with_capacity(selection.channels.len());
    let mut rows: Vec<Vec<String>> = Vec::new();

    for (line_num, line) in text.lines().enumerate() {
        match state {
            ParseState::ReadingHeader => {
                if line_num == CHANNEL_COUNT_LINE {
                    channel_count = Some(header_count(line, CHANNEL_COUNT_LABEL, line_num)?);
                } else if line_num == POINT_COUNT_LINE {
                    point_count = Some(header_count(line, POINT_COUNT_LABEL, line_num)?);
                }
                if line.starts_with(VALUES_MARKER) {
                    let (channels, points) = body_shape(channel_count, point_count, selection)?;
                    state = if points == 0 {
                        ParseState::Done
                    } else {
                        ParseState::ReadingBody {
                            first_line: line_num + 1,
                            channels,
                            points,
                        }
                    };
                }
            }
            ParseState::ReadingBody {
                first_line,
                channels,
                points,
            } => {
                let k = (line_num - first_line) % channels;
                if selection.contains(k) {
                    let value = line.rsplit('\t').next().unwrap_or(line);
                    record.push(value.to_string());
                }
                if k == channels - 1 {
                    rows.push(selection.reorder(std::mem::take(&mut record)));
                    if rows.len() == points {
                        state = ParseState::Done;
                    }
                }
            }
            ParseState::Done => break,
        }
    }

    match state {
        ParseState::ReadingHeader => {
            return Err(LtsweepError::RawFile(format!(
                "'{}' marker not found; not an ASCII raw file",
                VALUES_MARKER
            )));
        }
        ParseState::ReadingBody { points, .. } => {
            if !record.is_empty() {
                tracing::debug!(fields = record.len(), "dropping incomplete trailing point");
            }
            tracing::warn!(
                expected = points,
                found = rows.len(),
                "raw file ended before the announced number of points"
            );
        }
        ParseState::Done => {}
    }

    Ok(RawTable {
        channel_count: channel_count.unwrap_or_default(),
        point_count: point_count.unwrap_or_default(),
        columns: selection.column_names(),
        rows,
    })
}

fn header_count(line: &str, label: &str, line_num: usize) -> Result<usize> {
    if !line.starts_with(label) {
        return Err(LtsweepError::RawFile(format!(
            "header line {} should start with '{}', found '{}'",
            line_num, label, line
        )));
    }
    let token = line.split_whitespace().last().unwrap_or_default();
    token.parse().map_err(|_| {
        LtsweepError::RawFile(format!("invalid count '{}' on header line {}", token, line_num))
    })
}

fn body_shape(
    channel_count: Option<usize>,
    point_count: Option<usize>,
    selection: &ChannelSelection,
) -> Result<(usize, usize)> {
    let (Some(channels), Some(points)) = (channel_count, point_count) else {
        return Err(LtsweepError::RawFile(format!(
            "'{}' reached before channel and point counts",
            VALUES_MARKER
        )));
    };
    if channels == 0 {
        return Err(LtsweepError::RawFile("raw file has no channels".to_string()));
    }
    if let Some(max) = selection.max_index() {
        if max >= channels {
            return Err(LtsweepError::RawFile(format!(
                "selected channel index {} but the raw file has only {} channels",
                max, channels
            )));
        }
    }
    Ok((channels, points))
}

/// Turns raw files into tab-separated tables.
pub struct WaveformExtractor<'a> {
    selection: ChannelSelection,
    runner: &'a dyn SimulatorRunner,
}

impl<'a> WaveformExtractor<'a> {
    pub fn new(selection: ChannelSelection, runner: &'a dyn SimulatorRunner) -> Self {
        Self { selection, runner }
    }

    pub fn selection(&self) -> &ChannelSelection {
        &self.selection
    }

    /// Extract `raw` into `output`, with `header` as the first line.
    ///
    /// If `raw` cannot be read the simulator is run once for its base path
    /// and the read retried. A destination that cannot be written is an
    /// [`LtsweepError::OutputPath`] error.
    pub fn extract(&self, raw: &Path, header: &str, output: &Path) -> Result<PathBuf> {
        let bytes = match fs::read(raw) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("File not found: {} ({})", raw.display(), e);
                simulate(self.runner, &raw.with_extension(""));
                fs::read(raw).map_err(|_| LtsweepError::MissingArtifact(raw.to_path_buf()))?
            }
        };

        tracing::info!("Cleaning up file: {}", raw.display());
        let table = parse_raw(&decode_text(&bytes), &self.selection)?;

        let mut contents = Vec::new();
        write_table(header, &table.columns, &table.rows, &mut contents)?;
        write_atomic(output, &contents).map_err(|e| LtsweepError::OutputPath {
            path: output.to_path_buf(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            "Table created: {} ({:.1} kB, {} rows)",
            output.display(),
            contents.len() as f64 / 1000.0,
            table.rows.len()
        );
        Ok(output.to_path_buf())
    }
}
