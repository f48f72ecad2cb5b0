//! Results output formatting (tab-separated tables) and atomic file writes.

use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Write an extracted waveform table.
///
/// Format:
/// ```text
/// SPICE simulation result. Parameters: R=1k, C=10n
/// time	V_c	I_c
/// 0.000000000000000e+000	0.000000e+000	1.000000e-003
/// ```
///
/// A trailing newline is added to `header` if it lacks one.
pub fn write_table<W: Write>(
    header: &str,
    columns: &[String],
    rows: &[Vec<String>],
    writer: &mut W,
) -> io::Result<()> {
    if header.ends_with('\n') {
        write!(writer, "{}", header)?;
    } else {
        writeln!(writer, "{}", header)?;
    }
    writeln!(writer, "{}", columns.join("\t"))?;
    for row in rows {
        writeln!(writer, "{}", row.join("\t"))?;
    }
    Ok(())
}

/// Write `contents` to `target` through a temporary file in the same
/// directory, then rename it into place. Readers never observe a partial file.
pub fn write_atomic(target: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}
