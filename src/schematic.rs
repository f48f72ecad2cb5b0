//! LTspice schematic (`.asc`) parameter editing and inspection.
//!
//! Parameters live in text annotation lines such as
//!
//! ```text
//! TEXT -88 264 Left 2 !.param R=1k C=10n
//! ```
//!
//! The editor works on raw bytes so legacy single-byte encodings pass through
//! untouched. Only the line terminator is normalised to `\n`.

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use crate::encoding::{decode_latin1, encode_latin1};
use crate::error::{LtsweepError, Result};
use crate::output::write_atomic;

/// First token of a text annotation line.
pub const TEXT_MARKER: &str = "TEXT";
/// Directive that introduces parameter bindings in an annotation.
pub const PARAM_DIRECTIVE: &str = "!.param";
/// Appended to the file stem of a rewritten schematic.
pub const GENERATED_SUFFIX: &str = "_generated";

/// `dir/circuit.asc` -> `dir/circuit_generated.asc`.
pub fn generated_path(schematic: &Path) -> PathBuf {
    let mut name = schematic.file_stem().unwrap_or_default().to_os_string();
    name.push(GENERATED_SUFFIX);
    if let Some(ext) = schematic.extension() {
        name.push(".");
        name.push(ext);
    }
    schematic.with_file_name(name)
}

/// Rewrite every `name=...` element of every text annotation line to
/// `name=value`. Other lines are copied with their terminator normalised.
pub fn rewrite_parameter(source: &[u8], name: &str, value: &str) -> Result<Vec<u8>> {
    let name_bytes = encode_latin1(name).ok_or_else(|| {
        LtsweepError::Config(format!("parameter name '{}' is not Latin-1 text", name))
    })?;
    let mut binding = name_bytes.clone();
    binding.push(b'=');
    binding.extend(encode_latin1(value).ok_or_else(|| {
        LtsweepError::Config(format!("parameter value '{}' is not Latin-1 text", value))
    })?);

    let mut out = Vec::with_capacity(source.len() + binding.len());
    for raw_line in source.split_inclusive(|&b| b == b'\n') {
        let line = strip_terminator(raw_line);
        let mut elements = line.split(|&b| b == b' ').peekable();
        let is_annotation = elements.peek() == Some(&TEXT_MARKER.as_bytes());
        if is_annotation {
            for (i, element) in elements.enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                if binding_name(element) == name_bytes.as_slice() {
                    out.extend_from_slice(&binding);
                } else {
                    out.extend_from_slice(element);
                }
            }
        } else {
            out.extend_from_slice(line);
        }
        out.push(b'\n');
    }
    Ok(out)
}

/// Set one parameter in `schematic`.
///
/// Without `overwrite` the result goes to the `_generated` sibling and the
/// original is left untouched. With `overwrite` the original is replaced.
/// A name that does not occur is not an error.
pub fn set_parameter<V: Display>(
    schematic: &Path,
    name: &str,
    value: V,
    overwrite: bool,
) -> Result<PathBuf> {
    let source = fs::read(schematic)?;
    let rewritten = rewrite_parameter(&source, name, &value.to_string())?;
    let target = if overwrite {
        schematic.to_path_buf()
    } else {
        generated_path(schematic)
    };
    write_atomic(&target, &rewritten)?;
    tracing::debug!(
        schematic = %schematic.display(),
        target = %target.display(),
        "set {}={}",
        name,
        value
    );
    Ok(target)
}

/// Every token following `!.param` on text annotation lines, in file order.
pub fn get_parameters(schematic: &Path) -> Result<Vec<String>> {
    let text = decode_latin1(&fs::read(schematic)?);
    Ok(parameters_in(&text))
}

/// Summary line used as the first line of extracted tables.
pub fn parameter_header(schematic: &Path) -> Result<String> {
    Ok(format!(
        "SPICE simulation result. Parameters: {}",
        get_parameters(schematic)?.join(", ")
    ))
}

fn parameters_in(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    for line in text.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.first() != Some(&TEXT_MARKER) {
            continue;
        }
        if let Some(pos) = tokens.iter().position(|t| *t == PARAM_DIRECTIVE) {
            found.extend(tokens[pos + 1..].iter().map(|t| t.to_string()));
        }
    }
    found
}

fn binding_name(element: &[u8]) -> &[u8] {
    element.split(|&b| b == b'=').next().unwrap_or(element)
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMATIC: &str = "\
Version 4
SHEET 1 880 680
WIRE 80 96 32 96
SYMBOL res 96 80 R0
SYMATTR InstName R1
SYMATTR Value {R}
TEXT -88 264 Left 2 !.param R=1k C=10n
TEXT -88 300 Left 2 !.tran 0 1m 0
";

    fn rewrite(source: &str, name: &str, value: &str) -> String {
        String::from_utf8(rewrite_parameter(source.as_bytes(), name, value).unwrap()).unwrap()
    }

    #[test]
    fn test_generated_path() {
        assert_eq!(
            generated_path(Path::new("dir/circuit.asc")),
            PathBuf::from("dir/circuit_generated.asc")
        );
        assert_eq!(
            generated_path(Path::new("circuit")),
            PathBuf::from("circuit_generated")
        );
    }

    #[test]
    fn test_rewrite_single_binding() {
        let out = rewrite(SCHEMATIC, "R", "2.2k");
        assert!(out.contains("TEXT -88 264 Left 2 !.param R=2.2k C=10n\n"));
        assert!(out.contains("SYMATTR Value {R}\n"));
    }

    #[test]
    fn test_rewrite_last_element_gets_terminator() {
        let out = rewrite(SCHEMATIC, "C", "47n");
        assert!(out.contains("!.param R=1k C=47n\nTEXT"));
    }

    #[test]
    fn test_rewrite_every_occurrence_on_line() {
        let out = rewrite("TEXT 0 0 Left 2 !.param R=1 R=2\n", "R", "5");
        assert_eq!(out, "TEXT 0 0 Left 2 !.param R=5 R=5\n");
    }

    #[test]
    fn test_rewrite_ignores_non_annotation_lines() {
        let out = rewrite("SYMATTR R=1\n", "R", "5");
        assert_eq!(out, "SYMATTR R=1\n");
    }

    #[test]
    fn test_rewrite_unknown_name_normalises_terminators_only() {
        let out = rewrite("Version 4\r\nTEXT 0 0 Left 2 !.param R=1\r\nWIRE 1 2 3 4", "Q", "5");
        assert_eq!(out, "Version 4\nTEXT 0 0 Left 2 !.param R=1\nWIRE 1 2 3 4\n");
    }

    #[test]
    fn test_rewrite_preserves_legacy_bytes() {
        let source = b"TEXT 0 0 Left 2 ;\xb5F note\nTEXT 0 0 Left 2 !.param C=1\xb5\n";
        let out = rewrite_parameter(source, "C", "2").unwrap();
        assert_eq!(out, b"TEXT 0 0 Left 2 ;\xb5F note\nTEXT 0 0 Left 2 !.param C=2\n");
    }

    #[test]
    fn test_rewrite_rejects_non_latin1_value() {
        assert!(rewrite_parameter(SCHEMATIC.as_bytes(), "R", "1\u{3a9}").is_err());
    }

    #[test]
    fn test_parameters_in() {
        let text = "TEXT 0 0 Left 2 !.param R=1k C=10n\n\nTEXT 0 0 Left 2 !.tran 1m\nTEXT 1 1 Left 2 !.param L=1u\n";
        assert_eq!(parameters_in(text), vec!["R=1k", "C=10n", "L=1u"]);
    }

    #[test]
    fn test_parameters_in_none() {
        assert!(parameters_in("Version 4\nSHEET 1 880 680\n").is_empty());
    }

    #[test]
    fn test_set_parameter_leaves_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("circuit.asc");
        fs::write(&path, SCHEMATIC).unwrap();

        let generated = set_parameter(&path, "R", 470, false).unwrap();
        assert_eq!(generated, dir.path().join("circuit_generated.asc"));
        assert_eq!(fs::read_to_string(&path).unwrap(), SCHEMATIC);
        assert_eq!(get_parameters(&generated).unwrap(), vec!["R=470", "C=10n"]);
    }

    #[test]
    fn test_set_parameter_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("circuit.asc");
        fs::write(&path, SCHEMATIC).unwrap();

        let target = set_parameter(&path, "C", "1u", true).unwrap();
        assert_eq!(target, path);
        assert_eq!(get_parameters(&path).unwrap(), vec!["R=1k", "C=1u"]);
        assert!(!dir.path().join("circuit_generated.asc").exists());
    }

    #[test]
    fn test_get_parameters_missing_file() {
        let err = get_parameters(Path::new("/nonexistent/circuit.asc")).unwrap_err();
        assert!(matches!(err, LtsweepError::Io(_)));
    }

    #[test]
    fn test_parameter_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("circuit.asc");
        fs::write(&path, SCHEMATIC).unwrap();
        assert_eq!(
            parameter_header(&path).unwrap(),
            "SPICE simulation result. Parameters: R=1k, C=10n"
        );
    }
}
