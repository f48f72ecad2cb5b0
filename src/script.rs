//! Sweep script parser.
//!
//! # Supported syntax
//!
//! ```text
//! # comment line
//! set NAME VALUE          (rewrite NAME in the base schematic)
//! run NAME VALUE...       (sweep NAME over the listed values)
//! ```
//!
//! Keywords are case-insensitive. Blank lines are ignored. Any other line
//! makes the whole script invalid.

use std::path::Path;

use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take_while1};
use nom::character::complete::space1;
use nom::combinator::{all_consuming, value};
use nom::multi::separated_list1;
use nom::IResult;
use nom::Parser;

use crate::error::{LtsweepError, Result};

/// One script command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Set { parameter: String, value: String },
    Run { parameter: String, values: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Set,
    Run,
}

/// Parse script text. Fails on the first bad line; no partial result.
pub fn parse(input: &str) -> Result<Vec<Operation>> {
    let mut operations = Vec::new();

    for (line_num, raw_line) in input.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (_, op) = all_consuming(operation)
            .parse(line)
            .map_err(|_| syntax_error(line_num, line))?;
        operations.push(op);
    }

    Ok(operations)
}

/// Read and parse a script file.
pub fn parse_file(path: &Path) -> Result<Vec<Operation>> {
    let input = std::fs::read_to_string(path)?;
    parse(&input)
}

fn syntax_error(line_num: usize, line: &str) -> LtsweepError {
    let command = line.split_whitespace().next().unwrap_or_default();
    let message = match keyword(command) {
        Ok(("", Keyword::Set)) => format!("'set' needs a parameter and a value: {}", line),
        Ok(("", Keyword::Run)) => {
            format!("'run' needs a parameter and at least one value: {}", line)
        }
        _ => format!("unknown command '{}'", command),
    };
    LtsweepError::Script {
        line: line_num + 1,
        message,
    }
}

// ---------------------------------------------------------------------------
// Token parsers
// ---------------------------------------------------------------------------

fn keyword(input: &str) -> IResult<&str, Keyword> {
    alt((
        value(Keyword::Set, tag_no_case("set")),
        value(Keyword::Run, tag_no_case("run")),
    ))
    .parse(input)
}

/// Anything up to the next whitespace.
fn token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace()).parse(input)
}

/// `set NAME VALUE [ignored...]` or `run NAME VALUE...`
fn operation(input: &str) -> IResult<&str, Operation> {
    let (rest, (kw, _, parameter, _, values)) = (
        keyword,
        space1,
        token,
        space1,
        separated_list1(space1, token),
    )
        .parse(input)?;

    let parameter = parameter.to_string();
    let op = match kw {
        Keyword::Set => Operation::Set {
            parameter,
            value: values[0].to_string(),
        },
        Keyword::Run => Operation::Run {
            parameter,
            values: values.iter().map(|v| v.to_string()).collect(),
        },
    };
    Ok((rest, op))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(parameter: &str, value: &str) -> Operation {
        Operation::Set {
            parameter: parameter.into(),
            value: value.into(),
        }
    }

    fn run(parameter: &str, values: &[&str]) -> Operation {
        Operation::Run {
            parameter: parameter.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_set_and_run() {
        let ops = parse("set R1 100\nrun R1 1 2 3\n").unwrap();
        assert_eq!(ops, vec![set("R1", "100"), run("R1", &["1", "2", "3"])]);
    }

    #[test]
    fn test_unknown_command() {
        let err = parse("frobnicate x\n").unwrap_err();
        match err {
            LtsweepError::Script { line, message } => {
                assert_eq!(line, 1);
                assert!(message.contains("frobnicate"));
            }
            other => panic!("expected Script error, got {:?}", other),
        }
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let script = "\
# sweep the load

#set R1 5
SET C1 10n
  # indented comment
Run R2 1k 2k\t4k
";
        let ops = parse(script).unwrap();
        assert_eq!(ops, vec![set("C1", "10n"), run("R2", &["1k", "2k", "4k"])]);
    }

    #[test]
    fn test_set_missing_value() {
        let err = parse("set R1\n").unwrap_err();
        assert!(err.to_string().contains("'set' needs"));
    }

    #[test]
    fn test_run_without_values() {
        let err = parse("set R1 1\nrun R1\n").unwrap_err();
        match err {
            LtsweepError::Script { line, .. } => assert_eq!(line, 2),
            other => panic!("expected Script error, got {:?}", other),
        }
    }

    #[test]
    fn test_no_partial_result() {
        assert!(parse("set R1 1\nrun R1 1 2\nbogus\n").is_err());
    }

    #[test]
    fn test_keyword_must_be_whole_token() {
        assert!(parse("settle R1 1\n").is_err());
        assert!(parse("runs R1 1\n").is_err());
    }

    #[test]
    fn test_set_ignores_extra_tokens() {
        assert_eq!(parse("set R1 100 200\n").unwrap(), vec![set("R1", "100")]);
    }

    #[test]
    fn test_empty_script() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("# only comments\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.txt");
        std::fs::write(&path, "run C1 1n 10n\n").unwrap();
        assert_eq!(parse_file(&path).unwrap(), vec![run("C1", &["1n", "10n"])]);
    }
}
