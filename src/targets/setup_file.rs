//! Setup files: one aim per line.
//!
//! ```text
//! # name  hz[gon]   v[gon]    target  prism
//! P1      12.3456   99.8765   0       0
//! Wall    210.0     101.2     1       -1
//! ```
//!
//! Lines starting with `#` and blank lines are skipped. The prism code is only
//! read for reflector targets.

use super::{Aim, Target};
use crate::error::SetupError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

fn parse_line(line: &str) -> Result<Option<Aim>, String> {
    if line.starts_with('#') {
        return Ok(None);
    }
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return Ok(None);
    }
    let &[name, hz, v, target, prism] = parts.as_slice() else {
        return Err(format!("expected 5 fields, found {}", parts.len()));
    };

    let angle = |s: &str, what: &str| {
        s.parse::<f64>()
            .map_err(|_| format!("{what} angle {s:?} is not a number"))
    };
    let code = |s: &str, what: &str| {
        s.parse::<i64>()
            .map_err(|_| format!("{what} code {s:?} is not an integer"))
    };

    let target =
        Target::from_codes(code(target, "target")?, code(prism, "prism")?).map_err(|e| e.to_string())?;
    Ok(Some(Aim::new(name, angle(hz, "hz")?, angle(v, "v")?, target)))
}

/// Parses setup-file content; `path` is only used for error messages.
pub fn parse(content: &str, path: &Path) -> Result<Vec<Aim>, SetupError> {
    let mut aims = Vec::new();
    for (index, line) in content.lines().enumerate() {
        match parse_line(line) {
            Ok(Some(aim)) => aims.push(aim),
            Ok(None) => {}
            Err(reason) => {
                return Err(SetupError::Line {
                    path: path.to_path_buf(),
                    line: index + 1,
                    reason,
                })
            }
        }
    }
    Ok(aims)
}

/// Reads and parses a setup file.
pub fn read(path: &Path) -> Result<Vec<Aim>, SetupError> {
    let content = std::fs::read_to_string(path).map_err(|source| SetupError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content, path)
}

/// Formats an aim as a setup-file line (without newline).
pub fn format_line(aim: &Aim) -> String {
    format!(
        "{} {} {} {} {}",
        aim.name,
        aim.hz,
        aim.v,
        aim.target.target_type().code(),
        aim.target.prism_code()
    )
}

/// Appends an aim to a setup file, creating it if needed.
///
/// Names containing whitespace are refused; they would not read back.
pub fn append(path: &Path, aim: &Aim) -> std::io::Result<()> {
    if aim.name.is_empty() || aim.name.chars().any(char::is_whitespace) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("aim name {:?} is empty or contains whitespace", aim.name),
        ));
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", format_line(aim))
}
