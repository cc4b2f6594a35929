//! Expectation file parser
//!
//! Line format: `[BUGnnn] [MODIFIERS...] : <path> = <OUTCOMES...>`, with
//! `//` starting a comment.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::{Expectation, ExpectedResult, Modifier};

/// Expectation parsing errors
#[derive(Error, Debug)]
pub enum ExpectationsError {
    #[error("Failed to read expectations file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} invalid expectation line(s):\n{}", .0.len(), format_lines(.0))]
    Invalid(Vec<LineError>),
}

/// A single malformed line
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LineError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

fn format_lines(errors: &[LineError]) -> String {
    errors
        .iter()
        .map(|e| format!("  {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One parsed entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpectationLine {
    pub path: String,
    pub expectation: Expectation,
}

/// Drop a trailing `//` comment
pub fn strip_comments(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => line[..idx].trim(),
        None => line.trim(),
    }
}

/// Normalize a test path or directory to `/`-separated, no leading or trailing slash
pub fn normalize_path(path: &str) -> String {
    path.trim()
        .replace('\\', "/")
        .trim_matches('/')
        .to_string()
}

/// Parse one line; `Ok(None)` for blank and comment-only lines
pub fn parse_line(line: &str) -> Result<Option<ExpectationLine>, String> {
    let line = strip_comments(line);
    if line.is_empty() {
        return Ok(None);
    }

    let (modifier_part, rest) = line
        .split_once(':')
        .ok_or_else(|| "missing ':' between modifiers and test path".to_string())?;
    let (path_part, outcome_part) = rest
        .split_once('=')
        .ok_or_else(|| "missing '=' between test path and outcomes".to_string())?;

    let path = normalize_path(path_part);
    if path.is_empty() {
        return Err("empty test path".to_string());
    }

    let mut modifiers = BTreeSet::new();
    for token in modifier_part.split_whitespace() {
        if token.to_uppercase().starts_with("BUG") {
            continue;
        }
        let modifier =
            Modifier::from_str(token).ok_or_else(|| format!("unknown modifier '{token}'"))?;
        modifiers.insert(modifier);
    }

    let mut results = BTreeSet::new();
    for token in outcome_part.split_whitespace() {
        let result =
            ExpectedResult::from_tag(token).ok_or_else(|| format!("unknown outcome '{token}'"))?;
        results.insert(result);
    }
    if results.is_empty() {
        return Err(format!("no outcomes listed for '{path}'"));
    }

    Ok(Some(ExpectationLine {
        path,
        expectation: Expectation { results, modifiers },
    }))
}
