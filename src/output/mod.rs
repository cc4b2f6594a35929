//! Output formatting module
//!
//! Renders run results for the terminal or as JSON.

mod formatter;

pub use formatter::{OutputFormat, ResultFormatter};
