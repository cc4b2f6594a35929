//! Test expectations
//!
//! Parses expectation files and answers "what is this test expected to do"
//! for the runner.

mod lookup;
mod parser;

pub use lookup::TestExpectations;
pub use parser::strip_comments;
