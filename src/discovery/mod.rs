//! Test discovery
//!
//! Finds test files under the suite root, reads test lists, and selects the
//! chunk of the run list this invocation is responsible for.

mod chunk;
mod files;

pub use chunk::{ChunkMode, ChunkSelection, ChunkSpec};
pub use files::{gather_test_files, read_fingerprint, read_test_lists};
