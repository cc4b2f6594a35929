//! Chunk selection
//!
//! Lets several bots split one run list between them. `--run-chunk n:l`
//! wraps around the end of the list so every chunk has the same length;
//! `--run-part n:m` takes the nth of m consecutive parts.

use anyhow::Result;
use std::fmt;

/// How a chunk spec is interpreted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkMode {
    /// Chunk `n` of `l` equal chunks, wrapping at the end of the list
    Chunk,
    /// Part `n` (1-indexed) of `m` consecutive parts, no wrapping
    Part,
}

/// Parsed `n:l` chunk argument
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkSpec {
    pub mode: ChunkMode,
    pub index: usize,
    pub count: usize,
}

impl ChunkSpec {
    /// Parse `n:l`; fails at configuration time on malformed input
    pub fn parse(mode: ChunkMode, value: &str) -> Result<Self> {
        let (index, count) = value
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("invalid chunk '{value}': expected n:l"))?;
        let index: usize = index
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid chunk '{value}': bad chunk number"))?;
        let count: usize = count
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid chunk '{value}': bad chunk count"))?;

        if count == 0 {
            anyhow::bail!("invalid chunk '{value}': chunk count must be positive");
        }
        if mode == ChunkMode::Part && (index == 0 || index > count) {
            anyhow::bail!("invalid part '{value}': part number must be in 1..={count}");
        }

        Ok(Self { mode, index, count })
    }

    /// Select this chunk's slice of `tests`
    pub fn select(&self, tests: &[String]) -> Result<ChunkSelection> {
        let total = tests.len();
        if total == 0 {
            return Ok(ChunkSelection::empty());
        }

        // Round up so `count` chunks of `len` exactly tile the list
        let len = total.div_ceil(self.count);

        let (start, end, wrapped) = match self.mode {
            ChunkMode::Chunk => {
                // Same as (index * len) mod total without overflowing
                let start = ((self.index % total) * len) % total;
                let end = (start + len).min(total);
                (start, end, len - (end - start))
            }
            ChunkMode::Part => {
                if self.count > total {
                    anyhow::bail!(
                        "cannot split {} tests into {} parts",
                        total,
                        self.count
                    );
                }
                let start = (len * (self.index - 1)).min(total);
                let end = (start + len).min(total);
                (start, end, 0)
            }
        };

        let mut selected = tests[start..end].to_vec();
        selected.extend_from_slice(&tests[..wrapped]);

        Ok(ChunkSelection {
            tests: selected,
            start,
            end,
            wrapped,
            total,
        })
    }
}

/// Outcome of chunk selection
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkSelection {
    pub tests: Vec<String>,
    pub start: usize,
    pub end: usize,
    /// Tests taken from the start of the list to fill a partial last chunk
    pub wrapped: usize,
    pub total: usize,
}

impl ChunkSelection {
    fn empty() -> Self {
        Self {
            tests: Vec::new(),
            start: 0,
            end: 0,
            wrapped: 0,
            total: 0,
        }
    }
}

impl fmt::Display for ChunkSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Running: {} tests (chunk slice [{}:{}] of {})",
            self.end - self.start,
            self.start,
            self.end,
            self.total
        )?;
        if self.wrapped > 0 {
            write!(f, "\n   last chunk is partial, appending [0:{}]", self.wrapped)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t{i:03}.html")).collect()
    }

    #[test]
    fn test_chunk_of_even_split() {
        let tests = numbered(100);
        let spec = ChunkSpec::parse(ChunkMode::Chunk, "3:5").unwrap();
        let selection = spec.select(&tests).unwrap();

        assert_eq!(selection.start, 60);
        assert_eq!(selection.end, 80);
        assert_eq!(selection.wrapped, 0);
        assert_eq!(selection.tests, tests[60..80].to_vec());
    }

    #[test]
    fn test_chunk_index_wraps_modulo_total() {
        let tests = numbered(100);
        let selection = ChunkSpec::parse(ChunkMode::Chunk, "5:5")
            .unwrap()
            .select(&tests)
            .unwrap();
        assert_eq!(selection.start, 0);
        assert_eq!(selection.tests, tests[0..20].to_vec());
    }

    #[test]
    fn test_partial_last_chunk_wraps_to_start() {
        let tests = numbered(10);
        // len = ceil(10 / 3) = 4; start = (2 * 4) % 10 = 8
        let selection = ChunkSpec::parse(ChunkMode::Chunk, "2:3")
            .unwrap()
            .select(&tests)
            .unwrap();

        assert_eq!((selection.start, selection.end, selection.wrapped), (8, 10, 2));
        assert_eq!(
            selection.tests,
            vec!["t008.html", "t009.html", "t000.html", "t001.html"]
        );
        assert!(selection.to_string().contains("appending [0:2]"));
    }

    #[test]
    fn test_huge_chunk_number() {
        let tests = numbered(7);
        // u64::MAX mod 7 = 1, so the start is (1 * 4) mod 7
        let selection = ChunkSpec::parse(ChunkMode::Chunk, "18446744073709551615:2")
            .unwrap()
            .select(&tests)
            .unwrap();

        assert_eq!((selection.start, selection.end, selection.wrapped), (4, 7, 1));
        assert_eq!(
            selection.tests,
            vec!["t004.html", "t005.html", "t006.html", "t000.html"]
        );
    }

    #[test]
    fn test_part_selection() {
        let tests = numbered(10);
        let first = ChunkSpec::parse(ChunkMode::Part, "1:3")
            .unwrap()
            .select(&tests)
            .unwrap();
        assert_eq!(first.tests, tests[0..4].to_vec());

        let last = ChunkSpec::parse(ChunkMode::Part, "3:3")
            .unwrap()
            .select(&tests)
            .unwrap();
        assert_eq!(last.tests, tests[8..10].to_vec());
        assert_eq!(last.wrapped, 0);
    }

    #[test]
    fn test_invalid_specs() {
        assert!(ChunkSpec::parse(ChunkMode::Chunk, "3").is_err());
        assert!(ChunkSpec::parse(ChunkMode::Chunk, "a:5").is_err());
        assert!(ChunkSpec::parse(ChunkMode::Chunk, "1:0").is_err());
        assert!(ChunkSpec::parse(ChunkMode::Part, "0:3").is_err());
        assert!(ChunkSpec::parse(ChunkMode::Part, "4:3").is_err());

        let too_many_parts = ChunkSpec::parse(ChunkMode::Part, "1:5").unwrap();
        assert!(too_many_parts.select(&numbered(3)).is_err());
    }

    #[test]
    fn test_empty_list() {
        let selection = ChunkSpec::parse(ChunkMode::Chunk, "1:4")
            .unwrap()
            .select(&[])
            .unwrap();
        assert!(selection.tests.is_empty());
    }

    #[test]
    fn test_display() {
        let selection = ChunkSpec::parse(ChunkMode::Chunk, "3:5")
            .unwrap()
            .select(&numbered(100))
            .unwrap();
        assert_eq!(
            selection.to_string(),
            "Running: 20 tests (chunk slice [60:80] of 100)"
        );
    }
}
