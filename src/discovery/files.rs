//! Test file gathering

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::expectations::strip_comments;

/// File extensions treated as tests
const TEST_EXTENSIONS: &[&str] = &["html", "htm", "xhtml", "xht", "svg", "xml", "php", "pl", "js"];

/// Directories holding support files rather than tests
const SKIPPED_DIRS: &[&str] = &["resources", "script-tests", ".svn", ".git"];

/// Collect tests under `suite_root` matching `paths` (files or directories,
/// relative to the root). No paths means the whole suite.
///
/// Returns `/`-separated paths relative to the root, sorted and deduplicated.
pub fn gather_test_files(suite_root: &Path, paths: &[String]) -> Result<Vec<String>> {
    let mut found = BTreeSet::new();

    if paths.is_empty() {
        walk(suite_root, suite_root, &mut found)?;
    } else {
        for path in paths {
            let relative = path.trim().trim_matches('/');
            let full = suite_root.join(relative);
            if full.is_dir() {
                walk(suite_root, &full, &mut found)?;
            } else if full.is_file() {
                if is_test_file(&full) {
                    found.insert(relative_path(suite_root, &full));
                }
            } else {
                anyhow::bail!("No such test or directory: {}", full.display());
            }
        }
    }

    debug!("Gathered {} test files under {}", found.len(), suite_root.display());
    Ok(found.into_iter().collect())
}

fn walk(root: &Path, dir: &Path, found: &mut BTreeSet<String>) -> Result<()> {
    let entries = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e));

    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read directory: {}", dir.display()))?;
        if entry.file_type().is_file() && is_test_file(entry.path()) {
            found.insert(relative_path(root, entry.path()));
        }
    }
    Ok(())
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| SKIPPED_DIRS.contains(&name))
            .unwrap_or(false)
}

fn is_test_file(path: &Path) -> bool {
    let has_test_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| TEST_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false);
    let is_baseline = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.ends_with("-expected"))
        .unwrap_or(false);
    has_test_extension && !is_baseline
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Read test paths from list files, one per line, `//` comments allowed
pub fn read_test_lists(files: &[PathBuf]) -> Result<Vec<String>> {
    let mut tests = Vec::new();
    for file in files {
        let content = fs::read_to_string(file)
            .with_context(|| format!("Failed to read test list: {}", file.display()))?;
        tests.extend(
            content
                .lines()
                .map(strip_comments)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }
    Ok(tests)
}

/// Expected pixel checksum stored next to the test as `<name>-expected.checksum`
pub fn read_fingerprint(suite_root: &Path, test: &str) -> Result<Option<String>> {
    let path = suite_root.join(test);
    let stem = match path.file_stem().and_then(|s| s.to_str()) {
        Some(stem) => stem.to_string(),
        None => return Ok(None),
    };
    let checksum = path.with_file_name(format!("{stem}-expected.checksum"));

    match fs::read_to_string(&checksum) {
        Ok(content) => Ok(Some(content.trim().to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", checksum.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn sample_suite() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(root, "fast/css/a.html", "");
        touch(root, "fast/css/a-expected.txt", "");
        touch(root, "fast/css/a-expected.checksum", "deadbeef\n");
        touch(root, "fast/css/b.svg", "");
        touch(root, "fast/css/resources/helper.js", "");
        touch(root, "fast/js/c.html", "");
        touch(root, "fast/js/script-tests/c.js", "");
        touch(root, "http/tests/d.php", "");
        touch(root, "README", "");
        dir
    }

    #[test]
    fn test_gather_whole_suite() {
        let dir = sample_suite();
        let tests = gather_test_files(dir.path(), &[]).unwrap();
        assert_eq!(
            tests,
            vec![
                "fast/css/a.html",
                "fast/css/b.svg",
                "fast/js/c.html",
                "http/tests/d.php"
            ]
        );
    }

    #[test]
    fn test_gather_selected_paths() {
        let dir = sample_suite();
        let tests = gather_test_files(
            dir.path(),
            &["fast/js".to_string(), "/http/tests/d.php".to_string()],
        )
        .unwrap();
        assert_eq!(tests, vec!["fast/js/c.html", "http/tests/d.php"]);

        assert!(gather_test_files(dir.path(), &["missing".to_string()]).is_err());
    }

    #[test]
    fn test_gather_skips_support_dirs_at_any_depth() {
        let dir = sample_suite();
        touch(dir.path(), "fast/css/deep/resources/nested.html", "");
        touch(dir.path(), "fast/css/deep/e.xhtml", "");
        touch(dir.path(), ".git/hooks/x.html", "");

        let tests = gather_test_files(dir.path(), &["fast/css".to_string()]).unwrap();
        assert_eq!(
            tests,
            vec!["fast/css/a.html", "fast/css/b.svg", "fast/css/deep/e.xhtml"]
        );
        assert!(!gather_test_files(dir.path(), &[])
            .unwrap()
            .iter()
            .any(|t| t.starts_with(".git")));
    }

    #[test]
    fn test_read_test_lists() {
        let dir = tempdir().unwrap();
        let list = dir.path().join("list.txt");
        fs::write(&list, "// smoke tests\nfast/css\n\nhttp/tests/d.php // slow\n").unwrap();

        let tests = read_test_lists(&[list]).unwrap();
        assert_eq!(tests, vec!["fast/css", "http/tests/d.php"]);
    }

    #[test]
    fn test_read_fingerprint() {
        let dir = sample_suite();
        assert_eq!(
            read_fingerprint(dir.path(), "fast/css/a.html").unwrap(),
            Some("deadbeef".to_string())
        );
        assert_eq!(read_fingerprint(dir.path(), "fast/js/c.html").unwrap(), None);
    }
}
