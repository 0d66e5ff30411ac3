use crate::error::{ExtractorError, Result};
use crate::extractor::markdown::{language_tag_for, render_file_section};
use crate::scanner::policy::ExtractionPolicy;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    /// Descend into every non-excluded subdirectory.
    Recursive,
    /// Immediate child files only.
    FilesOnly,
}

/// Content and statistics gathered from one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionResult {
    #[serde(skip)]
    pub markdown_body: String,
    pub file_count: usize,
    pub char_count: usize,
    pub word_count: usize,
    /// Matched the policy but were not valid UTF-8 text.
    pub skipped_undecodable: usize,
    /// Matched the policy but could not be opened or read.
    pub skipped_unreadable: usize,
}

impl ExtractionResult {
    pub fn push_file(&mut self, relative_path: &str, language: &str, content: &str) {
        self.markdown_body
            .push_str(&render_file_section(relative_path, language, content));
        self.file_count += 1;
        self.char_count += content.chars().count();
        self.word_count += content.split_whitespace().count();
    }

    pub fn is_empty(&self) -> bool {
        self.file_count == 0
    }
}

struct Candidate {
    path: PathBuf,
    relative: PathBuf,
}

pub struct FolderWalker<'a> {
    policy: &'a ExtractionPolicy,
}

impl<'a> FolderWalker<'a> {
    pub fn new(policy: &'a ExtractionPolicy) -> Self {
        Self { policy }
    }

    /// Walks `root` and renders every qualifying file in relative-path order.
    ///
    /// Any directory-level error fails the whole walk. Unreadable or
    /// undecodable files are skipped and counted.
    pub fn walk(&self, root: &Path, mode: WalkMode) -> Result<ExtractionResult> {
        if !root.is_dir() {
            return Err(ExtractorError::Walk {
                path: root.display().to_string(),
                message: "folder does not exist or is not a directory".to_string(),
            });
        }

        let mut candidates = self.collect_candidates(root, mode)?;
        candidates.sort_by(|a, b| a.relative.cmp(&b.relative));

        let mut result = ExtractionResult::default();
        for candidate in &candidates {
            self.extract_file(candidate, &mut result);
        }

        tracing::debug!(
            "Walked {} ({:?}): {} file(s), {} undecodable, {} unreadable",
            root.display(),
            mode,
            result.file_count,
            result.skipped_undecodable,
            result.skipped_unreadable
        );

        Ok(result)
    }

    fn collect_candidates(&self, root: &Path, mode: WalkMode) -> Result<Vec<Candidate>> {
        let max_depth = match mode {
            WalkMode::Recursive => usize::MAX,
            WalkMode::FilesOnly => 1,
        };

        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| self.should_enter(e));

        let mut candidates = Vec::new();

        for entry in walker {
            let entry = entry?;

            if !entry.file_type().is_file() {
                continue;
            }

            let Some(file_name) = entry.file_name().to_str() else {
                tracing::debug!("Skipping non UTF-8 filename: {}", entry.path().display());
                continue;
            };

            if !self.policy.matches_name(file_name) {
                continue;
            }

            let size = entry.metadata()?.len();
            if !self.policy.is_size_allowed(size) {
                tracing::debug!(
                    "Skipping {} ({} bytes exceeds size limit)",
                    entry.path().display(),
                    size
                );
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| ExtractorError::Walk {
                    path: entry.path().display().to_string(),
                    message: format!("not inside {}", root.display()),
                })?
                .to_path_buf();

            candidates.push(Candidate {
                path: entry.path().to_path_buf(),
                relative,
            });
        }

        Ok(candidates)
    }

    fn should_enter(&self, entry: &DirEntry) -> bool {
        // The unit root itself is never pruned, only what lies below it.
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }

        match entry.file_name().to_str() {
            Some(name) => self.policy.should_descend(name),
            None => false,
        }
    }

    fn extract_file(&self, candidate: &Candidate, result: &mut ExtractionResult) {
        let bytes = match fs::read(&candidate.path) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!("Could not read {}: {}", candidate.path.display(), err);
                result.skipped_unreadable += 1;
                return;
            }
        };

        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(_) => {
                tracing::warn!("Skipping undecodable file {}", candidate.path.display());
                result.skipped_undecodable += 1;
                return;
            }
        };

        let relative = display_relative(&candidate.relative);
        result.push_file(&relative, language_tag_for(&candidate.path), &content);
    }
}

/// Relative path with `/` separators regardless of platform.
pub fn display_relative(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;
    use std::fs;
    use tempfile::TempDir;

    fn policy() -> ExtractionPolicy {
        ExtractionPolicy::new(&PolicyConfig::default())
    }

    #[test]
    fn test_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let policy = policy();
        let result = FolderWalker::new(&policy)
            .walk(temp_dir.path(), WalkMode::Recursive)
            .unwrap();

        assert_eq!(result.file_count, 0);
        assert!(result.is_empty());
        assert!(result.markdown_body.is_empty());
    }

    #[test]
    fn test_excluded_directory_is_never_entered() {
        let temp_dir = TempDir::new().unwrap();
        let hidden = temp_dir.path().join("node_modules").join("lib");
        fs::create_dir_all(&hidden).unwrap();
        fs::write(hidden.join("index.js"), "module.exports = 1;").unwrap();

        let policy = policy();
        let result = FolderWalker::new(&policy)
            .walk(temp_dir.path(), WalkMode::Recursive)
            .unwrap();

        assert_eq!(result.file_count, 0);
    }

    #[test]
    fn test_excluded_directory_at_any_depth() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b").join(".git");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("config.toml"), "x = 1").unwrap();
        fs::write(temp_dir.path().join("a").join("keep.rs"), "fn keep() {}").unwrap();

        let policy = policy();
        let result = FolderWalker::new(&policy)
            .walk(temp_dir.path(), WalkMode::Recursive)
            .unwrap();

        assert_eq!(result.file_count, 1);
        assert!(result.markdown_body.contains("## `a/keep.rs`"));
    }

    #[test]
    fn test_recursive_walk_statistics_and_order() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::write(root.join("b").join("z.py"), "print('hi')\n").unwrap();
        fs::write(root.join("a.md"), "# Title\n\nsome words here\n").unwrap();
        fs::write(root.join("image.png"), [0u8, 1, 2]).unwrap();
        fs::write(root.join("Dockerfile"), "FROM rust\n").unwrap();

        let policy = policy();
        let result = FolderWalker::new(&policy)
            .walk(root, WalkMode::Recursive)
            .unwrap();

        assert_eq!(result.file_count, 3);
        assert_eq!(result.word_count, 2 + 5 + 1);
        assert_eq!(result.char_count, 10 + 25 + 12);

        let body = &result.markdown_body;
        let docker = body.find("## `Dockerfile`").unwrap();
        let a = body.find("## `a.md`").unwrap();
        let z = body.find("## `b/z.py`").unwrap();
        assert!(docker < a && a < z);
        assert!(body.contains("```python\nprint('hi')\n```"));
        assert!(body.contains("```\nFROM rust\n```"));
    }

    #[test]
    fn test_files_only_mode_skips_subdirectories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src").join("lib.rs"), "pub fn f() {}").unwrap();
        fs::write(root.join("Cargo.toml"), "[package]").unwrap();

        let policy = policy();
        let result = FolderWalker::new(&policy)
            .walk(root, WalkMode::FilesOnly)
            .unwrap();

        assert_eq!(result.file_count, 1);
        assert!(result.markdown_body.contains("## `Cargo.toml`"));
        assert!(!result.markdown_body.contains("lib.rs"));
    }

    #[test]
    fn test_size_boundary() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("at_limit.txt"), vec![b'a'; 1_048_576]).unwrap();
        fs::write(root.join("below_limit.txt"), vec![b'a'; 1_048_575]).unwrap();

        let policy = policy();
        assert!(policy.excludes_large_files());
        let result = FolderWalker::new(&policy)
            .walk(root, WalkMode::Recursive)
            .unwrap();

        assert_eq!(result.file_count, 1);
        assert!(result.markdown_body.contains("below_limit.txt"));
        assert!(!result.markdown_body.contains("at_limit.txt"));
    }

    #[test]
    fn test_undecodable_file_is_counted_separately() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("binary.txt"), [0xffu8, 0xfe, 0x00, 0x80]).unwrap();
        fs::write(root.join("text.txt"), "hello").unwrap();

        let policy = policy();
        let result = FolderWalker::new(&policy)
            .walk(root, WalkMode::Recursive)
            .unwrap();

        assert_eq!(result.file_count, 1);
        assert_eq!(result.skipped_undecodable, 1);
        assert_eq!(result.skipped_unreadable, 0);
    }

    #[test]
    fn test_file_removed_before_read_is_counted_unreadable() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("gone.txt"), "soon deleted").unwrap();
        let candidate = Candidate {
            path: root.join("gone.txt"),
            relative: PathBuf::from("gone.txt"),
        };
        fs::remove_file(&candidate.path).unwrap();

        let policy = policy();
        let mut result = ExtractionResult::default();
        FolderWalker::new(&policy).extract_file(&candidate, &mut result);

        assert_eq!(result.skipped_unreadable, 1);
        assert_eq!(result.skipped_undecodable, 0);
        assert_eq!(result.file_count, 0);
        assert!(result.markdown_body.is_empty());
    }

    #[test]
    fn test_missing_root_fails() {
        let temp_dir = TempDir::new().unwrap();
        let policy = policy();
        let result = FolderWalker::new(&policy)
            .walk(&temp_dir.path().join("gone"), WalkMode::Recursive);

        assert!(matches!(result, Err(ExtractorError::Walk { .. })));
    }

    #[test]
    fn test_output_is_reproducible() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for name in ["c.rs", "a.rs", "b.rs"] {
            fs::write(root.join(name), format!("// {}\n", name)).unwrap();
        }

        let policy = policy();
        let walker = FolderWalker::new(&policy);
        let first = walker.walk(root, WalkMode::Recursive).unwrap();
        let second = walker.walk(root, WalkMode::Recursive).unwrap();

        assert_eq!(first, second);
    }
}
