use crate::config::PolicyConfig;
use std::collections::BTreeSet;
use std::path::Path;

pub const BYTES_PER_MB: f64 = 1_048_576.0;

/// Inclusion and exclusion rules for one batch.
///
/// Built once from a [`PolicyConfig`] and never mutated while a batch runs.
/// Extensions are stored lower-cased with their leading dot, allowed
/// filenames lower-cased; excluded directory and file names keep their case.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionPolicy {
    excluded_dirs: BTreeSet<String>,
    excluded_filenames: BTreeSet<String>,
    allowed_extensions: BTreeSet<String>,
    allowed_filenames: BTreeSet<String>,
    exclude_large_files: bool,
    max_file_size_mb: f64,
}

impl ExtractionPolicy {
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            excluded_dirs: config.excluded_dirs.clone(),
            excluded_filenames: config.excluded_filenames.clone(),
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
            allowed_filenames: config
                .allowed_filenames
                .iter()
                .map(|name| name.to_lowercase())
                .collect(),
            exclude_large_files: config.exclude_large_files,
            max_file_size_mb: config.max_file_size_mb,
        }
    }

    /// Adds a directory name to the pruned set. Used for the output directory.
    pub fn with_excluded_dir<S: Into<String>>(mut self, name: S) -> Self {
        self.excluded_dirs.insert(name.into());
        self
    }

    /// Exact, case-sensitive match on the directory's own name.
    pub fn should_descend(&self, dir_name: &str) -> bool {
        !self.excluded_dirs.contains(dir_name)
    }

    /// Name-based half of the file test: not excluded, and allowed by
    /// extension or by filename.
    pub fn matches_name(&self, file_name: &str) -> bool {
        if self.excluded_filenames.contains(file_name) {
            return false;
        }

        let lower = file_name.to_lowercase();

        if let Some(ext) = Path::new(&lower).extension().and_then(|e| e.to_str()) {
            if self.allowed_extensions.contains(&format!(".{}", ext)) {
                return true;
            }
        }

        self.allowed_filenames.contains(&lower)
    }

    /// The size limit is exclusive: a file of exactly the threshold is rejected.
    pub fn is_size_allowed(&self, size: u64) -> bool {
        !self.exclude_large_files || (size as f64) < self.max_file_size_bytes()
    }

    pub fn is_extractable(&self, file_name: &str, size: u64) -> bool {
        self.matches_name(file_name) && self.is_size_allowed(size)
    }

    pub fn max_file_size_bytes(&self) -> f64 {
        self.max_file_size_mb * BYTES_PER_MB
    }

    pub fn excluded_dirs(&self) -> &BTreeSet<String> {
        &self.excluded_dirs
    }

    pub fn allowed_extensions(&self) -> &BTreeSet<String> {
        &self.allowed_extensions
    }

    pub fn excludes_large_files(&self) -> bool {
        self.exclude_large_files
    }

    pub fn max_file_size_mb(&self) -> f64 {
        self.max_file_size_mb
    }
}

impl Default for ExtractionPolicy {
    fn default() -> Self {
        Self::new(&PolicyConfig::default())
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> PolicyConfig {
        PolicyConfig {
            excluded_dirs: [".git", "node_modules", "target"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            excluded_filenames: ["yarn.lock", ".env"].iter().map(|s| s.to_string()).collect(),
            allowed_extensions: [".rs", "md", ".JSON"].iter().map(|s| s.to_string()).collect(),
            allowed_filenames: ["Makefile", "dockerfile"].iter().map(|s| s.to_string()).collect(),
            exclude_large_files: true,
            max_file_size_mb: 1.0,
        }
    }

    #[test]
    fn test_extension_matching() {
        let policy = ExtractionPolicy::new(&create_test_config());

        assert!(policy.matches_name("main.rs"));
        assert!(policy.matches_name("README.md"));
        assert!(policy.matches_name("data.json"));

        // Case insensitivity on the filename
        assert!(policy.matches_name("LIB.RS"));
        assert!(policy.matches_name("notes.Md"));

        assert!(!policy.matches_name("image.png"));
        assert!(!policy.matches_name("archive.rs.bak"));
    }

    #[test]
    fn test_allowed_filenames() {
        let policy = ExtractionPolicy::new(&create_test_config());

        assert!(policy.matches_name("Makefile"));
        assert!(policy.matches_name("makefile"));
        assert!(policy.matches_name("Dockerfile"));
        assert!(!policy.matches_name("Jenkinsfile"));
    }

    #[test]
    fn test_excluded_filenames_are_case_sensitive() {
        let mut config = create_test_config();
        config.allowed_extensions.insert(".lock".to_string());
        let policy = ExtractionPolicy::new(&config);

        assert!(!policy.matches_name("yarn.lock"));
        assert!(policy.matches_name("Yarn.lock"));
    }

    #[test]
    fn test_dotfile_has_no_extension() {
        let mut config = create_test_config();
        config.allowed_extensions.insert(".gitignore".to_string());
        let policy = ExtractionPolicy::new(&config);

        // `.gitignore` is a bare name, only the filename allow-list can admit it
        assert!(!policy.matches_name(".gitignore"));
    }

    #[test]
    fn test_directory_exclusion() {
        let policy = ExtractionPolicy::new(&create_test_config());

        assert!(policy.should_descend("src"));
        assert!(policy.should_descend("Target"));
        assert!(!policy.should_descend("target"));
        assert!(!policy.should_descend(".git"));
    }

    #[test]
    fn test_size_threshold_is_exclusive() {
        let policy = ExtractionPolicy::new(&create_test_config());

        assert!(policy.is_size_allowed(0));
        assert!(policy.is_size_allowed(1_048_575));
        assert!(!policy.is_size_allowed(1_048_576));
        assert!(!policy.is_size_allowed(2 * 1_048_576));
    }

    #[test]
    fn test_size_limit_disabled() {
        let mut config = create_test_config();
        config.exclude_large_files = false;
        let policy = ExtractionPolicy::new(&config);

        assert!(policy.is_size_allowed(u64::MAX));
        assert!(policy.is_extractable("huge.rs", 50 * 1_048_576));
    }

    #[test]
    fn test_fractional_threshold() {
        let mut config = create_test_config();
        config.max_file_size_mb = 0.5;
        let policy = ExtractionPolicy::new(&config);

        assert!(policy.is_size_allowed(524_287));
        assert!(!policy.is_size_allowed(524_288));
    }

    #[test]
    fn test_predicate_is_deterministic() {
        let policy = ExtractionPolicy::new(&create_test_config());

        for (name, size) in [("a.rs", 10), ("b.png", 10), ("c.md", 2_000_000), ("Makefile", 1)] {
            assert_eq!(
                policy.is_extractable(name, size),
                policy.is_extractable(name, size)
            );
        }
    }

    #[test]
    fn test_with_excluded_dir() {
        let policy = ExtractionPolicy::new(&create_test_config()).with_excluded_dir("EXTRACTS");
        assert!(!policy.should_descend("EXTRACTS"));
        assert!(policy.excluded_dirs().contains("EXTRACTS"));
    }
}
