use crate::config::FILE_COUNT_WARNING_THRESHOLD;
use crate::error::{ExtractorError, Result};
use crate::extractor::markdown::{MarkdownAggregator, RunMetadata};
use crate::extractor::walker::{display_relative, ExtractionResult, FolderWalker, WalkMode};
use crate::scanner::canonicalizer::PathSetCanonicalizer;
use crate::scanner::policy::ExtractionPolicy;
use crate::scanner::selection::{resolve_root, ResolvedSelection};
use crate::ui::signals::GracefulShutdown;
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One folder (walked recursively) or the root's own files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionUnit {
    Folder(PathBuf),
    RootFiles,
}

impl ExtractionUnit {
    pub fn path<'p>(&'p self, root: &'p Path) -> &'p Path {
        match self {
            ExtractionUnit::Folder(path) => path,
            ExtractionUnit::RootFiles => root,
        }
    }

    pub fn walk_mode(&self) -> WalkMode {
        match self {
            ExtractionUnit::Folder(_) => WalkMode::Recursive,
            ExtractionUnit::RootFiles => WalkMode::FilesOnly,
        }
    }

    pub fn display_name(&self, root: &Path) -> String {
        match self {
            ExtractionUnit::Folder(path) => {
                display_relative(path.strip_prefix(root).unwrap_or(path))
            }
            ExtractionUnit::RootFiles => format!(
                "root [{}] (files in root folder only, excl. sub-folders)",
                root.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| root.display().to_string())
            ),
        }
    }

    /// Stem used for the output filename.
    pub fn file_stem(&self, root: &Path) -> String {
        match self {
            ExtractionUnit::Folder(_) => self.display_name(root),
            ExtractionUnit::RootFiles => "root".to_string(),
        }
    }
}

/// The ordered, non-overlapping units of one batch: folders in sorted path
/// order, then the root files unit if requested.
#[derive(Debug, Clone)]
pub struct ExtractionPlan {
    root: PathBuf,
    units: Vec<ExtractionUnit>,
}

impl ExtractionPlan {
    /// Relative folder paths are taken relative to `root`.
    pub fn new<I, P>(root: &Path, folders: I, include_root_files: bool) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let root = resolve_root(root)?;

        let mut absolute = Vec::new();
        for folder in folders {
            let folder = folder.as_ref();
            let joined = if folder.is_absolute() {
                folder.to_path_buf()
            } else {
                root.join(folder)
            };
            let resolved =
                joined
                    .canonicalize()
                    .map_err(|e| ExtractorError::InvalidSelection {
                        selection: folder.display().to_string(),
                        reason: e.to_string(),
                    })?;
            if !resolved.is_dir() {
                return Err(ExtractorError::InvalidSelection {
                    selection: folder.display().to_string(),
                    reason: "not a directory".to_string(),
                });
            }
            absolute.push(resolved);
        }

        let mut units: Vec<ExtractionUnit> = PathSetCanonicalizer::new(&root)
            .canonicalize(absolute)?
            .into_iter()
            .map(ExtractionUnit::Folder)
            .collect();

        if include_root_files {
            units.push(ExtractionUnit::RootFiles);
        }

        Ok(Self { root, units })
    }

    pub fn from_selection(root: &Path, selection: &ResolvedSelection) -> Result<Self> {
        Self::new(root, &selection.folders, selection.include_root_files)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn units(&self) -> &[ExtractionUnit] {
        &self.units
    }

    pub fn total_units(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub total_units: usize,
    pub completed_units: usize,
}

impl BatchProgress {
    pub fn new(total_units: usize) -> Self {
        Self {
            total_units,
            completed_units: 0,
        }
    }

    /// Counts one more unit as attempted, never past `total_units`.
    pub fn advance(&mut self) {
        if self.completed_units < self.total_units {
            self.completed_units += 1;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_units == self.total_units
    }

    pub fn percentage(&self) -> f64 {
        if self.total_units == 0 {
            100.0
        } else {
            (self.completed_units as f64 / self.total_units as f64) * 100.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Idle,
    Running,
    Finished,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitStatus {
    /// Document written, or computed only in dry-run mode.
    Extracted { output: PathBuf },
    /// Nothing matched the policy; no document is produced.
    Empty,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitReport {
    pub name: String,
    pub stats: ExtractionResult,
    #[serde(flatten)]
    pub status: UnitStatus,
}

#[derive(Debug, Clone, Copy)]
pub enum BatchEvent<'e> {
    UnitStarted {
        name: &'e str,
        progress: &'e BatchProgress,
    },
    UnitFinished {
        report: &'e UnitReport,
        progress: &'e BatchProgress,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub run_ref: Uuid,
    pub run_timestamp: String,
    pub output_dir: PathBuf,
    pub dry_run: bool,
    pub cancelled: bool,
    pub progress: BatchProgress,
    pub total_files: usize,
    pub total_chars: usize,
    pub total_words: usize,
    pub empty_units: usize,
    pub failed_units: usize,
    pub skipped_undecodable: usize,
    pub skipped_unreadable: usize,
    pub units: Vec<UnitReport>,
}

impl BatchSummary {
    fn new(metadata: &RunMetadata, output_dir: &Path, dry_run: bool, total_units: usize) -> Self {
        Self {
            run_ref: metadata.run_ref,
            run_timestamp: metadata.run_timestamp(),
            output_dir: output_dir.to_path_buf(),
            dry_run,
            cancelled: false,
            progress: BatchProgress::new(total_units),
            total_files: 0,
            total_chars: 0,
            total_words: 0,
            empty_units: 0,
            failed_units: 0,
            skipped_undecodable: 0,
            skipped_unreadable: 0,
            units: Vec::with_capacity(total_units),
        }
    }

    fn record(&mut self, report: UnitReport) {
        self.total_files += report.stats.file_count;
        self.total_chars += report.stats.char_count;
        self.total_words += report.stats.word_count;
        self.skipped_undecodable += report.stats.skipped_undecodable;
        self.skipped_unreadable += report.stats.skipped_unreadable;

        match report.status {
            UnitStatus::Empty => self.empty_units += 1,
            UnitStatus::Failed { .. } => self.failed_units += 1,
            UnitStatus::Extracted { .. } => {}
        }

        self.units.push(report);
    }

    pub fn has_failures(&self) -> bool {
        self.failed_units > 0
    }

    pub fn written_files(&self) -> Vec<&Path> {
        self.units
            .iter()
            .filter_map(|u| match &u.status {
                UnitStatus::Extracted { output } if !self.dry_run => Some(output.as_path()),
                _ => None,
            })
            .collect()
    }

    /// One-line outcome for the presentation layer.
    pub fn display_line(&self) -> String {
        let mut line = if self.total_files > 0 {
            format!(
                "Success! A total of {} file(s) have been extracted.",
                self.total_files
            )
        } else if self.failed_units > 0 {
            "No files were extracted.".to_string()
        } else {
            "Extraction complete, but no files matched the criteria.".to_string()
        };

        if self.failed_units > 0 {
            line.push_str(&format!(" {} unit(s) failed.", self.failed_units));
        }

        if self.cancelled {
            let remaining = self.progress.total_units - self.progress.completed_units;
            line.push_str(&format!(
                " Cancelled with {} unit(s) not started.",
                remaining
            ));
        }

        if self.dry_run {
            line.push_str(" (dry run, nothing written)");
        }

        line
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub output_dir_name: String,
    pub dry_run: bool,
}

/// Runs every unit of a plan, one at a time and in plan order.
pub struct BatchRunner<'a> {
    plan: ExtractionPlan,
    policy: ExtractionPolicy,
    aggregator: MarkdownAggregator,
    output_dir_name: String,
    shutdown: Option<&'a GracefulShutdown>,
    state: BatchState,
    progress: BatchProgress,
}

impl<'a> BatchRunner<'a> {
    /// The output directory name is added to the policy's excluded
    /// directories, and `run` refuses any folder unit at or below a segment
    /// with that name, so a run never reads earlier extracts.
    pub fn new(plan: ExtractionPlan, policy: &ExtractionPolicy, options: &BatchOptions) -> Self {
        let output_dir = plan.root().join(&options.output_dir_name);
        let progress = BatchProgress::new(plan.total_units());

        Self {
            policy: policy.clone().with_excluded_dir(options.output_dir_name.clone()),
            aggregator: MarkdownAggregator::new(output_dir).with_dry_run(options.dry_run),
            output_dir_name: options.output_dir_name.clone(),
            plan,
            shutdown: None,
            state: BatchState::Idle,
            progress,
        }
    }

    pub fn with_shutdown(mut self, shutdown: &'a GracefulShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn progress(&self) -> BatchProgress {
        self.progress
    }

    pub fn plan(&self) -> &ExtractionPlan {
        &self.plan
    }

    /// Runs the batch. Unit failures are recorded in the summary. Errors are
    /// a runner that already ran, or a plan that reaches into the output
    /// directory; neither touches the filesystem.
    pub fn run(&mut self, observer: Option<&dyn Fn(BatchEvent<'_>)>) -> Result<BatchSummary> {
        if self.state != BatchState::Idle {
            return Err(ExtractorError::Config {
                message: "batch runner has already been used".to_string(),
            });
        }
        self.check_output_dir_not_selected()?;

        let metadata = RunMetadata::new();
        let mut summary = BatchSummary::new(
            &metadata,
            self.aggregator.output_dir(),
            self.aggregator.is_dry_run(),
            self.plan.total_units(),
        );

        self.state = BatchState::Running;
        tracing::info!(
            "Starting batch {} with {} unit(s){}",
            metadata.run_ref,
            self.plan.total_units(),
            if self.aggregator.is_dry_run() { " (dry run)" } else { "" }
        );

        for unit in self.plan.units() {
            if self.is_cancelled() {
                tracing::warn!(
                    "Batch cancelled after {}/{} unit(s)",
                    self.progress.completed_units,
                    self.progress.total_units
                );
                self.state = BatchState::Cancelled;
                break;
            }

            let name = unit.display_name(self.plan.root());
            if let Some(notify) = observer {
                notify(BatchEvent::UnitStarted {
                    name: &name,
                    progress: &self.progress,
                });
            }

            let report = self.process_unit(unit, name, &metadata);
            self.progress.advance();

            if let Some(notify) = observer {
                notify(BatchEvent::UnitFinished {
                    report: &report,
                    progress: &self.progress,
                });
            }

            summary.record(report);
        }

        if self.state == BatchState::Running {
            self.state = BatchState::Finished;
        }

        summary.cancelled = self.state == BatchState::Cancelled;
        summary.progress = self.progress;

        tracing::info!(
            "Batch {} finished: {} file(s), {} empty unit(s), {} failed unit(s)",
            metadata.run_ref,
            summary.total_files,
            summary.empty_units,
            summary.failed_units
        );

        Ok(summary)
    }

    fn process_unit(&self, unit: &ExtractionUnit, name: String, metadata: &RunMetadata) -> UnitReport {
        match self.extract_unit(unit, &name, metadata) {
            Ok((stats, Some(output))) => {
                tracing::info!("Extracted {} file(s) from {}", stats.file_count, name);
                UnitReport {
                    name,
                    stats,
                    status: UnitStatus::Extracted { output },
                }
            }
            Ok((stats, None)) => {
                tracing::info!("No extractable files in {}", name);
                UnitReport {
                    name,
                    stats,
                    status: UnitStatus::Empty,
                }
            }
            Err(err) => {
                tracing::warn!("Failed to extract {}: {}", name, err);
                UnitReport {
                    name,
                    stats: ExtractionResult::default(),
                    status: UnitStatus::Failed {
                        error: err.to_string(),
                    },
                }
            }
        }
    }

    fn extract_unit(
        &self,
        unit: &ExtractionUnit,
        name: &str,
        metadata: &RunMetadata,
    ) -> Result<(ExtractionResult, Option<PathBuf>)> {
        let root = self.plan.root();
        let mut result = FolderWalker::new(&self.policy).walk(unit.path(root), unit.walk_mode())?;

        if result.is_empty() {
            return Ok((result, None));
        }

        if result.file_count > FILE_COUNT_WARNING_THRESHOLD {
            tracing::warn!(
                "{} yielded {} files; the extract may be very large",
                name,
                result.file_count
            );
        }

        let output = self
            .aggregator
            .write_unit(&result, metadata, name, &unit.file_stem(root))?;

        // The body is not kept once the document exists.
        result.markdown_body = String::new();

        Ok((result, Some(output)))
    }

    fn check_output_dir_not_selected(&self) -> Result<()> {
        let root = self.plan.root();
        for unit in self.plan.units() {
            let ExtractionUnit::Folder(path) = unit else {
                continue;
            };
            let relative = path.strip_prefix(root).unwrap_or(path);
            if relative
                .components()
                .any(|c| c.as_os_str() == self.output_dir_name.as_str())
            {
                return Err(ExtractorError::InvalidSelection {
                    selection: display_relative(relative),
                    reason: format!(
                        "it is inside the output directory '{}'",
                        self.output_dir_name
                    ),
                });
            }
        }
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.shutdown.is_some_and(|s| !s.is_running())
    }
}
