pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod scanner;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, ModeArg, OutputFormat};
pub use config::{CliOverrides, Config, OutputConfig, PolicyConfig, SelectionConfig};
pub use error::{ExtractorError, Result, UserFriendlyError};

// Core functionality re-exports
pub use extractor::{
    BatchEvent, BatchOptions, BatchProgress, BatchRunner, BatchState, BatchSummary,
    ExtractionPlan, ExtractionResult, ExtractionUnit, FolderWalker, MarkdownAggregator,
    RunMetadata, UnitReport, UnitStatus, WalkMode,
};
pub use scanner::{
    ExtractionPolicy, FolderCatalog, FolderId, PathSetCanonicalizer, SelectionMode,
    SelectionRequest,
};
pub use ui::{GracefulShutdown, OutputFormatter, OutputMode, ProgressManager};

use crate::ui::output::ProgressAwareOutput;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Main library interface: one configured root, extracted on demand.
pub struct CodebaseExtractor {
    config: Config,
    root: PathBuf,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
}

impl CodebaseExtractor {
    pub fn new<P: Into<PathBuf>>(
        config: Config,
        root: P,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
    ) -> Result<Self> {
        Ok(Self::with_shutdown(
            config,
            root.into(),
            output_mode,
            verbose,
            quiet,
            GracefulShutdown::new()?,
        ))
    }

    /// No Ctrl+C handler is installed.
    pub fn new_for_test<P: Into<PathBuf>>(
        config: Config,
        root: P,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
    ) -> Self {
        Self::with_shutdown(
            config,
            root.into(),
            output_mode,
            verbose,
            quiet,
            GracefulShutdown::new_for_test(),
        )
    }

    fn with_shutdown(
        config: Config,
        root: PathBuf,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
        shutdown: GracefulShutdown,
    ) -> Self {
        Self {
            config,
            root,
            output_formatter: OutputFormatter::new(output_mode, verbose, quiet),
            progress_manager: ProgressManager::new(!quiet && output_mode == OutputMode::Human),
            shutdown,
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        let output_mode = match cli_args.output_format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        };

        Self::new(
            config,
            cli_args.root.clone(),
            output_mode,
            cli_args.verbosity_level(),
            cli_args.quiet,
        )
    }

    /// The configured policy with the output directory always excluded.
    pub fn policy(&self) -> ExtractionPolicy {
        ExtractionPolicy::new(&self.config.policy)
            .with_excluded_dir(self.config.output.directory_name.clone())
    }

    pub fn list_folders(&self) -> Result<FolderCatalog> {
        let spinner = self.progress_manager.create_spinner("Scanning folders...");
        let catalog =
            FolderCatalog::scan(&self.root, &self.policy(), self.config.selection.scan_depth);
        spinner.finish_and_clear();

        let catalog = catalog?;
        tracing::debug!("Found {} selectable folder(s)", catalog.len());
        Ok(catalog)
    }

    pub fn plan(&self, mode: SelectionMode) -> Result<ExtractionPlan> {
        let request = SelectionRequest {
            root: self.root.clone(),
            mode,
        };
        let selection = scanner::resolve_selection(
            &request,
            &self.policy(),
            self.config.selection.scan_depth,
        )?;

        ExtractionPlan::from_selection(&self.root, &selection)
    }

    /// Plans and runs one batch, reporting each unit as it finishes.
    pub fn run(&self, mode: SelectionMode, dry_run: bool) -> Result<BatchSummary> {
        let start_time = Instant::now();
        self.shutdown.check_shutdown()?;

        let plan = self.plan(mode)?;
        let policy = self.policy();

        self.output_formatter.start_operation(&format!(
            "Extracting from {}{}",
            plan.root().display(),
            if dry_run { " (dry run)" } else { "" }
        ));
        self.output_formatter.print_policy(&policy);
        self.output_formatter.print_plan(&plan);

        let unit_progress = self
            .progress_manager
            .create_unit_progress(plan.total_units() as u64);
        let output = ProgressAwareOutput::new(&self.output_formatter, Some(&self.progress_manager));

        let observer = |event: BatchEvent<'_>| match event {
            BatchEvent::UnitStarted { name, progress } => {
                ui::progress::update_unit_progress(&unit_progress, progress, Some(name));
            }
            BatchEvent::UnitFinished { report, progress } => {
                ui::progress::update_unit_progress(&unit_progress, progress, None);
                output.unit_outcome(report);
            }
        };

        let options = BatchOptions {
            output_dir_name: self.config.output.directory_name.clone(),
            dry_run,
        };
        let mut runner = BatchRunner::new(plan, &policy, &options).with_shutdown(&self.shutdown);
        let summary = runner.run(Some(&observer))?;

        ui::progress::finish_progress_with_summary(
            &unit_progress,
            &format!("{} unit(s) processed", summary.progress.completed_units),
            start_time.elapsed(),
        );
        self.progress_manager.clear();

        if summary.cancelled {
            self.output_formatter
                .warning("Extraction cancelled; documents already written were kept.");
        }

        self.output_formatter
            .print_batch_summary(&summary, start_time.elapsed());

        Ok(summary)
    }

    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config)?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    pub fn handle_error(&self, error: &ExtractorError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

pub fn version_info() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        build_date: option_env!("BUILD_DATE").unwrap_or("unknown"),
        target: std::env::consts::ARCH.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_date: &'static str,
    pub target: String,
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "codebase-extractor {} ({}) built on {} for {}",
            self.version, self.git_hash, self.build_date, self.target
        )
    }
}
