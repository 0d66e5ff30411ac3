use crate::error::{format_bytes, ExtractorError, UserFriendlyError};
use crate::extractor::batch::{BatchSummary, ExtractionPlan, UnitReport, UnitStatus};
use crate::scanner::policy::ExtractionPolicy;
use crate::scanner::selection::FolderCatalog;
use crate::ui::progress::format_duration;
use console::{style, Emoji};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static ROCKET: Emoji = Emoji("🚀 ", "> ");
static SPARKLES: Emoji = Emoji("✨ ", "* ");
static FOLDER: Emoji = Emoji("📁 ", "- ");

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let use_colors = match mode {
            OutputMode::Human => console::colors_enabled() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", ROCKET, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    pub fn print_user_friendly_error(&self, error: &ExtractorError) {
        self.error(&error.user_message());

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    eprintln!();
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => eprintln!("SUGGESTION: {}", suggestion),
            }
        }
    }

    /// Active filters, shown before a run starts.
    pub fn print_policy(&self, policy: &ExtractionPolicy) {
        if !self.should_show_message(1) || self.mode == OutputMode::Json {
            return;
        }

        let limit = if policy.excludes_large_files() {
            format!(
                "files of {} or more are skipped",
                format_bytes(policy.max_file_size_bytes() as u64)
            )
        } else {
            "no size limit".to_string()
        };
        self.info(&format!(
            "{} allowed extension(s), {} excluded folder name(s), {}",
            policy.allowed_extensions().len(),
            policy.excluded_dirs().len(),
            limit
        ));
    }

    pub fn print_folder_catalog(&self, catalog: &FolderCatalog) {
        match self.mode {
            OutputMode::Json => {
                let folders: Vec<_> = catalog
                    .iter()
                    .map(|(id, path)| {
                        serde_json::json!({
                            "id": id.as_str(),
                            "depth": id.depth(),
                            "path": path,
                        })
                    })
                    .collect();
                self.print_json_pretty(&serde_json::json!({
                    "type": "folders",
                    "root": catalog.root(),
                    "folders": folders,
                }));
            }
            OutputMode::Plain => {
                for (id, _) in catalog.iter() {
                    println!("{}", id);
                }
            }
            OutputMode::Human => {
                self.print_header(&format!("Folders under {}", catalog.root().display()));
                if catalog.is_empty() {
                    println!("  (no selectable folders)");
                }
                for (id, _) in catalog.iter() {
                    let indent = "  ".repeat(id.depth());
                    if self.use_colors {
                        println!("{}{}{}", indent, FOLDER, style(id.as_str()).cyan());
                    } else {
                        println!("{}{}", indent, id);
                    }
                }
                println!();
                println!("Select folders with --select <id> (repeatable) and root files with --select-root.");
            }
        }
    }

    /// Units a run is about to process, in order.
    pub fn print_plan(&self, plan: &ExtractionPlan) {
        if !self.should_show_message(0) || self.mode == OutputMode::Json {
            return;
        }

        match self.mode {
            OutputMode::Plain => {
                for unit in plan.units() {
                    println!("UNIT: {}", unit.display_name(plan.root()));
                }
            }
            _ => {
                println!("Processing {} unit(s):", plan.total_units());
                for unit in plan.units() {
                    println!("  - {}", unit.display_name(plan.root()));
                }
                println!();
            }
        }
    }

    /// One line per finished unit.
    pub fn print_unit_outcome(&self, report: &UnitReport) {
        if self.mode == OutputMode::Json {
            return;
        }

        match &report.status {
            UnitStatus::Extracted { output } => {
                let name = output
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| output.display().to_string());
                if self.should_show_message(0) {
                    self.success(&format!(
                        "Extracted {} file(s) from {} -> {}",
                        report.stats.file_count, report.name, name
                    ));
                }
                if report.stats.skipped_undecodable + report.stats.skipped_unreadable > 0 {
                    self.info(&format!(
                        "{}: skipped {} undecodable and {} unreadable file(s)",
                        report.name, report.stats.skipped_undecodable, report.stats.skipped_unreadable
                    ));
                }
            }
            UnitStatus::Empty if self.should_show_message(0) => {
                let message = format!("No extractable files in {}", report.name);
                match self.mode {
                    OutputMode::Plain => println!("INFO: {}", message),
                    _ => self.print_human_message(MessageType::Info, &message),
                }
            }
            UnitStatus::Empty => {}
            UnitStatus::Failed { error } => {
                self.error(&format!("Failed to extract {}: {}", report.name, error));
            }
        }
    }

    pub fn print_batch_summary(&self, summary: &BatchSummary, elapsed: Duration) {
        match self.mode {
            OutputMode::Json => self.print_json_pretty(&serde_json::json!({
                "type": "summary",
                "duration_ms": elapsed.as_millis() as u64,
                "summary": summary,
            })),
            OutputMode::Plain => {
                println!("COMPLETED: {}", summary.display_line());
                println!("Run: {}", summary.run_ref);
                println!("Files: {}", summary.total_files);
                println!("Characters: {}", summary.total_chars);
                println!("Words: {}", summary.total_words);
                println!("Failed units: {}", summary.failed_units);
                println!("Output: {}", summary.output_dir.display());
            }
            OutputMode::Human => {
                if self.quiet {
                    return;
                }
                println!();
                self.print_separator();

                let line = summary.display_line();
                if summary.has_failures() || summary.cancelled {
                    self.print_human_message(MessageType::Warning, &line);
                } else if summary.total_files > 0 {
                    self.print_human_message(MessageType::Success, &line);
                } else {
                    self.print_human_message(MessageType::Info, &line);
                }

                println!();
                println!("  Units:        {}/{}", summary.progress.completed_units, summary.progress.total_units);
                println!("  Characters:   {}", self.highlight(summary.total_chars));
                println!("  Words:        {}", self.highlight(summary.total_words));
                if summary.skipped_undecodable + summary.skipped_unreadable > 0 {
                    println!(
                        "  Skipped:      {} undecodable, {} unreadable",
                        summary.skipped_undecodable, summary.skipped_unreadable
                    );
                }
                println!("  Time taken:   {}", format_duration(elapsed));
                if !summary.written_files().is_empty() {
                    println!("  Output:       {}", summary.output_dir.display());
                }
                println!("  Run ref:      {}", summary.run_ref);

                self.print_separator();
            }
        }
    }

    pub fn print_header(&self, title: &str) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{}{}", SPARKLES, style(title).bold().cyan());
                } else {
                    println!("=== {} ===", title);
                }
                println!();
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "header",
                    "title": title
                }));
            }
            OutputMode::Plain => println!("=== {} ===", title),
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human if self.use_colors => {
                println!("{}", style("─".repeat(60)).dim());
            }
            OutputMode::Human | OutputMode::Plain => println!("{}", "-".repeat(60)),
            OutputMode::Json => {}
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn highlight(&self, value: usize) -> String {
        if self.use_colors {
            style(value).cyan().bold().to_string()
        } else {
            value.to_string()
        }
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        if self.use_colors {
            let (emoji, styled) = match msg_type {
                MessageType::Success => (CHECKMARK, style(message).green().bold()),
                MessageType::Error => (CROSS, style(message).red().bold()),
                MessageType::Warning => (WARNING, style(message).yellow().bold()),
                MessageType::Info => (INFO, style(message).cyan()),
            };

            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, styled),
                _ => println!("{}{}", emoji, styled),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn print_json_pretty(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}

/// Routes messages around active progress bars.
pub struct ProgressAwareOutput<'a> {
    formatter: &'a OutputFormatter,
    progress_manager: Option<&'a crate::ui::ProgressManager>,
}

impl<'a> ProgressAwareOutput<'a> {
    pub fn new(
        formatter: &'a OutputFormatter,
        progress_manager: Option<&'a crate::ui::ProgressManager>,
    ) -> Self {
        Self {
            formatter,
            progress_manager,
        }
    }

    pub fn suspend_and_print<F>(&self, f: F)
    where
        F: FnOnce(&OutputFormatter),
    {
        if let Some(pm) = self.progress_manager {
            pm.suspend(|| f(self.formatter));
        } else {
            f(self.formatter);
        }
    }

    pub fn unit_outcome(&self, report: &UnitReport) {
        self.suspend_and_print(|f| f.print_unit_outcome(report));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::walker::ExtractionResult;
    use std::path::PathBuf;

    #[test]
    fn test_formatter_creation() {
        let formatter = OutputFormatter::new(OutputMode::Plain, 1, false);
        assert_eq!(formatter.mode(), OutputMode::Plain);
        assert_eq!(formatter.verbose_level, 1);
        assert!(!formatter.use_colors);
        assert!(!formatter.is_quiet());
    }

    #[test]
    fn test_quiet_mode() {
        let formatter = OutputFormatter::new(OutputMode::Human, 2, true);
        assert_eq!(formatter.verbose_level, 0);
        assert!(formatter.is_quiet());
        assert!(!formatter.should_show_message(0));
    }

    #[test]
    fn test_should_show_message() {
        let formatter = OutputFormatter::new(OutputMode::Human, 1, false);
        assert!(formatter.should_show_message(0));
        assert!(formatter.should_show_message(1));
        assert!(!formatter.should_show_message(2));
    }

    #[test]
    fn test_unit_outcome_does_not_panic_in_any_mode() {
        let reports = [
            UnitReport {
                name: "src".to_string(),
                stats: ExtractionResult {
                    file_count: 2,
                    skipped_undecodable: 1,
                    ..Default::default()
                },
                status: UnitStatus::Extracted {
                    output: PathBuf::from("/tmp/out/src_1.md"),
                },
            },
            UnitReport {
                name: "docs".to_string(),
                stats: ExtractionResult::default(),
                status: UnitStatus::Empty,
            },
            UnitReport {
                name: "gone".to_string(),
                stats: ExtractionResult::default(),
                status: UnitStatus::Failed {
                    error: "missing".to_string(),
                },
            },
        ];

        for mode in [OutputMode::Human, OutputMode::Plain, OutputMode::Json] {
            let formatter = OutputFormatter::new(mode, 2, false);
            for report in &reports {
                formatter.print_unit_outcome(report);
            }
        }
    }
}
