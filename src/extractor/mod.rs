pub mod batch;
pub mod markdown;
pub mod walker;

pub use batch::{
    BatchEvent, BatchOptions, BatchProgress, BatchRunner, BatchState, BatchSummary,
    ExtractionPlan, ExtractionUnit, UnitReport, UnitStatus,
};
pub use markdown::{MarkdownAggregator, RunMetadata};
pub use walker::{ExtractionResult, FolderWalker, WalkMode};
