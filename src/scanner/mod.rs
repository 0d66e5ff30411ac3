pub mod canonicalizer;
pub mod policy;
pub mod selection;

pub use canonicalizer::{minimal_roots, PathSetCanonicalizer};
pub use policy::ExtractionPolicy;
pub use selection::{
    resolve_root, resolve_selection, FolderCatalog, FolderId, ResolvedSelection, SelectionMode,
    SelectionRequest,
};
