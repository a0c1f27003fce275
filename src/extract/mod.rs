pub mod pdftotext;

use crate::error::ExtractionError;
use crate::layout::TextLayer;
use std::path::Path;

pub use pdftotext::PdftotextExtractor;

/// Trait for text-layer extraction backends.
pub trait Extractor: Send + Sync {
    /// Extract positioned text for every page, in physical order.
    ///
    /// Must tell an unreadable document apart from one that parsed but
    /// carries no text ([`ExtractionError::EmptyTextLayer`]).
    fn extract(&self, input: &Path) -> Result<TextLayer, ExtractionError>;

    /// Name of this extraction backend (for diagnostics).
    fn backend_name(&self) -> &str;
}
