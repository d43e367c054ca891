// Platecorpus Core Library
//
// Two-stage corpus builder: decodes ISO 2709 catalog files into records, joins
// them to scanned books on disk and extracts sampled page images into a
// provenance manifest.

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod processor;
pub mod sampling;
pub mod storage;
pub mod types;

// Re-export main types and functions for easy use
pub use aggregate::{DocumentExtraction, MetadataAggregator};
pub use catalog::{CatalogParser, UnknownTagTracker};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use extract::{DocumentSource, ImageEntry, ImageExtractor, PdfDocument};
pub use processor::{BatchProcessor, BatchSummary};
pub use sampling::select_pages;
pub use types::*;
