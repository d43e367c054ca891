//! Stage A: catalog decoding
//!
//! ```text
//! .mrc bytes
//!     ↓
//! [CatalogParser] ──unknown tags──→ [UnknownTagTracker]
//!     ↓                   (tag names via tags::name_for)
//! CatalogRecord (+ urls, year)
//!     ↓
//! [references] document filename, year normalization
//! ```

pub mod parser;
pub mod references;
pub mod tags;
pub mod unknown;

pub use parser::CatalogParser;
pub use references::{extract_document_filename, extract_year, normalize_year, NormalizedYear};
pub use unknown::UnknownTagTracker;
