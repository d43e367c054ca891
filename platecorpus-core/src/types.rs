use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel name for tags missing from the tag catalog
pub const UNKNOWN_FIELD_NAME: &str = "Unknown Field";

/// Sentinel control number for records without a usable `001`
pub const UNKNOWN_CONTROL_NUMBER: &str = "Unknown ID";

// ===== STAGE A: CATALOG RECORDS =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    pub code: String,
    pub value: String,
}

/// One decoded catalog field.
///
/// Control fields (tag lexically before `"010"`) never carry subfields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogField {
    pub tag: String,
    pub name: String,
    pub value: String,
    pub subfields: Option<Vec<Subfield>>,
}

impl CatalogField {
    pub fn is_control(&self) -> bool {
        is_control_tag(&self.tag)
    }
}

pub fn is_control_tag(tag: &str) -> bool {
    tag < "010"
}

/// One bibliographic entity decoded from a catalog file.
///
/// Serialized with the field names downstream tooling already reads
/// (`marc_file`, `pdf_filename`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub control_number: String,
    pub fields: Vec<CatalogField>,
    #[serde(rename = "marc_file")]
    pub source_file: String,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(rename = "pdf_filename")]
    pub document_filename: Option<String>,
    pub year: Option<String>,
}

impl CatalogRecord {
    /// All fields with the given tag, in source order
    pub fn fields_with_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a CatalogField> {
        self.fields.iter().filter(move |f| f.tag == tag)
    }

    pub fn reference(&self, year: i32) -> RecordReference {
        RecordReference {
            control_number: self.control_number.clone(),
            source_file: self.source_file.clone(),
            year,
        }
    }
}

// ===== UNKNOWN TAG REPORT =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownFieldObservation {
    pub occurrence_count: u64,
    pub first_example_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnknownFieldsReport {
    pub summary: UnknownFieldsSummary,
    pub unknown_fields: Vec<UnknownFieldEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnknownFieldsSummary {
    pub total_unique_unknown_fields: usize,
    pub total_unknown_field_occurrences: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnknownFieldEntry {
    pub tag: String,
    pub occurrences: u64,
    pub example: String,
}

// ===== STAGE B: SAMPLED IMAGES =====

/// Provenance fields joined from the originating catalog record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReference {
    pub control_number: String,
    #[serde(rename = "marc_file")]
    pub source_file: String,
    pub year: i32,
}

/// One extracted raster asset with its provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampledImage {
    pub image_id: String,
    pub source: ImageSource,
    pub page_info: PageInfo,
    pub image_properties: ImageProperties,
    pub extraction_metadata: ExtractionMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(rename = "pdf_file")]
    pub document_path: String,
    #[serde(flatten)]
    pub record: RecordReference,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInfo {
    /// 0-based page index
    pub page_number: usize,
    pub total_pages: usize,
    pub relative_position: f64,
    pub images_on_page: usize,
    #[serde(rename = "image_index")]
    pub image_index_on_page: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageProperties {
    pub path: String,
    /// Native encoding extension, e.g. `jpeg`
    pub extension: String,
    pub colorspace: String,
    pub width: u32,
    pub height: u32,
    pub size_bytes: usize,
    /// Pixel mode as reported by the intrinsic decoder (`L`, `RGB`, ...)
    pub mode: String,
    /// 0 when the stream declares no resolution
    pub original_dpi: u32,
    pub compression: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub timestamp: DateTime<Utc>,
    /// PDF object reference of the image XObject, e.g. `"12 0"`
    pub object_ref: String,
    pub sampling_rate: String,
}

// ===== CORPUS MANIFEST =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub total_images: usize,
    pub total_books: usize,
    pub creation_date: DateTime<Utc>,
    pub year_distribution: BTreeMap<i32, usize>,
    pub average_images_per_book: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusManifest {
    pub dataset_info: DatasetInfo,
    pub images: Vec<SampledImage>,
}
