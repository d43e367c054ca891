use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

// Default value functions for serde
fn default_catalog_dir() -> PathBuf {
    PathBuf::from("marc")
}

fn default_books_root() -> PathBuf {
    PathBuf::from("books")
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("extracted_images")
}

fn default_records_output() -> PathBuf {
    PathBuf::from("marc_records.json")
}

fn default_unknown_report_output() -> PathBuf {
    PathBuf::from("unknown_fields_report.json")
}

fn default_manifest_file_name() -> String {
    "images_metadata.json".to_string()
}

fn default_catalog_extension() -> String {
    "mrc".to_string()
}

fn default_example_prefix_chars() -> usize {
    200
}

fn default_image_id_length() -> usize {
    12
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub years: YearNormalizationConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory scanned for catalog files
    #[serde(default = "default_catalog_dir")]
    pub catalog_dir: PathBuf,
    /// Documents live at `{books_root}/{document_filename}`
    #[serde(default = "default_books_root")]
    pub books_root: PathBuf,
    /// Extracted image bytes and the manifest go here
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,
    #[serde(default = "default_records_output")]
    pub records_output: PathBuf,
    #[serde(default = "default_unknown_report_output")]
    pub unknown_report_output: PathBuf,
    /// Manifest file name inside `images_dir`
    #[serde(default = "default_manifest_file_name")]
    pub manifest_file_name: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            catalog_dir: default_catalog_dir(),
            books_root: default_books_root(),
            images_dir: default_images_dir(),
            records_output: default_records_output(),
            unknown_report_output: default_unknown_report_output(),
            manifest_file_name: default_manifest_file_name(),
        }
    }
}

impl PathsConfig {
    pub fn manifest_path(&self) -> PathBuf {
        self.images_dir.join(&self.manifest_file_name)
    }

    /// On-disk location of a record's document
    pub fn document_path(&self, document_filename: &str) -> PathBuf {
        self.books_root.join(document_filename)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Extension (without dot) of catalog files in `catalog_dir`
    #[serde(default = "default_catalog_extension")]
    pub file_extension: String,
    /// Characters kept from the first example of an unknown tag
    #[serde(default = "default_example_prefix_chars")]
    pub example_prefix_chars: usize,
    /// Log skipped fields at warn level instead of debug
    #[serde(default)]
    pub verbose_field_errors: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            file_extension: default_catalog_extension(),
            example_prefix_chars: default_example_prefix_chars(),
            verbose_field_errors: false,
        }
    }
}

/// Page sampling policy: skip margins, then a step chosen by document length
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub skip_leading: usize,
    pub skip_trailing: usize,
    /// Documents with fewer pages than this use `short_step`
    pub short_document_pages: usize,
    pub short_step: usize,
    /// Documents with fewer pages than this (and not short) use `medium_step`
    pub medium_document_pages: usize,
    pub medium_step: usize,
    pub long_step: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            skip_leading: 5,
            skip_trailing: 5,
            short_document_pages: 50,
            short_step: 5,
            medium_document_pages: 100,
            medium_step: 8,
            long_step: 10,
        }
    }
}

impl SamplingConfig {
    pub fn step_for(&self, total_pages: usize) -> usize {
        if total_pages < self.short_document_pages {
            self.short_step
        } else if total_pages < self.medium_document_pages {
            self.medium_step
        } else {
            self.long_step
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YearNormalizationConfig {
    /// Substituted for blank years
    pub default_year: i32,
    /// Known transcription errors, keyed by the literal catalog value
    pub corrections: BTreeMap<String, i32>,
}

impl Default for YearNormalizationConfig {
    fn default() -> Self {
        Self {
            default_year: 1800,
            corrections: BTreeMap::from([("5780".to_string(), 1780)]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Hex characters kept from the image id digest
    #[serde(default = "default_image_id_length")]
    pub image_id_length: usize,
    /// Only documents whose filename contains this substring are extracted
    #[serde(default)]
    pub require_filename_substring: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            image_id_length: default_image_id_length(),
            require_filename_substring: None,
        }
    }
}

impl ExtractionConfig {
    pub fn accepts(&self, document_filename: &str) -> bool {
        self.require_filename_substring
            .as_deref()
            .map_or(true, |needle| document_filename.contains(needle))
    }
}

impl PipelineConfig {
    /// Load config from a YAML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config with fallback to default
    pub fn load_with_fallback(path: Option<&Path>) -> Self {
        match path {
            Some(p) => Self::load_from_file(p).unwrap_or_else(|e| {
                warn!(path = %p.display(), "failed to load config ({e}), using defaults");
                Self::default()
            }),
            None => Self::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.sampling;
        if s.short_step == 0 || s.medium_step == 0 || s.long_step == 0 {
            return Err(PipelineError::Configuration(
                "sampling steps must be greater than zero".to_string(),
            ));
        }
        // Hex SHA-256 digest is 64 characters
        if !(1..=64).contains(&self.extraction.image_id_length) {
            return Err(PipelineError::Configuration(format!(
                "image_id_length must be within 1..=64, got {}",
                self.extraction.image_id_length
            )));
        }
        Ok(())
    }
}
