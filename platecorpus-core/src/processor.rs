use crate::aggregate::{DocumentExtraction, MetadataAggregator};
use crate::catalog::{normalize_year, CatalogParser, NormalizedYear, UnknownTagTracker};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::extract::ImageExtractor;
use crate::storage::{read_json, write_json_atomic, ArtifactStore};
use crate::types::*;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Wall-clock time spent in one named pipeline step
#[derive(Debug, Clone, PartialEq)]
pub struct StepTiming {
    pub step: &'static str,
    pub elapsed: Duration,
}

/// Sum of a stage's step timings
pub fn total_elapsed(timings: &[StepTiming]) -> Duration {
    timings.iter().map(|t| t.elapsed).sum()
}

/// Times the steps of one stage; does nothing unless enabled
struct StepProfiler {
    enabled: bool,
    timings: Vec<StepTiming>,
}

impl StepProfiler {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            timings: Vec::new(),
        }
    }

    fn time_step<F, R>(&mut self, step: &'static str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if !self.enabled {
            return f();
        }

        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        debug!(step, elapsed_ms = elapsed.as_millis() as u64, "⏱️  step finished");
        self.timings.push(StepTiming { step, elapsed });
        result
    }

    fn into_timings(self) -> Vec<StepTiming> {
        self.timings
    }
}

#[derive(Debug, Clone, Default)]
pub struct CatalogStageSummary {
    pub files_parsed: usize,
    pub files_failed: usize,
    pub records: usize,
    pub records_with_document: usize,
    pub unknown_tags: usize,
    pub unknown_tag_occurrences: u64,
    /// Filled only when profiling
    pub timings: Vec<StepTiming>,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionStageSummary {
    /// Records carrying a document filename
    pub candidates: usize,
    pub filtered_out: usize,
    pub invalid_year: usize,
    pub join_misses: usize,
    pub duplicate_documents: usize,
    pub failed_documents: usize,
    pub documents: usize,
    pub images: usize,
    /// Filled only when profiling
    pub timings: Vec<StepTiming>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub catalog: CatalogStageSummary,
    pub extraction: ExtractionStageSummary,
}

/// One record joined to an on-disk document, ready for extraction
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub document_path: PathBuf,
    pub record: RecordReference,
}

/// Batch driver for both stages
pub struct BatchProcessor {
    config: PipelineConfig,
    profiling: bool,
}

impl BatchProcessor {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            profiling: false,
        }
    }

    pub fn with_profiling(mut self, enabled: bool) -> Self {
        self.profiling = enabled;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stage A then stage B
    pub fn run(&self) -> Result<BatchSummary> {
        let (records, catalog) = self.run_catalog_stage()?;
        let extraction = self.run_extraction_stage(&records)?;
        Ok(BatchSummary { catalog, extraction })
    }

    /// Records written by a previous catalog stage
    pub fn load_records(&self) -> Result<Vec<CatalogRecord>> {
        read_json(&self.config.paths.records_output)
    }

    /// Catalog files in `catalog_dir` with the configured extension, sorted
    pub fn catalog_files(&self) -> Result<Vec<PathBuf>> {
        let extension = self.config.catalog.file_extension.as_str();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.config.paths.catalog_dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Parse every catalog file, then write the records and unknown-tag report
    pub fn run_catalog_stage(&self) -> Result<(Vec<CatalogRecord>, CatalogStageSummary)> {
        let mut profiler = StepProfiler::new(self.profiling);
        let tracker = UnknownTagTracker::new(self.config.catalog.example_prefix_chars);
        let parser = CatalogParser::new(&tracker).with_verbose(self.config.catalog.verbose_field_errors);
        let mut summary = CatalogStageSummary::default();

        let files = self.catalog_files()?;
        info!(count = files.len(), dir = %self.config.paths.catalog_dir.display(), "📚 parsing catalog files");

        let records = profiler.time_step("Catalog Parsing", || {
            let mut records = Vec::new();
            for file in &files {
                match parser.parse_file(file) {
                    Ok(parsed) => {
                        debug!(file = %file.display(), records = parsed.len(), "parsed catalog file");
                        summary.files_parsed += 1;
                        records.extend(parsed);
                    }
                    Err(e) => {
                        warn!(file = %file.display(), "skipping catalog file: {e}");
                        summary.files_failed += 1;
                    }
                }
            }
            records
        });

        summary.records = records.len();
        summary.records_with_document = records.iter().filter(|r| r.document_filename.is_some()).count();
        summary.unknown_tags = tracker.unique_tags();
        summary.unknown_tag_occurrences = tracker.total_occurrences();

        profiler.time_step("Catalog Output", || -> Result<()> {
            write_json_atomic(&self.config.paths.records_output, &records)?;
            write_json_atomic(&self.config.paths.unknown_report_output, &tracker.report())
        })?;

        info!(
            records = summary.records,
            with_document = summary.records_with_document,
            unknown_tags = summary.unknown_tags,
            "catalog stage complete"
        );
        summary.timings = profiler.into_timings();
        Ok((records, summary))
    }

    /// Join records to on-disk documents.
    ///
    /// Drops records with no document, a filtered-out filename, a year that
    /// cannot be normalized, or a missing file. The first record wins when
    /// several point at the same document.
    pub fn plan_jobs(&self, records: &[CatalogRecord], summary: &mut ExtractionStageSummary) -> Vec<ExtractionJob> {
        let mut seen = HashSet::new();
        let mut jobs = Vec::new();

        for record in records {
            let Some(filename) = record.document_filename.as_deref() else {
                continue;
            };
            summary.candidates += 1;

            if !self.config.extraction.accepts(filename) {
                summary.filtered_out += 1;
                continue;
            }

            let year = match normalize_year(record.year.as_deref(), &self.config.years) {
                Some(NormalizedYear::Parsed(year)) => year,
                Some(adjusted @ (NormalizedYear::Defaulted(_) | NormalizedYear::Corrected(_))) => {
                    debug!(
                        control_number = %record.control_number,
                        raw = ?record.year,
                        "year normalized to {}",
                        adjusted.value()
                    );
                    adjusted.value()
                }
                None => {
                    warn!(
                        control_number = %record.control_number,
                        source_file = %record.source_file,
                        raw = ?record.year,
                        "unusable year, record excluded from extraction"
                    );
                    summary.invalid_year += 1;
                    continue;
                }
            };

            let document_path = self.config.paths.document_path(filename);
            if !document_path.is_file() {
                warn!(
                    control_number = %record.control_number,
                    document = %document_path.display(),
                    "no document on disk for record"
                );
                summary.join_misses += 1;
                continue;
            }

            if !seen.insert(document_path.clone()) {
                debug!(document = %document_path.display(), "document already claimed by an earlier record");
                summary.duplicate_documents += 1;
                continue;
            }

            jobs.push(ExtractionJob {
                document_path,
                record: record.reference(year),
            });
        }

        jobs
    }

    /// Extract sampled images for `records` and write the manifest
    pub fn run_extraction_stage(&self, records: &[CatalogRecord]) -> Result<ExtractionStageSummary> {
        let mut profiler = StepProfiler::new(self.profiling);
        let mut summary = ExtractionStageSummary::default();
        let jobs = profiler.time_step("Document Join", || self.plan_jobs(records, &mut summary));
        info!(documents = jobs.len(), "🖼️  extracting sampled images");

        let store = ArtifactStore::new(&self.config.paths.images_dir)?;
        let extractor = ImageExtractor::new(
            &store,
            &self.config.sampling,
            self.config.extraction.image_id_length,
        );

        let results = profiler.time_step("Image Extraction", || extract_all(&extractor, &jobs));

        let mut aggregator = MetadataAggregator::new();
        for result in results {
            match result {
                Some(extraction) => aggregator.add_document(extraction),
                None => summary.failed_documents += 1,
            }
        }
        summary.documents = aggregator.document_count();
        summary.images = aggregator.image_count();

        let manifest = aggregator.finish()?;
        let manifest_path = self.config.paths.manifest_path();
        profiler.time_step("Manifest Output", || write_json_atomic(&manifest_path, &manifest))?;

        info!(
            documents = summary.documents,
            images = summary.images,
            manifest = %manifest_path.display(),
            "extraction stage complete"
        );
        summary.timings = profiler.into_timings();
        Ok(summary)
    }
}

fn extract_one(extractor: &ImageExtractor<'_>, job: &ExtractionJob) -> Option<DocumentExtraction> {
    match extractor.extract(&job.document_path, &job.record) {
        Ok(images) => Some(DocumentExtraction {
            document_path: job.document_path.clone(),
            images,
        }),
        Err(e) => {
            warn!(document = %job.document_path.display(), "skipping document: {e}");
            None
        }
    }
}

#[cfg(not(feature = "rayon"))]
fn extract_all(extractor: &ImageExtractor<'_>, jobs: &[ExtractionJob]) -> Vec<Option<DocumentExtraction>> {
    jobs.iter().map(|job| extract_one(extractor, job)).collect()
}

/// Documents share nothing but the output directory; results keep job order
#[cfg(feature = "rayon")]
fn extract_all(extractor: &ImageExtractor<'_>, jobs: &[ExtractionJob]) -> Vec<Option<DocumentExtraction>> {
    use rayon::prelude::*;
    jobs.par_iter().map(|job| extract_one(extractor, job)).collect()
}
