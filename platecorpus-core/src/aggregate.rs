use crate::error::{PipelineError, Result};
use crate::types::{CorpusManifest, DatasetInfo, SampledImage};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

/// Extraction output of one joined document
#[derive(Debug, Clone)]
pub struct DocumentExtraction {
    pub document_path: PathBuf,
    pub images: Vec<SampledImage>,
}

/// Merges per-document extraction results into the corpus manifest.
///
/// Fed only after all per-document work has finished; documents are kept in
/// the order they are added.
#[derive(Debug, Default)]
pub struct MetadataAggregator {
    documents: usize,
    images: Vec<SampledImage>,
}

impl MetadataAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a contributing document, even one whose sampled pages held no images
    pub fn add_document(&mut self, extraction: DocumentExtraction) {
        debug!(
            document = %extraction.document_path.display(),
            images = extraction.images.len(),
            "document added to manifest"
        );
        self.documents += 1;
        self.images.extend(extraction.images);
    }

    pub fn document_count(&self) -> usize {
        self.documents
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn finish(self) -> Result<CorpusManifest> {
        if self.documents == 0 {
            return Err(PipelineError::Configuration(
                "no documents were joined to catalog records; refusing to build an empty manifest".to_string(),
            ));
        }

        let dataset_info = DatasetInfo {
            total_images: self.images.len(),
            total_books: self.documents,
            creation_date: Utc::now(),
            year_distribution: year_distribution(&self.images),
            average_images_per_book: self.images.len() as f64 / self.documents as f64,
        };

        Ok(CorpusManifest {
            dataset_info,
            images: self.images,
        })
    }
}

/// Image counts keyed by the joined record's year, ascending
pub fn year_distribution(images: &[SampledImage]) -> BTreeMap<i32, usize> {
    let mut distribution = BTreeMap::new();
    for image in images {
        *distribution.entry(image.source.record.year).or_insert(0) += 1;
    }
    distribution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    fn image(id: &str, year: i32) -> SampledImage {
        SampledImage {
            image_id: id.to_string(),
            source: ImageSource {
                document_path: "books/ab1.pdf".to_string(),
                record: RecordReference {
                    control_number: "RU-1".to_string(),
                    source_file: "catalog.mrc".to_string(),
                    year,
                },
            },
            page_info: PageInfo {
                page_number: 5,
                total_pages: 40,
                relative_position: 0.125,
                images_on_page: 1,
                image_index_on_page: 0,
            },
            image_properties: ImageProperties {
                path: format!("out/{id}.jpeg"),
                extension: "jpeg".to_string(),
                colorspace: "DeviceRGB".to_string(),
                width: 10,
                height: 10,
                size_bytes: 100,
                mode: "RGB".to_string(),
                original_dpi: 0,
                compression: "DCTDecode".to_string(),
            },
            extraction_metadata: ExtractionMetadata {
                timestamp: Utc::now(),
                object_ref: "4 0".to_string(),
                sampling_rate: "1/6".to_string(),
            },
        }
    }

    fn extraction(images: Vec<SampledImage>) -> DocumentExtraction {
        DocumentExtraction {
            document_path: PathBuf::from("books/ab1.pdf"),
            images,
        }
    }

    #[test]
    fn test_empty_corpus_is_configuration_error() {
        let result = MetadataAggregator::new().finish();
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn test_dataset_info() {
        let mut aggregator = MetadataAggregator::new();
        aggregator.add_document(extraction(vec![image("a", 1901), image("b", 1875), image("c", 1901)]));
        aggregator.add_document(extraction(vec![]));

        let manifest = aggregator.finish().unwrap();
        let info = &manifest.dataset_info;
        assert_eq!(info.total_images, 3);
        assert_eq!(info.total_books, 2);
        assert_eq!(info.average_images_per_book, 1.5);
        assert_eq!(
            info.year_distribution.iter().collect::<Vec<_>>(),
            vec![(&1875, &1), (&1901, &2)]
        );
        let ids: Vec<&str> = manifest.images.iter().map(|i| i.image_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_manifest_json_shape() {
        let mut aggregator = MetadataAggregator::new();
        aggregator.add_document(extraction(vec![image("a", 1800)]));
        let value = serde_json::to_value(aggregator.finish().unwrap()).unwrap();

        assert_eq!(value["dataset_info"]["year_distribution"]["1800"], 1);
        let first = &value["images"][0];
        assert_eq!(first["source"]["pdf_file"], "books/ab1.pdf");
        assert_eq!(first["source"]["marc_file"], "catalog.mrc");
        assert_eq!(first["source"]["year"], 1800);
        assert_eq!(first["page_info"]["image_index"], 0);
        assert_eq!(first["extraction_metadata"]["object_ref"], "4 0");
    }
}
