//! Stage B image extraction: sampled pages → stored image bytes + provenance.
//!
//! ```text
//! document ──► select_pages ──► page_images ──► inspect ──► ArtifactStore
//!                                   │                │
//!                               (page error)   (entry or decode error)
//!                                 warn, skip       warn, skip image
//! ```
//!
//! Image bytes are written exactly as they are stored in the document;
//! inspection only reads headers (or inflates raw samples) to learn the
//! intrinsic geometry.

pub mod backend;
pub mod intrinsic;

pub use backend::{DocumentSource, EmbeddedImage, ImageEntry, PdfDocument};
pub use intrinsic::{IntrinsicProperties, NativeEncoding};

use crate::config::SamplingConfig;
use crate::error::{PipelineError, Result};
use crate::sampling::{sampling_rate_descriptor, select_pages};
use crate::storage::{compute_image_id, ArtifactStore};
use crate::types::{
    ExtractionMetadata, ImageProperties, ImageSource, PageInfo, RecordReference, SampledImage,
};
use chrono::Utc;
use std::path::Path;
use tracing::{debug, warn};

pub struct ImageExtractor<'a> {
    store: &'a ArtifactStore,
    sampling: &'a SamplingConfig,
    image_id_length: usize,
}

impl<'a> ImageExtractor<'a> {
    pub fn new(store: &'a ArtifactStore, sampling: &'a SamplingConfig, image_id_length: usize) -> Self {
        Self {
            store,
            sampling,
            image_id_length,
        }
    }

    /// Open a PDF and extract the images of its sampled pages
    pub fn extract(&self, document_path: &Path, record: &RecordReference) -> Result<Vec<SampledImage>> {
        let document = PdfDocument::open(document_path)?;
        self.extract_from(&document, document_path, record)
    }

    /// Extract from any [`DocumentSource`].
    ///
    /// Page and image failures are logged and skipped; only storage errors
    /// abort the document.
    pub fn extract_from<S: DocumentSource + ?Sized>(
        &self,
        source: &S,
        document_path: &Path,
        record: &RecordReference,
    ) -> Result<Vec<SampledImage>> {
        let total_pages = source.page_count();
        let selected = select_pages(total_pages, self.sampling);
        let Some(sampling_rate) = sampling_rate_descriptor(total_pages, selected.len()) else {
            debug!(document = %document_path.display(), total_pages, "too short to sample");
            return Ok(Vec::new());
        };
        let document_name = document_path.to_string_lossy();

        let mut extracted = Vec::new();
        for page_index in selected {
            let page_images = match source.page_images(page_index) {
                Ok(images) => images,
                Err(e) => {
                    warn!(document = %document_path.display(), page = page_index, "skipping page: {e}");
                    continue;
                }
            };

            let images_on_page = page_images.len();
            for (image_index, entry) in page_images.iter().enumerate() {
                let decoded = entry.as_ref().map_err(String::clone).and_then(|image| {
                    let encoding = NativeEncoding::from_filters(&image.filters);
                    intrinsic::inspect(image, &encoding).map(|intrinsic| (image, encoding, intrinsic))
                });
                let (image, encoding, intrinsic) = match decoded {
                    Ok(decoded) => decoded,
                    Err(reason) => {
                        let err = PipelineError::ImageDecode {
                            document: document_path.to_path_buf(),
                            page: page_index,
                            index: image_index,
                            reason,
                        };
                        warn!("skipping image: {err}");
                        continue;
                    }
                };

                if (intrinsic.width, intrinsic.height) != (image.declared_width, image.declared_height) {
                    debug!(
                        document = %document_path.display(),
                        page = page_index,
                        image = image_index,
                        "declared {}x{} but stream is {}x{}",
                        image.declared_width,
                        image.declared_height,
                        intrinsic.width,
                        intrinsic.height
                    );
                }

                let image_id = compute_image_id(&document_name, page_index, image_index, self.image_id_length);
                let stored = self.store.write_image(&image_id, encoding.extension(), &image.data)?;

                extracted.push(SampledImage {
                    image_id,
                    source: ImageSource {
                        document_path: document_name.to_string(),
                        record: record.clone(),
                    },
                    page_info: PageInfo {
                        page_number: page_index,
                        total_pages,
                        relative_position: page_index as f64 / total_pages as f64,
                        images_on_page,
                        image_index_on_page: image_index,
                    },
                    image_properties: ImageProperties {
                        path: stored.to_string_lossy().into_owned(),
                        extension: encoding.extension().to_string(),
                        colorspace: image.color_space.clone().unwrap_or_default(),
                        width: intrinsic.width,
                        height: intrinsic.height,
                        size_bytes: intrinsic.size_bytes,
                        mode: intrinsic.mode,
                        original_dpi: intrinsic.resolution,
                        compression: image.filters.join("+"),
                    },
                    extraction_metadata: ExtractionMetadata {
                        timestamp: Utc::now(),
                        object_ref: image.object_ref_string(),
                        sampling_rate: sampling_rate.clone(),
                    },
                });
            }
        }

        debug!(document = %document_path.display(), images = extracted.len(), "extraction done");
        Ok(extracted)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::collections::BTreeSet;
    use std::io::Cursor;

    pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    pub fn jpeg_image(object_number: u32, width: u32, height: u32) -> EmbeddedImage {
        EmbeddedImage {
            object_ref: (object_number, 0),
            declared_width: width,
            declared_height: height,
            color_space: Some("DeviceRGB".to_string()),
            declared_components: None,
            bits_per_component: Some(8),
            filters: vec!["DCTDecode".to_string()],
            data: jpeg_bytes(width, height),
        }
    }

    /// In-memory document: one entry list per page
    pub struct FakeBook {
        pub pages: Vec<Vec<ImageEntry>>,
        pub failing_pages: BTreeSet<usize>,
    }

    impl FakeBook {
        /// `total_pages` pages, each holding one small JPEG
        pub fn with_jpeg_per_page(total_pages: usize) -> Self {
            Self {
                pages: (0..total_pages)
                    .map(|i| vec![Ok(jpeg_image(100 + i as u32, 16, 12))])
                    .collect(),
                failing_pages: BTreeSet::new(),
            }
        }
    }

    impl DocumentSource for FakeBook {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_images(&self, page_index: usize) -> Result<Vec<ImageEntry>> {
            if self.failing_pages.contains(&page_index) {
                return Err(PipelineError::Configuration(format!("broken page {page_index}")));
            }
            Ok(self.pages[page_index].clone())
        }
    }
}
