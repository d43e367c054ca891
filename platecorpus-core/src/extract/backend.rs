//! Document backends for image extraction
//!
//! A backend exposes page count and the embedded raster images of a page
//! (raw stream bytes + container metadata). The lopdf backend is the only one
//! used in production; tests plug in in-memory sources.

use crate::error::{PipelineError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::{Path, PathBuf};

/// One embedded image stream as stored in the document
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    /// `(object number, generation)` of the image XObject
    pub object_ref: (u32, u16),
    pub declared_width: u32,
    pub declared_height: u32,
    /// Color space family name, e.g. `DeviceRGB`, `ICCBased`, `Indexed`
    pub color_space: Option<String>,
    /// Component count from an ICC profile's `/N`, when declared
    pub declared_components: Option<u32>,
    pub bits_per_component: Option<u32>,
    pub filters: Vec<String>,
    /// Stream bytes, still encoded
    pub data: Vec<u8>,
}

impl EmbeddedImage {
    /// Color components per sample, when the color space tells us
    pub fn components(&self) -> Option<u32> {
        match self.color_space.as_deref() {
            Some("DeviceGray" | "CalGray" | "Indexed" | "Separation") => Some(1),
            Some("DeviceRGB" | "CalRGB" | "Lab") => Some(3),
            Some("DeviceCMYK") => Some(4),
            _ => self.declared_components,
        }
    }

    pub fn object_ref_string(&self) -> String {
        format!("{} {}", self.object_ref.0, self.object_ref.1)
    }
}

/// One image XObject of a page: its metadata, or why it could not be read
pub type ImageEntry = std::result::Result<EmbeddedImage, String>;

/// Backend trait for paginated documents
pub trait DocumentSource {
    fn page_count(&self) -> usize;

    /// Image XObjects of the page at `page_index` (0-based), in resource order.
    /// A malformed entry is reported in place; its siblings are unaffected.
    fn page_images(&self, page_index: usize) -> Result<Vec<ImageEntry>>;
}

type Lookup<T> = std::result::Result<T, String>;

/// Page tree nodes followed before giving up on `/Parent` links
const MAX_TREE_DEPTH: usize = 64;

/// PDF backend built on lopdf
pub struct PdfDocument {
    path: PathBuf,
    document: Document,
    pages: Vec<ObjectId>,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self> {
        let document = Document::load(path).map_err(|source| PipelineError::Pdf {
            document: path.to_path_buf(),
            source,
        })?;
        // get_pages is keyed by 1-based page number, already in order
        let pages = document.get_pages().into_values().collect();

        Ok(Self {
            path: path.to_path_buf(),
            document,
            pages,
        })
    }

    fn pdf_error(&self, source: lopdf::Error) -> PipelineError {
        PipelineError::Pdf {
            document: self.path.clone(),
            source,
        }
    }

    /// `/Resources` of a page, or of its nearest ancestor in the page tree
    fn page_resources(&self, page_id: ObjectId) -> Result<Option<&Dictionary>> {
        let mut node_id = page_id;
        for _ in 0..MAX_TREE_DEPTH {
            let node = self.document.get_dictionary(node_id).map_err(|e| self.pdf_error(e))?;
            if let Ok(resources) = node.get(b"Resources") {
                let resources = self
                    .document
                    .dereference(resources)
                    .and_then(|(_, object)| object.as_dict())
                    .map_err(|e| self.pdf_error(e))?;
                return Ok(Some(resources));
            }
            match node.get(b"Parent").and_then(Object::as_reference) {
                Ok(parent_id) => node_id = parent_id,
                Err(_) => return Ok(None),
            }
        }
        Err(self.pdf_error(lopdf::Error::ReferenceCycle))
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> Lookup<&'a Object> {
        self.document
            .dereference(object)
            .map(|(_, object)| object)
            .map_err(|e| format!("unresolved reference: {e}"))
    }

    fn name(&self, object: &Object) -> Lookup<String> {
        let name = self.resolve(object)?.as_name().map_err(|_| "expected a name".to_string())?;
        Ok(String::from_utf8_lossy(name).into_owned())
    }

    fn integer(&self, dict: &Dictionary, key: &str) -> Lookup<Option<i64>> {
        let Ok(value) = dict.get(key.as_bytes()) else {
            return Ok(None);
        };
        let value = self.resolve(value)?.as_i64().map_err(|_| format!("/{key} is not an integer"))?;
        Ok(Some(value))
    }

    fn dimension(&self, dict: &Dictionary, key: &str) -> Lookup<u32> {
        let value = self.integer(dict, key)?.ok_or_else(|| format!("missing /{key}"))?;
        u32::try_from(value).map_err(|_| format!("/{key} {value} out of range"))
    }

    /// Color space family: the name itself, or the head of `[/ICCBased ...]`
    fn color_space(&self, dict: &Dictionary) -> Lookup<Option<String>> {
        let Ok(value) = dict.get(b"ColorSpace") else {
            return Ok(None);
        };
        match self.resolve(value)? {
            Object::Array(items) => match items.first() {
                Some(family) => self.name(family).map(Some).map_err(|e| format!("/ColorSpace: {e}")),
                None => Ok(None),
            },
            other => self.name(other).map(Some).map_err(|e| format!("/ColorSpace: {e}")),
        }
    }

    fn filters(&self, dict: &Dictionary) -> Lookup<Vec<String>> {
        let Ok(value) = dict.get(b"Filter") else {
            return Ok(Vec::new());
        };
        match self.resolve(value)? {
            Object::Array(items) => items
                .iter()
                .map(|item| self.name(item).map_err(|e| format!("/Filter element: {e}")))
                .collect(),
            other => Ok(vec![self.name(other).map_err(|e| format!("/Filter: {e}"))?]),
        }
    }

    /// `/N` of an ICC-based color space, e.g. `[/ICCBased 12 0 R]`
    fn icc_components(&self, dict: &Dictionary) -> Option<u32> {
        let color_space = self.resolve(dict.get(b"ColorSpace").ok()?).ok()?.as_array().ok()?;
        let profile = self.resolve(color_space.get(1)?).ok()?.as_stream().ok()?;
        let n = self.integer(&profile.dict, "N").ok()??;
        u32::try_from(n).ok()
    }

    /// `None` for XObjects that are not images (forms, PostScript)
    fn image_entry(&self, value: &Object) -> Lookup<Option<EmbeddedImage>> {
        let object_ref = value
            .as_reference()
            .map_err(|_| "XObject is not an indirect object".to_string())?;
        let stream = self
            .resolve(value)?
            .as_stream()
            .map_err(|_| "XObject is not a stream".to_string())?;
        let dict = &stream.dict;

        let is_image = match dict.get(b"Subtype") {
            Ok(subtype) => self.name(subtype)? == "Image",
            Err(_) => false,
        };
        if !is_image {
            return Ok(None);
        }

        let bits_per_component = self
            .integer(dict, "BitsPerComponent")?
            .map(|bits| u32::try_from(bits).map_err(|_| format!("/BitsPerComponent {bits} out of range")))
            .transpose()?;

        Ok(Some(EmbeddedImage {
            object_ref,
            declared_width: self.dimension(dict, "Width")?,
            declared_height: self.dimension(dict, "Height")?,
            color_space: self.color_space(dict)?,
            declared_components: self.icc_components(dict),
            bits_per_component,
            filters: self.filters(dict)?,
            data: stream.content.clone(),
        }))
    }
}

impl DocumentSource for PdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_images(&self, page_index: usize) -> Result<Vec<ImageEntry>> {
        let page_id = *self.pages.get(page_index).ok_or_else(|| {
            PipelineError::Configuration(format!(
                "page {page_index} out of range for {} ({} pages)",
                self.path.display(),
                self.pages.len()
            ))
        })?;

        // Text-only pages carry no XObject dictionary
        let Some(resources) = self.page_resources(page_id)? else {
            return Ok(Vec::new());
        };
        let Ok(xobjects) = resources.get(b"XObject") else {
            return Ok(Vec::new());
        };
        let xobjects = self
            .document
            .dereference(xobjects)
            .and_then(|(_, object)| object.as_dict())
            .map_err(|e| self.pdf_error(e))?;

        let mut entries = Vec::new();
        for (name, value) in xobjects.iter() {
            match self.image_entry(value) {
                Ok(Some(image)) => entries.push(Ok(image)),
                Ok(None) => {}
                Err(reason) => entries.push(Err(format!("/{}: {reason}", String::from_utf8_lossy(name)))),
            }
        }
        Ok(entries)
    }
}
