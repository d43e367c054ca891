use crate::error::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Stable image id: truncated SHA-256 over the image's position.
///
/// A pure function of `(document_path, page_index, image_index)`, so
/// re-extracting a document yields the same ids and overwrites the same files.
pub fn compute_image_id(document_path: &str, page_index: usize, image_index: usize, length: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{document_path}_{page_index}_{image_index}").as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..length.min(digest.len())].to_string()
}

/// Write-side storage for extraction artifacts
pub struct ArtifactStore {
    images_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(images_dir: &Path) -> Result<Self> {
        fs::create_dir_all(images_dir)?;
        Ok(Self {
            images_dir: images_dir.to_path_buf(),
        })
    }

    pub fn image_path(&self, image_id: &str, extension: &str) -> PathBuf {
        self.images_dir.join(format!("{image_id}.{extension}"))
    }

    /// Store raw image bytes as-is under `{image_id}.{extension}`
    pub fn write_image(&self, image_id: &str, extension: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.image_path(image_id, extension);
        let mut writer = BufWriter::new(File::create(&path)?);
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(path)
    }
}

/// Serialize `value` as pretty JSON and move it into place atomically.
///
/// The document is written to a sibling `.tmp` file first, so readers never
/// observe a half-written artifact.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let result = write_json(&tmp_path, value).and_then(|()| Ok(fs::rename(&tmp_path, path)?));
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

/// Read back a JSON artifact written by [`write_json_atomic`]
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
