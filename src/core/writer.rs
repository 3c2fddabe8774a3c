//! Image writer.
//!
//! The PNG is encoded in memory and written through a sibling temp file that
//! is renamed into place, so a failed write never leaves a truncated image at
//! the target path. Missing parent directories are not created.

use crate::core::error::QrtagError;
use crate::core::store::LookupKey;
use image::{GrayImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use ulid::Ulid;

pub const DEFAULT_PREFIX: &str = "qr_";
pub const IMAGE_EXTENSION: &str = "png";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub prefix: String,
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            dir: PathBuf::from("."),
        }
    }
}

impl OutputConfig {
    pub fn path_for(&self, key: &LookupKey) -> PathBuf {
        let file = format!("{}{}.{}", self.prefix, key, IMAGE_EXTENSION);
        if self.dir.as_os_str().is_empty() || self.dir == Path::new(".") {
            PathBuf::from(file)
        } else {
            self.dir.join(file)
        }
    }
}

/// `qr_<key>.png`, relative to the working directory.
pub fn default_path(key: &LookupKey) -> PathBuf {
    OutputConfig::default().path_for(key)
}

pub fn encode_png(image: &GrayImage) -> Result<Vec<u8>, QrtagError> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| QrtagError::EncodingError(format!("PNG encoding failed: {}", e)))?;
    Ok(buf.into_inner())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, Ulid::new()))
}

/// Persist `image` as PNG at `path` and return the path.
pub fn write(image: &GrayImage, path: &Path) -> Result<PathBuf, QrtagError> {
    let bytes = encode_png(image)?;
    persist(&bytes, &temp_sibling(path), path)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "image written");
    Ok(path.to_path_buf())
}

/// Write `bytes` to `tmp`, then rename onto `path`. `tmp` is gone afterwards
/// whichever step fails.
fn persist(bytes: &[u8], tmp: &Path, path: &Path) -> Result<(), QrtagError> {
    let result = fs::write(tmp, bytes).and_then(|()| fs::rename(tmp, path));
    if let Err(e) = result {
        if let Err(cleanup) = fs::remove_file(tmp)
            && cleanup.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(tmp = %tmp.display(), error = %cleanup, "temp file left behind");
        }
        return Err(QrtagError::io(path, e));
    }
    Ok(())
}
