//! In-memory image payloads.
//!
//! [`ImageData`] wraps a [`Bytes`] buffer, so cloning it shares the
//! underlying allocation instead of copying pixels. The same bytes can sit
//! in the active job and in a history record at once.

use crate::error::BgRemoveError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use image::{ImageFormat, ImageReader};
use serde::Serialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Raw image bytes plus the declared MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Bytes,
    pub mime_type: String,
}

impl ImageData {
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Width and height, read from the header only. `None` if the bytes are
    /// not a format the `image` crate recognises.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        ImageReader::new(Cursor::new(&self.bytes[..]))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    }

    /// `data:` URL suitable for an `<img src>` preview.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

/// A user-selected file: display name and its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub data: ImageData,
}

/// Summary of an image used in CLI and JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct ImageInfo {
    pub mime_type: String,
    pub size: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl From<&ImageData> for ImageInfo {
    fn from(data: &ImageData) -> Self {
        let dims = data.dimensions();
        Self {
            mime_type: data.mime_type.clone(),
            size: data.len() as u64,
            width: dims.map(|d| d.0),
            height: dims.map(|d| d.1),
        }
    }
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: ImageData::new(bytes, mime_type),
        }
    }

    /// Byte size of the payload.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn mime_type(&self) -> &str {
        &self.data.mime_type
    }

    /// Load a file from disk, declaring its MIME type from its content.
    ///
    /// The content sniff wins over the extension so a renamed PNG is still
    /// uploaded as `image/png`. Unknown content falls back to the extension,
    /// then to `application/octet-stream` (which the validator rejects).
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, BgRemoveError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BgRemoveError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => BgRemoveError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => BgRemoveError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let mime = sniff_mime(&bytes, path);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        debug!("Loaded {} ({} bytes, {})", path.display(), bytes.len(), mime);
        Ok(Self::new(name, mime, bytes))
    }
}

/// Best-effort MIME type for `bytes` read from `path`.
pub fn sniff_mime(bytes: &[u8], path: &Path) -> String {
    let format = image::guess_format(bytes)
        .ok()
        .or_else(|| ImageFormat::from_path(path).ok());
    match format {
        Some(f) => f.to_mime_type().to_string(),
        None => "application/octet-stream".to_string(),
    }
}

/// Resolve the `--output` argument: a directory, or the input's parent.
pub fn output_dir_for(input: &Path, output: Option<&Path>) -> PathBuf {
    match output {
        Some(dir) => dir.to_path_buf(),
        None => input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    }
}
