//! Naming and saving processed images.
//!
//! Results are always PNG with an alpha channel, so the download name
//! forces a `.png` extension whatever the source format was.

use crate::error::BgRemoveError;
use crate::media::ImageData;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Suffix appended to the source stem.
pub const RESULT_SUFFIX: &str = "_no_bg";

/// `"vacation.jpg"` → `"vacation_no_bg.png"`.
///
/// Only the last extension is stripped (`"a.b.jpg"` → `"a.b_no_bg.png"`).
/// Any directory part of `filename` is dropped.
pub fn download_name(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string());
    format!("{stem}{RESULT_SUFFIX}.png")
}

/// Write `data` to `dir/name` atomically.
///
/// The bytes go to a temp file in `dir` first and are renamed into place,
/// so a crash never leaves a truncated PNG under the final name.
pub async fn save_image(data: &ImageData, dir: &Path, name: &str) -> Result<PathBuf, BgRemoveError> {
    let path = dir.join(name);
    let write_err = |source| BgRemoveError::OutputWriteFailed {
        path: path.clone(),
        source,
    };

    tokio::fs::create_dir_all(dir).await.map_err(write_err)?;

    let dir = dir.to_path_buf();
    let target = path.clone();
    let bytes = data.bytes.clone();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| write_err(std::io::Error::other(e)))?
    .map_err(write_err)?;

    info!("Saved {} ({} bytes)", path.display(), data.len());
    Ok(path)
}
