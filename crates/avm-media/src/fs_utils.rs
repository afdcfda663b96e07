//! Filesystem helpers for producing outputs atomically.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Temporary sibling path FFmpeg writes to before the final rename.
///
/// The extension is kept so FFmpeg still infers the container.
pub fn partial_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let name = match output.extension() {
        Some(ext) => format!("{}.partial.{}", stem, ext.to_string_lossy()),
        None => format!("{}.partial", stem),
    };
    output.with_file_name(name)
}

/// Create the parent directory of `path` if needed.
pub async fn ensure_parent(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// Tries a rename first. On EXDEV it copies to a temporary file next to
/// `dst`, renames that into place and removes `src`.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    ensure_parent(dst).await?;

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_file(src, dst).await?;
            fs::remove_file(src).await?;
            Ok(())
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Copy a file so that `dst` only ever appears complete.
pub async fn copy_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if !src.exists() {
        return Err(MediaError::FileNotFound(src.to_path_buf()));
    }

    ensure_parent(dst).await?;

    let tmp = partial_path(dst);
    if let Err(e) = fs::copy(src, &tmp).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    fs::rename(&tmp, dst).await?;
    Ok(())
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV is error code 18 on Linux/macOS
    e.raw_os_error() == Some(18)
}
