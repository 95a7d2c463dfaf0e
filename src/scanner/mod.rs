use crate::error::{ReconError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tif", "tiff"];

fn is_image_extension(ext: &str) -> bool {
    let lower = ext.to_lowercase();
    IMAGE_EXTENSIONS.contains(&lower.as_str())
}

/// フォルダ直下のマーキング写真をファイル名順で返す
pub fn scan_photos(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(ReconError::FolderNotFound(folder.display().to_string()));
    }

    let mut photos: Vec<PathBuf> = WalkDir::new(folder)
        .max_depth(1) // 直下のみ
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .map(|ext| is_image_extension(&ext.to_string_lossy()))
                .unwrap_or(false)
        })
        .collect();

    photos.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    tracing::debug!(folder = %folder.display(), count = photos.len(), "写真をスキャン");

    Ok(photos)
}
