//! Static image assets: the background and the moon-phase icons.
//!
//! Images are decoded on tokio's blocking pool and scaled once, at load
//! time, to the size they are drawn at. The compositor then only blends.

use image::imageops::FilterType;
use image::{ImageReader, RgbaImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("opening {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("decoding {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("unsupported image type: {0}")]
    Unsupported(PathBuf),

    #[error("image loader task failed: {0}")]
    Task(String),
}

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
}

/// Load an image from disk and resize it to exactly `width`×`height`.
pub fn load_scaled(path: &Path, width: u32, height: u32) -> Result<RgbaImage, AssetError> {
    if !is_supported_image(path) {
        return Err(AssetError::Unsupported(path.to_path_buf()));
    }
    let img = ImageReader::open(path)
        .map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .decode()
        .map_err(|source| AssetError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(img
        .resize_exact(width, height, FilterType::Lanczos3)
        .to_rgba8())
}

/// `load_scaled` on the blocking pool, so the drive loop never waits on
/// disk or decode.
pub async fn load_scaled_async(
    path: PathBuf,
    width: u32,
    height: u32,
) -> Result<RgbaImage, AssetError> {
    tokio::task::spawn_blocking(move || load_scaled(&path, width, height))
        .await
        .map_err(|e| AssetError::Task(e.to_string()))?
}

/// Phase indices whose `phase_<n>.png` is missing from `moon_dir`.
pub fn missing_moon_phases(moon_dir: &Path) -> Vec<u8> {
    (0..8)
        .filter(|n| !moon_dir.join(format!("phase_{n}.png")).is_file())
        .collect()
}
