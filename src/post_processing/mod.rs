//! Post-processing of written archives
//!
//! Raster assets are recompressed in place after an archive is written: images
//! wider than the configured limit are downscaled (aspect preserved) and JPEGs
//! are re-encoded at the configured quality. PNGs stay PNG. Every file is written
//! to a temporary sibling first and renamed over the original, so a failure
//! leaves the downloaded file untouched. Failures are logged and counted, never
//! propagated.

use crate::config::CompressionConfig;
use crate::error::{Error, Result};
use crate::types::Event;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Outcome of recompressing one assets directory
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompressionSummary {
    /// Files rewritten
    pub compressed: usize,
    /// Files left unchanged because they needed no work
    pub unchanged: usize,
    /// Files that could not be processed (original kept)
    pub failed: usize,
}

/// In-place raster recompressor
#[derive(Clone)]
pub struct ImageCompressor {
    config: CompressionConfig,
    event_tx: broadcast::Sender<Event>,
}

/// Raster formats handled by the compressor, by file extension
fn raster_format(path: &Path) -> Option<ImageFormat> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        "png" => Some(ImageFormat::Png),
        _ => None,
    }
}

impl ImageCompressor {
    /// Create a compressor emitting failures on `event_tx`
    pub fn new(config: CompressionConfig, event_tx: broadcast::Sender<Event>) -> Self {
        Self { config, event_tx }
    }

    /// Recompress every JPEG and PNG directly inside `assets_dir`.
    ///
    /// A missing directory is not an error (the article had no assets).
    pub async fn compress_dir(&self, assets_dir: &Path) -> CompressionSummary {
        let mut summary = CompressionSummary::default();

        let mut entries = match tokio::fs::read_dir(assets_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return summary,
            Err(e) => {
                warn!(dir = %assets_dir.display(), error = %e, "cannot list assets for compression");
                return summary;
            }
        };

        let mut files = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    if raster_format(&path).is_some() {
                        files.push(path);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %assets_dir.display(), error = %e, "error while listing assets");
                    break;
                }
            }
        }
        files.sort();

        for path in files {
            match self.compress_file(&path).await {
                Ok(true) => summary.compressed += 1,
                Ok(false) => summary.unchanged += 1,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "image compression failed");
                    self.event_tx
                        .send(Event::CompressionFailed {
                            path: path.clone(),
                            error: e.to_string(),
                        })
                        .ok();
                    summary.failed += 1;
                }
            }
        }

        info!(
            dir = %assets_dir.display(),
            compressed = summary.compressed,
            unchanged = summary.unchanged,
            failed = summary.failed,
            "asset compression finished"
        );
        summary
    }

    /// Recompress one file on the blocking pool; returns whether it was rewritten
    pub async fn compress_file(&self, path: &Path) -> Result<bool> {
        let config = self.config.clone();
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || compress_blocking(&owned, &config))
            .await
            .map_err(|e| Error::Image {
                path: path.to_path_buf(),
                reason: format!("compression task failed: {e}"),
            })?
    }
}

fn image_error(path: &Path, reason: impl std::fmt::Display) -> Error {
    Error::Image {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".temp");
    path.with_file_name(name)
}

fn compress_blocking(path: &Path, config: &CompressionConfig) -> Result<bool> {
    let format = raster_format(path).ok_or_else(|| image_error(path, "not a raster asset"))?;

    let image = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| image_error(path, e))?;

    let (width, height) = image.dimensions();
    let resized = width > config.max_width;
    if !resized && format == ImageFormat::Png {
        return Ok(false);
    }
    let image = if resized {
        let scaled_height =
            (u64::from(height) * u64::from(config.max_width) / u64::from(width)).max(1) as u32;
        image.resize_exact(config.max_width, scaled_height, FilterType::Lanczos3)
    } else {
        image
    };

    let temp = temp_path(path);
    let written = write_image(&image, format, &temp, config.jpeg_quality);
    if let Err(e) = written {
        std::fs::remove_file(&temp).ok();
        return Err(e);
    }
    std::fs::rename(&temp, path)?;

    debug!(
        path = %path.display(),
        from = %format!("{width}x{height}"),
        to = %format!("{}x{}", image.width(), image.height()),
        "image recompressed"
    );
    Ok(true)
}

fn write_image(image: &DynamicImage, format: ImageFormat, temp: &Path, quality: u8) -> Result<()> {
    match format {
        ImageFormat::Jpeg => {
            let file = std::fs::File::create(temp)?;
            let mut writer = BufWriter::new(file);
            let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
            DynamicImage::ImageRgb8(image.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| image_error(temp, e))?;
        }
        _ => {
            image
                .save_with_format(temp, ImageFormat::Png)
                .map_err(|e| image_error(temp, e))?;
        }
    }
    Ok(())
}
