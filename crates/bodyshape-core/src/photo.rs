//! Photo loading: decode, flatten transparency, bound the resolution.

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, RgbImage};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Longest side kept before pose estimation; larger photos are downscaled.
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("image file not found: {0}")]
    NotFound(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has no pixels")]
    Empty,
}

/// Basic facts about an image file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageInfo {
    pub format: Option<String>,
    pub width: u32,
    pub height: u32,
    pub color: String,
    pub has_alpha: bool,
}

/// Decode an image file.
pub fn load_path(path: &Path) -> Result<DynamicImage, PhotoError> {
    open_reader(path)?.decode().map_err(PhotoError::from)
}

/// Decode an in-memory JPEG, PNG or other supported buffer.
pub fn load_bytes(bytes: &[u8]) -> Result<DynamicImage, PhotoError> {
    if bytes.is_empty() {
        return Err(PhotoError::Empty);
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Turn a decoded image into the RGB frame handed to the pose model.
pub fn prepare(image: &DynamicImage, max_dimension: u32) -> Result<RgbImage, PhotoError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PhotoError::Empty);
    }
    let rgb = flatten_to_rgb(image);
    Ok(limit_dimension(rgb, max_dimension))
}

/// Convert to 8-bit RGB, compositing any transparency onto white.
pub fn flatten_to_rgb(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as f32 / 255.0;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Downscale so the longest side is at most `max_dimension`, keeping aspect ratio.
pub fn limit_dimension(image: RgbImage, max_dimension: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    if max_dimension == 0 || width.max(height) <= max_dimension {
        return image;
    }

    let (new_width, new_height) = if width > height {
        let h = (height as u64 * max_dimension as u64 / width as u64) as u32;
        (max_dimension, h.max(1))
    } else {
        let w = (width as u64 * max_dimension as u64 / height as u64) as u32;
        (w.max(1), max_dimension)
    };

    tracing::debug!(width, height, new_width, new_height, "downscaling photo");
    image::imageops::resize(&image, new_width, new_height, FilterType::Triangle)
}

/// Read format, dimensions and color type of an image file.
pub fn inspect(path: &Path) -> Result<ImageInfo, PhotoError> {
    let reader = open_reader(path)?;
    let format = reader.format().map(|f| format!("{f:?}"));
    let image = reader.decode()?;

    Ok(ImageInfo {
        format,
        width: image.width(),
        height: image.height(),
        color: format!("{:?}", image.color()),
        has_alpha: image.color().has_alpha(),
    })
}

fn open_reader(path: &Path) -> Result<ImageReader<std::io::BufReader<std::fs::File>>, PhotoError> {
    if !path.exists() {
        return Err(PhotoError::NotFound(path.display().to_string()));
    }
    let io_err = |source| PhotoError::Io {
        path: path.display().to_string(),
        source,
    };
    ImageReader::open(path)
        .map_err(io_err)?
        .with_guessed_format()
        .map_err(io_err)
}
