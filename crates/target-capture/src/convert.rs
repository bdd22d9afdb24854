//! Conversions between `image` crate buffers and capture frames.

use crate::core::{Image, ImageView, PixelFormat};
use ::image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error(transparent)]
    Image(#[from] ::image::ImageError),
    #[error("image buffer does not match its {width}x{height} {format:?} dimensions")]
    BufferMismatch {
        width: usize,
        height: usize,
        format: PixelFormat,
    },
}

pub fn gray_view(img: &GrayImage) -> ImageView<'_> {
    ImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        format: PixelFormat::Gray8,
        data: img.as_raw(),
    }
}

pub fn rgb_view(img: &RgbImage) -> ImageView<'_> {
    ImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        format: PixelFormat::Rgb8,
        data: img.as_raw(),
    }
}

pub fn rgba_view(img: &RgbaImage) -> ImageView<'_> {
    ImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        format: PixelFormat::Rgba8,
        data: img.as_raw(),
    }
}

/// Copy a decoded image into a frame, keeping gray, RGB and RGBA layouts.
/// Other layouts are converted to RGBA when they carry alpha, RGB otherwise.
pub fn frame_from_dynamic(img: &DynamicImage) -> Image {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let (format, data) = match img {
        DynamicImage::ImageLuma8(g) => (PixelFormat::Gray8, g.as_raw().clone()),
        DynamicImage::ImageRgb8(c) => (PixelFormat::Rgb8, c.as_raw().clone()),
        DynamicImage::ImageRgba8(c) => (PixelFormat::Rgba8, c.as_raw().clone()),
        other if other.color().has_alpha() => (PixelFormat::Rgba8, other.to_rgba8().into_raw()),
        other => (PixelFormat::Rgb8, other.to_rgb8().into_raw()),
    };
    Image {
        width,
        height,
        format,
        data,
    }
}

pub fn to_dynamic(img: &Image) -> Result<DynamicImage, ConvertError> {
    let mismatch = || ConvertError::BufferMismatch {
        width: img.width,
        height: img.height,
        format: img.format,
    };
    let (w, h) = (img.width as u32, img.height as u32);
    let data = img.data.clone();
    Ok(match img.format {
        PixelFormat::Gray8 => DynamicImage::ImageLuma8(GrayImage::from_raw(w, h, data).ok_or_else(mismatch)?),
        PixelFormat::Rgb8 => DynamicImage::ImageRgb8(RgbImage::from_raw(w, h, data).ok_or_else(mismatch)?),
        PixelFormat::Rgba8 => DynamicImage::ImageRgba8(RgbaImage::from_raw(w, h, data).ok_or_else(mismatch)?),
    })
}

pub fn load_frame(path: impl AsRef<Path>) -> Result<Image, ConvertError> {
    let img = ::image::ImageReader::open(path)
        .map_err(::image::ImageError::IoError)?
        .decode()?;
    Ok(frame_from_dynamic(&img))
}

/// Save with the format implied by the file extension.
pub fn save_image(img: &Image, path: impl AsRef<Path>) -> Result<(), ConvertError> {
    to_dynamic(img)?.save(path)?;
    Ok(())
}
