// ============================================================
// Layer 4 — Image I/O
// ============================================================
// Every image inside the pipeline is a single-channel f32 grid
// holding raw intensities (no rescaling to [0, 1]).
//
// Reading:
//   - TIFF files go through the `tiff` decoder so 16-bit and
//     32-bit float grayscale pages keep their exact values
//   - everything else goes through the `image` crate
//
// Writing:
//   - dataset images are written as 32-bit float grayscale TIFF,
//     so normalised and noise-injected values survive untouched.
//     The file keeps the sample's name whatever its extension;
//     readers detect the format from the content.

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use image::{DynamicImage, ImageBuffer, ImageFormat, ImageReader, Luma};
use tiff::{
    decoder::{Decoder, DecodingResult},
    encoder::{colortype::Gray32Float, TiffEncoder},
    ColorType,
};

use crate::domain::error::{PipelineError, Result};

/// Single-channel image with raw f32 intensities.
pub type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Read any supported image as grayscale f32, preserving the
/// sample range (a 16-bit pixel of 40000 stays 40000.0).
pub fn read_gray(path: &Path) -> Result<FloatImage> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;

    if reader.format() == Some(ImageFormat::Tiff) {
        if let Some(img) = read_gray_tiff(path)? {
            return Ok(img);
        }
    }

    Ok(dynamic_to_gray(reader.decode()?))
}

/// Only the image dimensions, as `(width, height)`.
pub fn read_dimensions(path: &Path) -> Result<(u32, u32)> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    if reader.format() == Some(ImageFormat::Tiff) {
        let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
        return Ok(decoder.dimensions()?);
    }
    Ok(reader.into_dimensions()?)
}

/// Write a dataset image as 32-bit float grayscale TIFF.
pub fn write_gray(path: &Path, img: &FloatImage) -> Result<()> {
    let file        = BufWriter::new(File::create(path)?);
    let mut encoder = TiffEncoder::new(file)?;
    encoder.write_image::<Gray32Float>(img.width(), img.height(), img.as_raw())?;
    Ok(())
}

/// Decode grayscale TIFF pages directly. Returns `None` for
/// layouts the `tiff` path does not handle (RGB, palette, ...),
/// which are left to the `image` crate.
fn read_gray_tiff(path: &Path) -> Result<Option<FloatImage>> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
    if !matches!(decoder.colortype()?, ColorType::Gray(_)) {
        return Ok(None);
    }
    let (width, height) = decoder.dimensions()?;

    let data: Vec<f32> = match decoder.read_image()? {
        DecodingResult::U8(v)  => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        _ => return Ok(None),
    };

    ImageBuffer::from_raw(width, height, data)
        .map(Some)
        .ok_or_else(|| PipelineError::UnsupportedImage(path.display().to_string()))
}

fn dynamic_to_gray(img: DynamicImage) -> FloatImage {
    match img {
        DynamicImage::ImageLuma8(b) => {
            let (w, h) = b.dimensions();
            to_float(w, h, b.into_raw().into_iter().map(f32::from))
        }
        DynamicImage::ImageLuma16(b) => {
            let (w, h) = b.dimensions();
            to_float(w, h, b.into_raw().into_iter().map(f32::from))
        }
        // Float colour images carry raw values already.
        float @ (DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_)) => float.to_luma32f(),
        other => {
            let b      = other.to_luma16();
            let (w, h) = b.dimensions();
            to_float(w, h, b.into_raw().into_iter().map(f32::from))
        }
    }
}

fn to_float(width: u32, height: u32, values: impl Iterator<Item = f32>) -> FloatImage {
    let mut out = FloatImage::new(width, height);
    for (dst, v) in out.iter_mut().zip(values) {
        *dst = v;
    }
    out
}
