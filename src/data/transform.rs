// ============================================================
// Layer 4 — Geometric Transforms
// ============================================================
// Image and landmark transforms that keep both in the same
// pixel frame. Every transform is centred on the image
// midpoint (ox, oy) = (width / 2, height / 2).
//
//   downsample — integer binning, anti-aliased resize,
//                optional normalisation by the positive mean
//   rotate     — same-size rotation, uncovered area filled
//                with the positive mean
//   scale      — zoom about the centre, output cropped or
//                padded back to the input size
//
// Image content is resampled with `imageproc` warps; landmark
// coordinates use the closed-form formulas and are rounded to
// integer pixels.
//
// Rotation sign: the image is rotated by -angle in the usual
// counter-clockwise-positive convention (clockwise on screen),
// while landmarks use the standard formula
//   qx = ox + cos θ (x - ox) - sin θ (y - oy)
//   qy = oy + sin θ (x - ox) + cos θ (y - oy)
// This pairing is what existing augmented datasets were built
// with and must not be changed independently on either side.

use image::{imageops, imageops::FilterType, ImageBuffer, Luma};
use imageproc::geometric_transformations::{rotate_about_center, warp, Interpolation, Projection};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::data::image_io::FloatImage;
use crate::domain::error::{PipelineError, Result};
use crate::domain::landmark::Point;

/// Mean of the strictly positive samples of `img`.
///
/// Zero pixels are masked background and must not bias the
/// mean. An image with no positive sample has no defined mean.
pub fn positive_mean(img: &FloatImage) -> Result<f32> {
    let (sum, count) = img
        .iter()
        .filter(|&&v| v > 0.0)
        .fold((0.0f64, 0usize), |(s, n), &v| (s + v as f64, n + 1));

    if count == 0 {
        return Err(PipelineError::NoPositiveSamples);
    }
    Ok((sum / count as f64) as f32)
}

/// Centre of a `width × height` image in pixel coordinates.
pub fn image_center(width: u32, height: u32) -> (f64, f64) {
    (width as f64 / 2.0, height as f64 / 2.0)
}

// ─── Downsampling ─────────────────────────────────────────────────────────────

/// Bin `img` by `factor`: the output is
/// `(⌊width / factor⌋, ⌊height / factor⌋)`.
///
/// With `normalize`, every sample is divided by the mean of the
/// strictly positive samples of the binned image.
pub fn downsample(img: &FloatImage, factor: u32, normalize: bool) -> Result<FloatImage> {
    let (width, height) = img.dimensions();
    let (new_w, new_h)  = (width / factor.max(1), height / factor.max(1));
    if factor == 0 || new_w == 0 || new_h == 0 {
        return Err(PipelineError::InvalidBinning { factor, width, height });
    }

    let binned = resize_preserving_range(img, new_w, new_h);
    if normalize {
        normalized(&binned)
    } else {
        Ok(binned)
    }
}

/// Landmark counterpart of [`downsample`]: `round(p / factor)`.
pub fn downsample_point(p: Point, factor: u32) -> Point {
    let f = factor.max(1) as f64;
    Point::rounded(p.x as f64 / f, p.y as f64 / f)
}

/// Divide every sample by the positive mean.
pub fn normalized(img: &FloatImage) -> Result<FloatImage> {
    let mean    = positive_mean(img)?;
    let mut out = img.clone();
    out.iter_mut().for_each(|v| *v /= mean);
    Ok(out)
}

/// Anti-aliased resize that keeps the original intensity range.
///
/// The `image` resamplers clamp float pixels to [0, 1], so the
/// image is brought into that range by its peak value, resized
/// with a triangle filter (whose support widens with the
/// reduction ratio) and scaled back. Negative samples clamp to 0.
pub fn resize_preserving_range(img: &FloatImage, width: u32, height: u32) -> FloatImage {
    let peak = img.iter().copied().fold(0.0f32, f32::max);
    if peak <= 0.0 {
        return FloatImage::new(width, height);
    }

    let unit: FloatImage = ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
        Luma([img.get_pixel(x, y)[0].max(0.0) / peak])
    });

    let mut out = imageops::resize(&unit, width, height, FilterType::Triangle);
    out.iter_mut().for_each(|v| *v *= peak);
    out
}

// ─── Rotation ─────────────────────────────────────────────────────────────────

/// Rotate the image content about its centre by `angle_degrees`
/// (clockwise on screen), keeping the size. Uncovered pixels take
/// the positive mean of the input.
pub fn rotate_image(img: &FloatImage, angle_degrees: f64) -> Result<FloatImage> {
    let fill  = positive_mean(img)?;
    let theta = angle_degrees.to_radians() as f32;
    Ok(rotate_about_center(img, theta, Interpolation::Bilinear, Luma([fill])))
}

/// Rotate a landmark about `center` by `angle_degrees` with the
/// standard rotation formula, rounded to integer pixels.
pub fn rotate_point(p: Point, angle_degrees: f64, center: (f64, f64)) -> Point {
    let (ox, oy)     = center;
    let (sin, cos)   = angle_degrees.to_radians().sin_cos();
    let (dx, dy)     = (p.x as f64 - ox, p.y as f64 - oy);
    Point::rounded(ox + cos * dx - sin * dy, oy + sin * dx + cos * dy)
}

// ─── Zoom ─────────────────────────────────────────────────────────────────────

/// Zoom about the centre by `zoom`, keeping the size.
///
/// `zoom > 1` magnifies and crops to the original frame;
/// `zoom <= 1` shrinks and pads with the positive mean.
/// Both cases are the same centred affine map `q = c + zoom (p - c)`.
pub fn scale_image(img: &FloatImage, zoom: f64) -> Result<FloatImage> {
    if !(zoom.is_finite() && zoom > 0.0) {
        return Err(PipelineError::InvalidZoom(zoom));
    }
    let fill     = positive_mean(img)?;
    let (cx, cy) = image_center(img.width(), img.height());
    let z        = zoom as f32;

    #[rustfmt::skip]
    let matrix = [
        z,   0.0, cx as f32 * (1.0 - z),
        0.0, z,   cy as f32 * (1.0 - z),
        0.0, 0.0, 1.0,
    ];
    let projection = Projection::from_matrix(matrix).ok_or(PipelineError::InvalidZoom(zoom))?;
    Ok(warp(img, &projection, Interpolation::Bilinear, Luma([fill])))
}

/// Landmark counterpart of [`scale_image`].
pub fn scale_point(p: Point, zoom: f64, center: (f64, f64)) -> Point {
    let (ox, oy) = center;
    Point::rounded(ox + zoom * (p.x as f64 - ox), oy + zoom * (p.y as f64 - oy))
}

// ─── Noise ────────────────────────────────────────────────────────────────────

/// Add independent zero-mean Gaussian noise with standard
/// deviation `sigma` to every sample.
pub fn add_gaussian_noise<R: Rng + ?Sized>(img: &FloatImage, sigma: f32, rng: &mut R) -> Result<FloatImage> {
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(PipelineError::InvalidNoise(sigma));
    }
    let normal  = Normal::new(0.0f32, sigma).map_err(|_| PipelineError::InvalidNoise(sigma))?;
    let mut out = img.clone();
    out.iter_mut().for_each(|v| *v += normal.sample(rng));
    Ok(out)
}
