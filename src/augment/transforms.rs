//! The individual transforms.
//!
//! Photometric transforms return a new image. Geometric transforms return
//! a [`Warp`], which is then applied to pixels, mask and bbox alike.

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage};
use imageproc::geometric_transformations::{warp, warp_with, Interpolation, Projection};
use rand::{Rng, RngExt};

use super::config::{
    ElasticConfig, NoiseConfig, PerspectiveConfig, Rot90Config, SaltAndPepperConfig,
    SharpenConfig, ShearConfig, SigmoidContrastConfig, SuperpixelsConfig,
};
use super::Sample;
use crate::dataset::BBox;

const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const BACKGROUND: Luma<u8> = Luma([0]);

/// Draws uniformly from `[a, b]` (in either order).
fn uniform<R: Rng + ?Sized>(rng: &mut R, (a, b): (f32, f32)) -> f32 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if lo == hi {
        lo
    } else {
        rng.random_range(lo..=hi)
    }
}

pub(crate) fn additive_gaussian_noise<R: Rng + ?Sized>(
    image: &RgbImage,
    config: &NoiseConfig,
    rng: &mut R,
) -> RgbImage {
    let stddev = uniform(rng, config.scale);
    imageproc::noise::gaussian_noise(image, 0.0, f64::from(stddev), rng.random::<u64>())
}

pub(crate) fn salt_and_pepper<R: Rng + ?Sized>(
    image: &RgbImage,
    config: &SaltAndPepperConfig,
    rng: &mut R,
) -> RgbImage {
    let rate = config.rate.clamp(0.0, 1.0);
    imageproc::noise::salt_and_pepper_noise(image, rate, rng.random::<u64>())
}

pub(crate) fn sigmoid_contrast<R: Rng + ?Sized>(
    image: &RgbImage,
    config: &SigmoidContrastConfig,
    rng: &mut R,
) -> RgbImage {
    let gain = uniform(rng, config.gain);
    let cutoff = uniform(rng, config.cutoff);

    let mut lut = [0u8; 256];
    for (v, out) in lut.iter_mut().enumerate() {
        let scaled = v as f32 / 255.0;
        let y = 1.0 / (1.0 + (gain * (cutoff - scaled)).exp());
        *out = (y * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    let mut out = image.clone();
    for value in out.iter_mut() {
        *value = lut[usize::from(*value)];
    }
    out
}

pub(crate) fn sharpen<R: Rng + ?Sized>(
    image: &RgbImage,
    config: &SharpenConfig,
    rng: &mut R,
) -> RgbImage {
    let alpha = uniform(rng, config.alpha).clamp(0.0, 1.0);
    let lightness = uniform(rng, config.lightness);
    // (1 - alpha) * identity + alpha * [-1 .. 8 + lightness .. -1]
    let edge = -alpha;
    let centre = (1.0 - alpha) + alpha * (8.0 + lightness);
    let kernel = [edge, edge, edge, edge, centre, edge, edge, edge, edge];
    imageproc::filter::filter3x3::<_, f32, u8>(image, &kernel)
}

/// Replaces cells of a regular grid by their mean colour.
pub(crate) fn superpixels<R: Rng + ?Sized>(
    image: &RgbImage,
    config: &SuperpixelsConfig,
    rng: &mut R,
) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut out = image.clone();
    if width == 0 || height == 0 {
        return out;
    }

    let per_side = f64::from(config.n_segments.max(1)).sqrt().round().max(1.0) as u32;
    let cell_w = width.div_ceil(per_side.min(width));
    let cell_h = height.div_ceil(per_side.min(height));

    for y0 in (0..height).step_by(cell_h as usize) {
        for x0 in (0..width).step_by(cell_w as usize) {
            if rng.random::<f64>() >= config.p_replace {
                continue;
            }
            let (x1, y1) = ((x0 + cell_w).min(width), (y0 + cell_h).min(height));
            let mut sum = [0u64; 3];
            for y in y0..y1 {
                for x in x0..x1 {
                    for (acc, &c) in sum.iter_mut().zip(image.get_pixel(x, y).channels()) {
                        *acc += u64::from(c);
                    }
                }
            }
            let n = u64::from((x1 - x0) * (y1 - y0));
            let mean = Rgb(sum.map(|s| ((s + n / 2) / n) as u8));
            for y in y0..y1 {
                for x in x0..x1 {
                    out.put_pixel(x, y, mean);
                }
            }
        }
    }
    out
}

/// Per-pixel displacement in pixels; output pixel `p` samples input `p + d(p)`.
pub(crate) struct DisplacementField {
    dx: ImageBuffer<Luma<f32>, Vec<f32>>,
    dy: ImageBuffer<Luma<f32>, Vec<f32>>,
}

impl DisplacementField {
    fn at(&self, x: f64, y: f64) -> (f32, f32) {
        let px = (x.max(0.0) as u32).min(self.dx.width().saturating_sub(1));
        let py = (y.max(0.0) as u32).min(self.dx.height().saturating_sub(1));
        (self.dx.get_pixel(px, py)[0], self.dy.get_pixel(px, py)[0])
    }

    fn source(&self, x: f32, y: f32) -> (f32, f32) {
        let (dx, dy) = self.at(f64::from(x), f64::from(y));
        (x + dx, y + dy)
    }
}

/// A geometric transform shared by the image, its mask and its bbox.
pub(crate) enum Warp {
    Projective(Projection),
    Field(DisplacementField),
    /// Clockwise quarter turns.
    Rotate(u8),
    FlipLr,
}

impl Warp {
    /// Warps image and mask and maps the bbox.
    ///
    /// The bbox is the extent of its four mapped corners clipped to the
    /// output; if the mapping blows up it falls back to the warped mask.
    pub(crate) fn apply(&self, sample: &Sample) -> (RgbImage, GrayImage, BBox) {
        let (width, height) = sample.image.dimensions();
        let (image, mask) = match self {
            Warp::Projective(projection) => (
                warp(&sample.image, projection, Interpolation::Bilinear, BLACK),
                warp(&sample.mask, projection, Interpolation::Nearest, BACKGROUND),
            ),
            Warp::Field(field) => (
                warp_with(
                    &sample.image,
                    |x, y| field.source(x, y),
                    Interpolation::Bilinear,
                    BLACK,
                ),
                warp_with(
                    &sample.mask,
                    |x, y| field.source(x, y),
                    Interpolation::Nearest,
                    BACKGROUND,
                ),
            ),
            Warp::Rotate(turns) => (
                rotate_quarters(&sample.image, *turns),
                rotate_quarters(&sample.mask, *turns),
            ),
            Warp::FlipLr => (
                imageops::flip_horizontal(&sample.image),
                imageops::flip_horizontal(&sample.mask),
            ),
        };

        let (out_width, out_height) = image.dimensions();
        let corners = sample
            .bbox
            .corners()
            .map(|(x, y)| self.map_point(x, y, width, height));
        let bbox = BBox::from_points(&corners)
            .filter(BBox::is_finite)
            .or_else(|| crate::mask::bbox(&mask))
            .unwrap_or_default()
            .clip(out_width, out_height);
        (image, mask, bbox)
    }

    /// Maps an input point of a `width x height` image to output coordinates.
    fn map_point(&self, x: f64, y: f64, width: u32, height: u32) -> (f64, f64) {
        let (w, h) = (f64::from(width), f64::from(height));
        match self {
            Warp::Projective(projection) => {
                let (px, py) = *projection * (x as f32, y as f32);
                (f64::from(px), f64::from(py))
            }
            // First-order inverse of the backward field
            Warp::Field(field) => {
                let (dx, dy) = field.at(x, y);
                (x - f64::from(dx), y - f64::from(dy))
            }
            Warp::Rotate(turns) => match turns % 4 {
                1 => (h - y, x),
                2 => (w - x, h - y),
                3 => (y, w - x),
                _ => (x, y),
            },
            Warp::FlipLr => (w - x, y),
        }
    }
}

fn rotate_quarters<P>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
    turns: u8,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + 'static,
{
    match turns % 4 {
        1 => imageops::rotate90(image),
        2 => imageops::rotate180(image),
        3 => imageops::rotate270(image),
        _ => image.clone(),
    }
}

/// Projection about the image centre.
fn about_centre(dimensions: (u32, u32), projection: Projection) -> Projection {
    let (cx, cy) = (dimensions.0 as f32 / 2.0, dimensions.1 as f32 / 2.0);
    Projection::translate(-cx, -cy)
        .and_then(projection)
        .and_then(Projection::translate(cx, cy))
}

pub(crate) fn shear<R: Rng + ?Sized>(
    dimensions: (u32, u32),
    config: &ShearConfig,
    rng: &mut R,
) -> Option<Warp> {
    let degrees = uniform(rng, config.degrees);
    let factor = degrees.to_radians().tan();
    if !factor.is_finite() {
        return None;
    }
    let shear = Projection::from_matrix([1.0, -factor, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])?;
    Some(Warp::Projective(about_centre(dimensions, shear)))
}

const MAX_PERSPECTIVE_DRAWS: usize = 8;

/// Moves each corner inwards and stretches the resulting quad back to
/// the full frame.
///
/// The quad must be strictly convex; otherwise the corners are drawn
/// again, and `None` is returned if no draw succeeds.
pub(crate) fn perspective<R: Rng + ?Sized>(
    (width, height): (u32, u32),
    config: &PerspectiveConfig,
    rng: &mut R,
) -> Option<Warp> {
    let scale = uniform(rng, config.scale).abs();
    let cap = config.max_corner_shift.clamp(0.0, 0.33);
    let (w, h) = (width as f32, height as f32);
    let to = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];

    for _ in 0..MAX_PERSPECTIVE_DRAWS {
        let mut jitter = || uniform(rng, (0.0, scale)).min(cap);
        let from = [
            (jitter() * w, jitter() * h),
            (w - jitter() * w, jitter() * h),
            (w - jitter() * w, h - jitter() * h),
            (jitter() * w, h - jitter() * h),
        ];
        if !is_convex(&from) {
            continue;
        }
        if let Some(projection) = Projection::from_control_points(from, to) {
            return Some(Warp::Projective(projection));
        }
    }
    None
}

/// Whether the quad turns the same way at every corner.
fn is_convex(quad: &[(f32, f32); 4]) -> bool {
    let turns = (0..4).map(|i| {
        let (ax, ay) = quad[i];
        let (bx, by) = quad[(i + 1) % 4];
        let (cx, cy) = quad[(i + 2) % 4];
        (bx - ax) * (cy - by) - (by - ay) * (cx - bx)
    });
    let mut sign = 0.0f32;
    for turn in turns {
        if turn.abs() <= f32::EPSILON {
            return false;
        }
        if sign == 0.0 {
            sign = turn.signum();
        } else if turn.signum() != sign {
            return false;
        }
    }
    true
}

pub(crate) fn elastic<R: Rng + ?Sized>(
    (width, height): (u32, u32),
    config: &ElasticConfig,
    rng: &mut R,
) -> Option<Warp> {
    if width == 0 || height == 0 {
        return None;
    }
    let alpha = uniform(rng, config.alpha);
    let mut field = || {
        let noise = ImageBuffer::from_fn(width, height, |_, _| {
            Luma([rng.random_range(-1.0f32..=1.0)])
        });
        let mut smooth = if config.sigma > 0.0 {
            imageops::blur(&noise, config.sigma)
        } else {
            noise
        };
        for value in smooth.iter_mut() {
            *value *= alpha;
        }
        smooth
    };
    let dx = field();
    let dy = field();
    Some(Warp::Field(DisplacementField { dx, dy }))
}

pub(crate) fn rot90<R: Rng + ?Sized>(config: &Rot90Config, rng: &mut R) -> Warp {
    let (a, b) = config.quarter_turns;
    let turns = rng.random_range(a.min(b)..=a.max(b));
    Warp::Rotate(turns % 4)
}

/// Resizes an image to the given size; used when a stored record lies
/// about its dimensions.
pub(crate) fn resize_to(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Triangle)
}
