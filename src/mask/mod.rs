//! Binary masks and instance-mask volumes.
//!
//! A mask is an [`image::GrayImage`] whose pixels are `0` (background) or
//! `1` (foreground). Keeping masks as image buffers lets the augmentation
//! code warp them with the same `imageproc` routines as the pixels.

pub mod polygon;
pub mod rle;

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::dataset::{BBox, CategoryId};

/// Stacked per-instance masks of one image with their class ids.
///
/// `masks[i]` belongs to class `class_ids[i]`; both always have the same
/// length, the volume depth.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceMasks {
    pub width: u32,
    pub height: u32,
    pub masks: Vec<GrayImage>,
    pub class_ids: Vec<CategoryId>,
}

impl InstanceMasks {
    /// An empty volume of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            masks: Vec::new(),
            class_ids: Vec::new(),
        }
    }

    pub fn push(&mut self, mask: GrayImage, class_id: CategoryId) {
        self.masks.push(mask);
        self.class_ids.push(class_id);
    }

    /// Number of instances.
    pub fn depth(&self) -> usize {
        self.masks.len()
    }

    /// Value of instance `instance` at `(x, y)`; `false` outside the volume.
    pub fn get(&self, x: u32, y: u32, instance: usize) -> bool {
        self.masks
            .get(instance)
            .and_then(|mask| mask.get_pixel_checked(x, y))
            .is_some_and(|pixel| pixel[0] != 0)
    }
}

/// Number of foreground pixels.
pub fn area(mask: &GrayImage) -> u64 {
    mask.as_raw().iter().filter(|&&v| v != 0).count() as u64
}

/// Tight bounding box of the foreground in pixel-edge coordinates, or
/// `None` for an all-background mask.
pub fn bbox(mask: &GrayImage) -> Option<BBox> {
    let mut extent: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel[0] == 0 {
            continue;
        }
        extent = Some(match extent {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    extent.map(|(x0, y0, x1, y1)| {
        BBox::from_xyxy(x0 as f64, y0 as f64, (x1 + 1) as f64, (y1 + 1) as f64)
    })
}

/// Pixel-wise union of `masks`; an empty slice gives a blank canvas.
pub fn union(masks: &[GrayImage], width: u32, height: u32) -> GrayImage {
    let mut out = GrayImage::new(width, height);
    for mask in masks {
        for (x, y, pixel) in mask.enumerate_pixels() {
            if pixel[0] != 0 && x < width && y < height {
                out.put_pixel(x, y, Luma([1]));
            }
        }
    }
    out
}

/// Dice coefficient `2|A∩B| / (|A| + |B|)` of two equally sized masks.
///
/// Two empty masks count as a perfect match. Returns `None` if the
/// dimensions differ.
pub fn dice(a: &GrayImage, b: &GrayImage) -> Option<f64> {
    if a.dimensions() != b.dimensions() {
        return None;
    }
    let (mut both, mut total) = (0u64, 0u64);
    for (pa, pb) in a.as_raw().iter().zip(b.as_raw()) {
        let (fa, fb) = (*pa != 0, *pb != 0);
        both += u64::from(fa && fb);
        total += u64::from(fa) + u64::from(fb);
    }
    if total == 0 {
        return Some(1.0);
    }
    Some(2.0 * both as f64 / total as f64)
}

/// Tints the mask foreground over `image` with `color` at opacity `alpha`
/// and outlines `bbox` in the same colour.
///
/// Mask pixels outside the image are ignored.
pub fn overlay(
    image: &RgbImage,
    mask: &GrayImage,
    bbox: &BBox,
    color: Rgb<u8>,
    alpha: f32,
) -> RgbImage {
    let alpha = alpha.clamp(0.0, 1.0);
    let mut out = image.clone();
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel[0] == 0 {
            continue;
        }
        if let Some(target) = out.get_pixel_mut_checked(x, y) {
            for (c, &tint) in target.0.iter_mut().zip(color.0.iter()) {
                *c = ((1.0 - alpha) * f32::from(*c) + alpha * f32::from(tint)).round() as u8;
            }
        }
    }

    let (width, height) = out.dimensions();
    let clipped = bbox.clip(width, height);
    if width > 0 && height > 0 && clipped.width() > 0.0 && clipped.height() > 0.0 {
        let x = clipped.xmin.floor() as i32;
        let y = clipped.ymin.floor() as i32;
        let w = (clipped.xmax.ceil() as i32 - x).max(1) as u32;
        let h = (clipped.ymax.ceil() as i32 - y).max(1) as u32;
        draw_hollow_rect_mut(&mut out, Rect::at(x, y).of_size(w, h), color);
    }
    out
}
