//! Joint image/mask/bbox augmentation.
//!
//! [`augment`] applies one [`TransformKind`] to a [`Sample`]: the pixels,
//! the binary mask and the bounding box move together. Photometric kinds
//! only touch the pixels. Geometric kinds warp the pixels bilinearly and
//! the mask with nearest-neighbour sampling, and push the four bbox
//! corners through the same mapping; the new bbox is the axis-aligned
//! extent of the mapped corners clipped to the output image.
//!
//! [`expand`] drives this over a whole dataset.

pub mod config;
mod expand;
mod transforms;

pub use config::AugmentConfig;
pub use expand::{expand, expand_with_rng, ExpandOptions, ExpansionReport, Schedule};

use std::fmt;
use std::str::FromStr;

use image::{GrayImage, RgbImage};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::BBox;

/// Errors from selecting or applying a transform.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AugmentError {
    #[error("unknown transform mode {0} (expected 1..=10)")]
    UnknownTransform(usize),

    #[error("unknown transform '{0}' (expected one of: {names})", names = TransformKind::names())]
    UnknownTransformName(String),

    #[error("image is {image_width}x{image_height} but mask is {mask_width}x{mask_height}")]
    ShapeMismatch {
        image_width: u32,
        image_height: u32,
        mask_width: u32,
        mask_height: u32,
    },

    #[error("{0} produced a degenerate transform")]
    Degenerate(TransformKind),
}

/// The ten supported transforms.
///
/// The declaration order matches the legacy numeric modes `1..=10`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformKind {
    AdditiveGaussianNoise,
    SaltAndPepper,
    Shear,
    Perspective,
    Elastic,
    SigmoidContrast,
    Sharpen,
    Superpixels,
    Rot90,
    FlipLr,
}

impl TransformKind {
    pub const ALL: [TransformKind; 10] = [
        TransformKind::AdditiveGaussianNoise,
        TransformKind::SaltAndPepper,
        TransformKind::Shear,
        TransformKind::Perspective,
        TransformKind::Elastic,
        TransformKind::SigmoidContrast,
        TransformKind::Sharpen,
        TransformKind::Superpixels,
        TransformKind::Rot90,
        TransformKind::FlipLr,
    ];

    /// Maps a legacy mode number (`1..=10`) to a kind.
    pub fn from_index(index: usize) -> Result<Self, AugmentError> {
        index
            .checked_sub(1)
            .and_then(|i| Self::ALL.get(i))
            .copied()
            .ok_or(AugmentError::UnknownTransform(index))
    }

    /// The legacy mode number of this kind.
    pub fn index(self) -> usize {
        self as usize + 1
    }

    pub fn name(self) -> &'static str {
        match self {
            TransformKind::AdditiveGaussianNoise => "noise",
            TransformKind::SaltAndPepper => "salt-and-pepper",
            TransformKind::Shear => "shear",
            TransformKind::Perspective => "perspective",
            TransformKind::Elastic => "elastic",
            TransformKind::SigmoidContrast => "sigmoid-contrast",
            TransformKind::Sharpen => "sharpen",
            TransformKind::Superpixels => "superpixels",
            TransformKind::Rot90 => "rot90",
            TransformKind::FlipLr => "fliplr",
        }
    }

    /// Whether the kind moves pixels (and therefore the mask and bbox).
    pub fn is_geometric(self) -> bool {
        matches!(
            self,
            TransformKind::Shear
                | TransformKind::Perspective
                | TransformKind::Elastic
                | TransformKind::Rot90
                | TransformKind::FlipLr
        )
    }

    fn names() -> String {
        Self::ALL
            .iter()
            .map(|kind| kind.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransformKind {
    type Err = AugmentError;

    /// Accepts the kind name or its legacy mode number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(index) = s.parse::<usize>() {
            return Self::from_index(index);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| AugmentError::UnknownTransformName(s.to_string()))
    }
}

/// One image with the mask and bbox of its annotation of interest.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub image: RgbImage,
    /// 0/1 mask with the same dimensions as `image`.
    pub mask: GrayImage,
    pub bbox: BBox,
}

/// Output of [`augment`].
#[derive(Clone, Debug, PartialEq)]
pub struct AugmentedSample {
    pub kind: TransformKind,
    pub image: RgbImage,
    pub mask: GrayImage,
    pub bbox: BBox,
}

impl AugmentedSample {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Applies `kind` jointly to the image, mask and bbox of `sample`.
///
/// Random parameters are drawn from `config` using `rng`, so a seeded
/// generator gives reproducible output.
pub fn augment<R: Rng + ?Sized>(
    sample: &Sample,
    kind: TransformKind,
    config: &AugmentConfig,
    rng: &mut R,
) -> Result<AugmentedSample, AugmentError> {
    let (image_width, image_height) = sample.image.dimensions();
    let (mask_width, mask_height) = sample.mask.dimensions();
    if (image_width, image_height) != (mask_width, mask_height) {
        return Err(AugmentError::ShapeMismatch {
            image_width,
            image_height,
            mask_width,
            mask_height,
        });
    }

    let image = &sample.image;
    let photometric = match kind {
        TransformKind::AdditiveGaussianNoise => {
            Some(transforms::additive_gaussian_noise(image, &config.noise, rng))
        }
        TransformKind::SaltAndPepper => {
            Some(transforms::salt_and_pepper(image, &config.salt_and_pepper, rng))
        }
        TransformKind::SigmoidContrast => {
            Some(transforms::sigmoid_contrast(image, &config.sigmoid_contrast, rng))
        }
        TransformKind::Sharpen => Some(transforms::sharpen(image, &config.sharpen, rng)),
        TransformKind::Superpixels => {
            Some(transforms::superpixels(image, &config.superpixels, rng))
        }
        _ => None,
    };
    if let Some(image) = photometric {
        return Ok(AugmentedSample {
            kind,
            image,
            mask: sample.mask.clone(),
            bbox: sample.bbox,
        });
    }

    let warp = match kind {
        TransformKind::Shear => transforms::shear(image.dimensions(), &config.shear, rng),
        TransformKind::Perspective => {
            transforms::perspective(image.dimensions(), &config.perspective, rng)
        }
        TransformKind::Elastic => transforms::elastic(image.dimensions(), &config.elastic, rng),
        TransformKind::Rot90 => Some(transforms::rot90(&config.rot90, rng)),
        _ => Some(transforms::Warp::FlipLr),
    }
    .ok_or(AugmentError::Degenerate(kind))?;

    let (image, mask, bbox) = warp.apply(sample);
    Ok(AugmentedSample {
        kind,
        image,
        mask,
        bbox,
    })
}
