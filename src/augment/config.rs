//! Per-transform parameters.
//!
//! Every range is sampled uniformly once per augmented image. Defaults
//! reproduce the parameters the cigarette-butt dataset was expanded with;
//! a YAML file may override any subset of them:
//!
//! ```yaml
//! noise:
//!   scale: [0.14, 51.0]
//! shear:
//!   degrees: [-10.0, 10.0]
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CocoaugError;

/// Parameters for all ten transform kinds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AugmentConfig {
    pub noise: NoiseConfig,
    pub salt_and_pepper: SaltAndPepperConfig,
    pub shear: ShearConfig,
    pub perspective: PerspectiveConfig,
    pub elastic: ElasticConfig,
    pub sigmoid_contrast: SigmoidContrastConfig,
    pub sharpen: SharpenConfig,
    pub superpixels: SuperpixelsConfig,
    pub rot90: Rot90Config,
}

impl AugmentConfig {
    /// Loads a config from a YAML file; missing keys keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, CocoaugError> {
        let text = fs::read_to_string(path)?;
        serde_yaml::from_str(&text).map_err(|source| CocoaugError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Additive Gaussian noise; `scale` is the standard deviation range in
/// 0..255 intensity units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NoiseConfig {
    pub scale: (f32, f32),
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            scale: (0.14, 0.2 * 255.0),
        }
    }
}

/// Fraction of pixels replaced by black or white.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SaltAndPepperConfig {
    pub rate: f64,
}

impl Default for SaltAndPepperConfig {
    fn default() -> Self {
        Self { rate: 0.17 }
    }
}

/// Horizontal shear about the image centre, in degrees.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShearConfig {
    pub degrees: (f32, f32),
}

impl Default for ShearConfig {
    fn default() -> Self {
        Self {
            degrees: (-20.0, 20.0),
        }
    }
}

/// Random perspective: each corner moves inwards by a fraction of the
/// image size drawn from `0..=s`, where `s` is drawn from `scale`. The
/// shift never exceeds `max_corner_shift`, which is clamped below 1/3:
/// beyond that two shifted corners can leave a third one reflex, and a
/// non-convex quad folds the projection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PerspectiveConfig {
    pub scale: (f32, f32),
    pub max_corner_shift: f32,
}

impl Default for PerspectiveConfig {
    fn default() -> Self {
        Self {
            scale: (0.13, 0.9),
            max_corner_shift: 0.3,
        }
    }
}

/// Elastic distortion: a uniform random displacement field smoothed with
/// a Gaussian of `sigma` and scaled by `alpha` pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElasticConfig {
    pub alpha: (f32, f32),
    pub sigma: f32,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            alpha: (0.6, 0.9),
            sigma: 1.0,
        }
    }
}

/// `v' = 1 / (1 + exp(gain * (cutoff - v)))` on intensities scaled to 0..1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SigmoidContrastConfig {
    pub gain: (f32, f32),
    pub cutoff: (f32, f32),
}

impl Default for SigmoidContrastConfig {
    fn default() -> Self {
        Self {
            gain: (3.0, 10.0),
            cutoff: (0.4, 0.6),
        }
    }
}

/// 3x3 sharpening kernel blended with the identity by `alpha`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SharpenConfig {
    pub alpha: (f32, f32),
    pub lightness: (f32, f32),
}

impl Default for SharpenConfig {
    fn default() -> Self {
        Self {
            alpha: (0.25, 0.75),
            lightness: (0.75, 1.5),
        }
    }
}

/// Grid superpixels: about `n_segments` cells, each replaced by its mean
/// colour with probability `p_replace`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SuperpixelsConfig {
    pub p_replace: f64,
    pub n_segments: u32,
}

impl Default for SuperpixelsConfig {
    fn default() -> Self {
        Self {
            p_replace: 0.3,
            n_segments: 144,
        }
    }
}

/// Clockwise quarter turns, drawn from `min..=max`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Rot90Config {
    pub quarter_turns: (u8, u8),
}

impl Default for Rot90Config {
    fn default() -> Self {
        Self {
            quarter_turns: (1, 3),
        }
    }
}
