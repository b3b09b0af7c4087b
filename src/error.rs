use std::path::PathBuf;
use thiserror::Error;

use crate::augment::AugmentError;
use crate::dataset::ImageId;
use crate::mask::rle::RleError;

/// The main error type for cocoaug operations.
#[derive(Debug, Error)]
pub enum CocoaugError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse COCO annotations from {path}: {source}")]
    AnnotationParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write COCO annotations to {path}: {source}")]
    AnnotationWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Class id {id} for category '{name}' cannot be less than one (0 is reserved for the background)")]
    InvalidCategory { id: i64, name: String },

    #[error("Image {0} is not part of the dataset")]
    UnknownImage(ImageId),

    #[error("Image {0} has no annotations to build a mask from")]
    EmptyMask(ImageId),

    #[error("Mask for image {image_id} is {found_width}x{found_height}, expected {width}x{height}")]
    MaskDimensions {
        image_id: ImageId,
        width: u32,
        height: u32,
        found_width: u32,
        found_height: u32,
    },

    #[error("Failed to read image {path}: {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write image {path}: {source}")]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to parse augmentation config from {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("RLE error: {0}")]
    Rle(#[from] RleError),

    #[error("Augmentation error: {0}")]
    Augment(#[from] AugmentError),

    #[error("Invalid expansion parameters: {message}")]
    InvalidExpandParams { message: String },
}
