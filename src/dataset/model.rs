//! In-memory records for a loaded COCO segmentation dataset.

use std::path::PathBuf;

use super::bbox::BBox;
use super::ids::{AnnotationId, CategoryId, ImageId};

/// A category (class label). Ids start at 1.
#[derive(Clone, Debug, PartialEq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub supercategory: Option<String>,
}

impl Category {
    pub fn new(id: impl Into<CategoryId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            supercategory: None,
        }
    }

    pub fn with_supercategory(mut self, supercategory: impl Into<String>) -> Self {
        self.supercategory = Some(supercategory.into());
        self
    }
}

/// Standard COCO RLE counts: compressed string or plain count list.
#[derive(Clone, Debug, PartialEq)]
pub enum CocoRleCounts {
    Compressed(String),
    Uncompressed(Vec<u32>),
}

/// How an annotation's instance shape is stored.
#[derive(Clone, Debug, PartialEq)]
pub enum Segmentation {
    /// One or more flat `[x0, y0, x1, y1, ...]` polygons (`iscrowd = 0`).
    /// Each polygon becomes its own mask instance.
    Polygons(Vec<Vec<f64>>),
    /// A run-length string written by [`crate::mask::rle::encode`] (`iscrowd = 1`).
    RunLength(String),
    /// A standard COCO RLE object `{size: [h, w], counts}` in column-major order.
    CocoRle { size: [u32; 2], counts: CocoRleCounts },
}

impl Segmentation {
    /// COCO `iscrowd` flag implied by this variant.
    pub fn iscrowd(&self) -> u8 {
        match self {
            Segmentation::Polygons(_) => 0,
            Segmentation::RunLength(_) | Segmentation::CocoRle { .. } => 1,
        }
    }

    /// Number of mask instances this segmentation produces.
    pub fn instance_count(&self) -> usize {
        match self {
            Segmentation::Polygons(polygons) => polygons.len(),
            Segmentation::RunLength(_) | Segmentation::CocoRle { .. } => 1,
        }
    }
}

/// An annotated instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub id: AnnotationId,
    pub image_id: ImageId,
    pub category_id: CategoryId,
    pub bbox: BBox,
    pub segmentation: Segmentation,
    pub area: Option<f64>,
}

impl Annotation {
    pub fn new(
        id: impl Into<AnnotationId>,
        image_id: impl Into<ImageId>,
        category_id: impl Into<CategoryId>,
        bbox: BBox,
        segmentation: Segmentation,
    ) -> Self {
        Self {
            id: id.into(),
            image_id: image_id.into(),
            category_id: category_id.into(),
            bbox,
            segmentation,
            area: None,
        }
    }

    pub fn with_area(mut self, area: f64) -> Self {
        self.area = Some(area);
        self
    }

    #[inline]
    pub fn iscrowd(&self) -> u8 {
        self.segmentation.iscrowd()
    }
}

/// One image together with its annotations, in file order.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageRecord {
    pub id: ImageId,
    /// File name as stored in the annotation file.
    pub file_name: String,
    /// Resolved location of the `.jpg` on disk.
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub annotations: Vec<Annotation>,
}
