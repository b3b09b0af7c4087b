//! The in-memory COCO segmentation dataset.
//!
//! A [`Dataset`] owns a category table and an ordered map of
//! [`ImageRecord`]s, each carrying its annotations in file order. Records
//! are immutable once loaded; augmentation only appends new ones through
//! [`Dataset::push_synthetic`].
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use cocoaug::dataset::{Dataset, ImageId};
//!
//! let dataset = Dataset::load(Path::new("annotations.json"), Path::new("images"))?;
//! let masks = dataset.load_mask(ImageId::new(0))?;
//! assert_eq!(masks.depth(), masks.class_ids.len());
//! # Ok::<(), cocoaug::CocoaugError>(())
//! ```

mod bbox;
mod ids;
pub mod io_coco_json;
mod model;

pub use bbox::BBox;
pub use ids::{AnnotationId, CategoryId, ImageId};
pub use model::{Annotation, Category, CocoRleCounts, ImageRecord, Segmentation};

use std::collections::BTreeMap;
use std::path::Path;

use image::{GrayImage, RgbImage};

use crate::error::CocoaugError;
use crate::mask::{self, rle, InstanceMasks};

/// A loaded COCO-style instance-segmentation dataset.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    categories: BTreeMap<CategoryId, Category>,
    images: BTreeMap<ImageId, ImageRecord>,
}

impl Dataset {
    pub(crate) fn from_parts(
        categories: BTreeMap<CategoryId, Category>,
        images: BTreeMap<ImageId, ImageRecord>,
    ) -> Self {
        Self { categories, images }
    }

    /// Parses `annotation_path` and resolves image files under `images_dir`.
    ///
    /// See [`io_coco_json`] for the loading rules.
    pub fn load(annotation_path: &Path, images_dir: &Path) -> Result<Self, CocoaugError> {
        io_coco_json::read_coco_json(annotation_path, images_dir)
    }

    /// Same as [`Dataset::load`] for an in-memory document.
    pub fn from_coco_str(json: &str, images_dir: &Path) -> Result<Self, CocoaugError> {
        io_coco_json::from_coco_str(json, images_dir)
    }

    pub fn from_coco_slice(bytes: &[u8], images_dir: &Path) -> Result<Self, CocoaugError> {
        io_coco_json::from_coco_slice(bytes, images_dir)
    }

    /// Number of image records.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Image records in ascending id order.
    pub fn images(&self) -> impl Iterator<Item = &ImageRecord> {
        self.images.values()
    }

    pub fn image(&self, id: ImageId) -> Option<&ImageRecord> {
        self.images.get(&id)
    }

    pub fn categories(&self) -> &BTreeMap<CategoryId, Category> {
        &self.categories
    }

    /// Categories in ascending id order.
    pub fn category_list(&self) -> Vec<Category> {
        self.categories.values().cloned().collect()
    }

    /// Total number of annotations over all records.
    pub fn annotation_count(&self) -> usize {
        self.images.values().map(|img| img.annotations.len()).sum()
    }

    /// Largest image id, if any.
    pub fn max_image_id(&self) -> Option<ImageId> {
        self.images.keys().next_back().copied()
    }

    /// Largest annotation id over all records, if any.
    pub fn max_annotation_id(&self) -> Option<AnnotationId> {
        self.images
            .values()
            .flat_map(|img| img.annotations.iter().map(|ann| ann.id))
            .max()
    }

    /// Appends a record produced by augmentation.
    ///
    /// Existing records are never replaced: a record whose id is already
    /// present is returned back as the error value.
    pub fn push_synthetic(&mut self, record: ImageRecord) -> Result<(), ImageRecord> {
        if self.images.contains_key(&record.id) {
            return Err(record);
        }
        self.images.insert(record.id, record);
        Ok(())
    }

    fn record(&self, id: ImageId) -> Result<&ImageRecord, CocoaugError> {
        self.images.get(&id).ok_or(CocoaugError::UnknownImage(id))
    }

    /// Decodes the image file of record `id` as 8-bit RGB.
    pub fn load_image(&self, id: ImageId) -> Result<RgbImage, CocoaugError> {
        let record = self.record(id)?;
        let image = image::open(&record.path).map_err(|source| CocoaugError::ImageRead {
            path: record.path.clone(),
            source,
        })?;
        Ok(image.to_rgb8())
    }

    /// Builds the instance-mask volume of record `id`.
    ///
    /// Every polygon of a non-crowd annotation becomes its own instance;
    /// a run-length annotation contributes exactly one. `class_ids[i]` is
    /// the category of `masks[i]`.
    ///
    /// # Errors
    /// [`CocoaugError::EmptyMask`] if the record has no annotations, and
    /// RLE errors for undecodable or wrongly sized run-length masks.
    pub fn load_mask(&self, id: ImageId) -> Result<InstanceMasks, CocoaugError> {
        let record = self.record(id)?;
        if record.annotations.is_empty() {
            return Err(CocoaugError::EmptyMask(id));
        }

        let mut volume = InstanceMasks::new(record.width, record.height);
        for annotation in &record.annotations {
            for instance in annotation_instances(record, annotation)? {
                volume.push(instance, annotation.category_id);
            }
        }
        Ok(volume)
    }
}

/// Rasterizes or decodes every instance of one annotation.
fn annotation_instances(
    record: &ImageRecord,
    annotation: &Annotation,
) -> Result<Vec<GrayImage>, CocoaugError> {
    let (width, height) = (record.width, record.height);
    let instances = match &annotation.segmentation {
        Segmentation::Polygons(polygons) => polygons
            .iter()
            .map(|polygon| mask::polygon::rasterize(polygon, width, height))
            .collect(),
        Segmentation::RunLength(code) => vec![rle::decode(code, Some((height, width)))?],
        Segmentation::CocoRle { size, counts } => vec![rle::decode_coco(*size, counts)?],
    };

    for instance in &instances {
        if instance.dimensions() != (width, height) {
            return Err(CocoaugError::MaskDimensions {
                image_id: record.id,
                width,
                height,
                found_width: instance.width(),
                found_height: instance.height(),
            });
        }
    }
    Ok(instances)
}

/// Union of all instances of `annotation`, sized like `record`.
pub fn annotation_mask(
    record: &ImageRecord,
    annotation: &Annotation,
) -> Result<GrayImage, CocoaugError> {
    let instances = annotation_instances(record, annotation)?;
    Ok(mask::union(&instances, record.width, record.height))
}
