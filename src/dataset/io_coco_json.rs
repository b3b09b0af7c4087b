//! COCO JSON reader and writer.
//!
//! COCO bounding boxes use `[x, y, width, height]` with `(x, y)` the
//! top-left corner in absolute pixels; in memory they are kept as
//! [`BBox`](super::BBox) (xmin, ymin, xmax, ymax).
//!
//! # Loading rules
//!
//! - `images`, `annotations` and `categories` are required top-level keys.
//! - A category id below 1 aborts the whole load.
//! - An image entry without `file_name`, `width` or `height` is skipped
//!   with a warning, as is a repeated image id (the first entry claims the
//!   id even when it is itself skipped).
//! - Image files are looked up as `.jpg`, whatever extension the entry
//!   carries.
//!
//! # Deterministic Output
//!
//! The writer sorts images, annotations and categories by id.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};

use super::model::{Annotation, Category, CocoRleCounts, ImageRecord, Segmentation};
use super::{AnnotationId, BBox, CategoryId, Dataset, ImageId};
use crate::error::CocoaugError;

// ============================================================================
// COCO Schema Types (internal to this module)
// ============================================================================

/// Top-level COCO document. All three lists are required.
#[derive(Debug, Serialize, Deserialize)]
struct CocoDocument {
    images: Vec<CocoImage>,
    annotations: Vec<CocoAnnotation>,
    categories: Vec<CocoCategory>,
}

/// COCO image entry. The descriptive fields are optional on input so that
/// incomplete entries can be skipped instead of failing the whole parse.
#[derive(Debug, Serialize, Deserialize)]
struct CocoImage {
    id: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
}

/// COCO category entry. Signed so that negative ids reach the id check.
#[derive(Debug, Serialize, Deserialize)]
struct CocoCategory {
    id: i64,
    name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    supercategory: Option<String>,
}

/// COCO annotation entry.
#[derive(Debug, Serialize, Deserialize)]
struct CocoAnnotation {
    id: u64,
    image_id: u64,
    category_id: u64,

    /// COCO bbox format: [x, y, width, height] with (x,y) as top-left corner
    bbox: [f64; 4],

    #[serde(default, skip_serializing_if = "Option::is_none")]
    area: Option<f64>,

    #[serde(default, deserialize_with = "deserialize_iscrowd")]
    iscrowd: u8,

    #[serde(default)]
    segmentation: serde_json::Value,
}

fn deserialize_iscrowd<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IsCrowd {
        Bool(bool),
        Int(u8),
    }
    match IsCrowd::deserialize(deserializer)? {
        IsCrowd::Bool(b) => Ok(u8::from(b)),
        IsCrowd::Int(i) => Ok(u8::from(i != 0)),
    }
}

/// The shapes a `segmentation` value can take on input.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSegmentation {
    Polygons(Vec<Vec<f64>>),
    Strings(Vec<String>),
    Rle { size: [u32; 2], counts: RawCounts },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCounts {
    Compressed(String),
    Uncompressed(Vec<u32>),
}

// ============================================================================
// Public API
// ============================================================================

/// Reads a dataset from a COCO JSON file, resolving images under `images_dir`.
///
/// # Errors
/// Fails if the file cannot be read, is not valid COCO JSON, or defines a
/// category with an id below 1.
pub fn read_coco_json(path: &Path, images_dir: &Path) -> Result<Dataset, CocoaugError> {
    let file = File::open(path).map_err(CocoaugError::Io)?;
    let reader = BufReader::new(file);

    let coco: CocoDocument =
        serde_json::from_reader(reader).map_err(|source| CocoaugError::AnnotationParse {
            path: path.to_path_buf(),
            source,
        })?;

    coco_to_dataset(coco, images_dir)
}

/// Reads a dataset from a COCO JSON string.
pub fn from_coco_str(json: &str, images_dir: &Path) -> Result<Dataset, CocoaugError> {
    let coco: CocoDocument =
        serde_json::from_str(json).map_err(|source| CocoaugError::AnnotationParse {
            path: "<string>".into(),
            source,
        })?;
    coco_to_dataset(coco, images_dir)
}

/// Reads a dataset from a COCO JSON byte slice.
pub fn from_coco_slice(bytes: &[u8], images_dir: &Path) -> Result<Dataset, CocoaugError> {
    let coco: CocoDocument =
        serde_json::from_slice(bytes).map_err(|source| CocoaugError::AnnotationParse {
            path: "<bytes>".into(),
            source,
        })?;
    coco_to_dataset(coco, images_dir)
}

/// Writes categories and image records (with their annotations) as COCO JSON.
///
/// Lists are sorted by id. The `file_name` of each record is written as is.
pub fn write_coco_json(
    path: &Path,
    categories: &[Category],
    images: &[ImageRecord],
) -> Result<(), CocoaugError> {
    let file = File::create(path).map_err(CocoaugError::Io)?;
    let writer = BufWriter::new(file);

    let coco = records_to_coco(categories, images);

    serde_json::to_writer(writer, &coco).map_err(|source| CocoaugError::AnnotationWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes categories and image records to a COCO JSON string.
pub fn to_coco_string(
    categories: &[Category],
    images: &[ImageRecord],
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&records_to_coco(categories, images))
}

// ============================================================================
// Conversion: COCO -> Dataset
// ============================================================================

fn coco_to_dataset(coco: CocoDocument, images_dir: &Path) -> Result<Dataset, CocoaugError> {
    let mut categories = BTreeMap::new();
    for cat in coco.categories {
        if cat.id < 1 {
            return Err(CocoaugError::InvalidCategory {
                id: cat.id,
                name: cat.name,
            });
        }
        let id = CategoryId::new(cat.id as u64);
        categories.insert(
            id,
            Category {
                id,
                name: cat.name,
                supercategory: cat.supercategory,
            },
        );
    }

    // Group annotations by image, keeping file order within each image
    let mut by_image: HashMap<ImageId, Vec<Annotation>> = HashMap::new();
    for ann in coco.annotations {
        let segmentation = match segmentation_from_coco(ann.iscrowd, ann.segmentation) {
            Ok(segmentation) => segmentation,
            Err(reason) => {
                warn!("Skipping annotation (id: {}): {}", ann.id, reason);
                continue;
            }
        };

        let [x, y, w, h] = ann.bbox;
        let annotation = Annotation {
            id: AnnotationId::new(ann.id),
            image_id: ImageId::new(ann.image_id),
            category_id: CategoryId::new(ann.category_id),
            bbox: BBox::from_xywh(x, y, w, h),
            segmentation,
            area: ann.area,
        };
        by_image
            .entry(annotation.image_id)
            .or_default()
            .push(annotation);
    }

    // An id is taken by its first entry even when that entry is incomplete
    let mut seen: HashSet<ImageId> = HashSet::new();
    let mut images = BTreeMap::new();
    for img in coco.images {
        let id = ImageId::new(img.id);
        if !seen.insert(id) {
            warn!("Skipping duplicate image id: {}", id);
            continue;
        }

        let (file_name, width, height) = match (img.file_name, img.width, img.height) {
            (Some(file_name), Some(width), Some(height)) => (file_name, width, height),
            (file_name, width, _) => {
                let missing = if file_name.is_none() {
                    "file_name"
                } else if width.is_none() {
                    "width"
                } else {
                    "height"
                };
                warn!("Skipping image (id: {}) with missing key: {}", id, missing);
                continue;
            }
        };

        let path = images_dir.join(Path::new(&file_name).with_extension("jpg"));
        let annotations = by_image.remove(&id).unwrap_or_default();

        images.insert(
            id,
            ImageRecord {
                id,
                file_name,
                path,
                width,
                height,
                annotations,
            },
        );
    }

    for (image_id, orphans) in &by_image {
        debug!(
            "Ignoring {} annotation(s) for image {} which has no usable image entry",
            orphans.len(),
            image_id
        );
    }

    Ok(Dataset::from_parts(categories, images))
}

fn segmentation_from_coco(iscrowd: u8, value: serde_json::Value) -> Result<Segmentation, String> {
    let raw: RawSegmentation = serde_json::from_value(value)
        .map_err(|_| "unrecognised segmentation format".to_string())?;

    match (iscrowd, raw) {
        (0, RawSegmentation::Polygons(polygons)) => Ok(Segmentation::Polygons(polygons)),
        (_, RawSegmentation::Rle { size, counts }) => Ok(Segmentation::CocoRle {
            size,
            counts: match counts {
                RawCounts::Compressed(s) => CocoRleCounts::Compressed(s),
                RawCounts::Uncompressed(v) => CocoRleCounts::Uncompressed(v),
            },
        }),
        (0, RawSegmentation::Strings(_)) => {
            Err("run-length strings require iscrowd = 1".to_string())
        }
        (_, RawSegmentation::Strings(mut strings)) if strings.len() == 1 => {
            Ok(Segmentation::RunLength(strings.remove(0)))
        }
        (_, RawSegmentation::Strings(strings)) => Err(format!(
            "crowd annotation must carry exactly one RLE string, found {}",
            strings.len()
        )),
        (_, RawSegmentation::Polygons(polygons)) if polygons.is_empty() => {
            Err("crowd annotation must carry exactly one RLE string, found 0".to_string())
        }
        (_, RawSegmentation::Polygons(_)) => {
            Err("crowd annotation carries polygons instead of an RLE string".to_string())
        }
    }
}

// ============================================================================
// Conversion: records -> COCO
// ============================================================================

fn segmentation_to_coco(segmentation: &Segmentation) -> serde_json::Value {
    match segmentation {
        Segmentation::Polygons(polygons) => serde_json::json!(polygons),
        Segmentation::RunLength(rle) => serde_json::json!([rle]),
        Segmentation::CocoRle { size, counts } => match counts {
            CocoRleCounts::Compressed(s) => serde_json::json!({ "size": size, "counts": s }),
            CocoRleCounts::Uncompressed(v) => serde_json::json!({ "size": size, "counts": v }),
        },
    }
}

fn records_to_coco(categories: &[Category], images: &[ImageRecord]) -> CocoDocument {
    let mut coco_categories: Vec<CocoCategory> = categories
        .iter()
        .map(|cat| CocoCategory {
            id: cat.id.as_u64() as i64,
            name: cat.name.clone(),
            supercategory: cat.supercategory.clone(),
        })
        .collect();
    coco_categories.sort_by_key(|c| c.id);

    let mut coco_images: Vec<CocoImage> = images
        .iter()
        .map(|img| CocoImage {
            id: img.id.as_u64(),
            file_name: Some(img.file_name.clone()),
            width: Some(img.width),
            height: Some(img.height),
        })
        .collect();
    coco_images.sort_by_key(|i| i.id);

    let mut coco_annotations: Vec<CocoAnnotation> = images
        .iter()
        .flat_map(|img| img.annotations.iter())
        .map(|ann| CocoAnnotation {
            id: ann.id.as_u64(),
            image_id: ann.image_id.as_u64(),
            category_id: ann.category_id.as_u64(),
            bbox: ann.bbox.to_xywh(),
            area: Some(ann.area.unwrap_or_else(|| ann.bbox.area())),
            iscrowd: ann.iscrowd(),
            segmentation: segmentation_to_coco(&ann.segmentation),
        })
        .collect();
    coco_annotations.sort_by_key(|a| a.id);

    CocoDocument {
        images: coco_images,
        annotations: coco_annotations,
        categories: coco_categories,
    }
}

// ============================================================================
// Tests
// ============================================================================
