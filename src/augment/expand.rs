//! Dataset expansion: originals plus `ratio` augmented variants each.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{augment, transforms, AugmentConfig, AugmentError, Sample, TransformKind};
use crate::dataset::{
    annotation_mask, io_coco_json, Annotation, AnnotationId, Category, Dataset, ImageId,
    ImageRecord, Segmentation,
};
use crate::error::CocoaugError;
use crate::mask::{self, rle};

/// Directory under the output root that receives the images.
pub const AUGMENTED_DIR: &str = "augmented";

/// Directory under [`AUGMENTED_DIR`] that receives mask overlays.
pub const PREVIEW_DIR: &str = "preview";

const PREVIEW_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const PREVIEW_ALPHA: f32 = 0.4;

/// Name of the merged annotation file.
pub const ANNOTATIONS_FILE: &str = "coco_annotations_augmented.json";

/// How variant numbers `1..=ratio` map to transform kinds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Schedule {
    /// Variant `i` uses legacy mode `i`, so ratios above 10 are rejected.
    #[default]
    Legacy,
    /// Variant `i` uses `kinds[(i - 1) % kinds.len()]`.
    Cycle(Vec<TransformKind>),
}

impl Schedule {
    pub fn kind_for(&self, variant: usize) -> Result<TransformKind, AugmentError> {
        match self {
            Schedule::Legacy => TransformKind::from_index(variant),
            Schedule::Cycle(kinds) if !kinds.is_empty() && variant > 0 => {
                Ok(kinds[(variant - 1) % kinds.len()])
            }
            Schedule::Cycle(_) => Err(AugmentError::UnknownTransform(variant)),
        }
    }
}

/// Options for [`expand`].
#[derive(Clone, Debug)]
pub struct ExpandOptions {
    /// Variants generated per annotated image.
    pub ratio: usize,
    /// Seed for the transform parameters; `None` draws from the thread RNG.
    pub seed: Option<u64>,
    pub schedule: Schedule,
    /// The single category written to the merged annotation file.
    pub category: Category,
    /// Show a progress bar on stderr.
    pub progress: bool,
    /// Also write each variant with its mask and box drawn on it.
    pub preview: bool,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            ratio: 10,
            seed: None,
            schedule: Schedule::Legacy,
            category: Category::new(1u64, "cig_butt").with_supercategory("litter"),
            progress: false,
            preview: false,
        }
    }
}

impl ExpandOptions {
    /// Checks every variant number against the schedule up front, so a bad
    /// ratio fails before anything is written.
    fn validate(&self) -> Result<(), CocoaugError> {
        if let Schedule::Cycle(kinds) = &self.schedule {
            if kinds.is_empty() {
                return Err(CocoaugError::InvalidExpandParams {
                    message: "the transform cycle must name at least one kind".to_string(),
                });
            }
        }
        if self.category.id.as_u64() < 1 {
            return Err(CocoaugError::InvalidExpandParams {
                message: "the output category id must be at least 1".to_string(),
            });
        }
        for variant in 1..=self.ratio {
            self.schedule.kind_for(variant)?;
        }
        Ok(())
    }
}

/// Summary of an expansion run.
#[derive(Clone, Debug, Default)]
pub struct ExpansionReport {
    pub originals: usize,
    pub variants: usize,
    /// Originals copied without variants because they have no annotations.
    pub skipped: Vec<ImageId>,
    pub per_kind: BTreeMap<TransformKind, usize>,
    pub annotations_path: PathBuf,
}

impl fmt::Display for ExpansionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Expansion summary")?;
        writeln!(f, "  originals: {}", self.originals)?;
        writeln!(f, "  variants: {}", self.variants)?;
        if !self.skipped.is_empty() {
            writeln!(f, "  without annotations: {}", self.skipped.len())?;
        }
        for (kind, count) in &self.per_kind {
            writeln!(f, "    {kind}: {count}")?;
        }
        write!(f, "  annotations: {}", self.annotations_path.display())
    }
}

/// Expands `dataset` into `output_dir` using `options.seed` (or the thread
/// RNG when unseeded).
///
/// See [`expand_with_rng`] for what gets written.
pub fn expand(
    dataset: &mut Dataset,
    output_dir: &Path,
    options: &ExpandOptions,
    config: &AugmentConfig,
) -> Result<ExpansionReport, CocoaugError> {
    if let Some(seed) = options.seed {
        let mut rng = StdRng::seed_from_u64(seed);
        expand_with_rng(dataset, output_dir, options, config, &mut rng)
    } else {
        let mut rng = rand::rng();
        expand_with_rng(dataset, output_dir, options, config, &mut rng)
    }
}

/// Writes every original as `augmented/{id:08}.jpg`, then `ratio`
/// variants of it as `augmented/{new_id}.jpg`, and finally the merged
/// `coco_annotations_augmented.json`.
///
/// Only the first annotation of each image is augmented. Each variant gets
/// one crowd annotation holding the RLE of its warped mask. New image ids
/// start at `max(len, max_id + 1)`; new annotation ids continue after the
/// largest existing one. The synthetic records are appended to `dataset`.
///
/// Nothing is rolled back on failure: files written before the error stay
/// on disk and the annotation file is not written.
pub fn expand_with_rng<R: Rng + ?Sized>(
    dataset: &mut Dataset,
    output_dir: &Path,
    options: &ExpandOptions,
    config: &AugmentConfig,
    rng: &mut R,
) -> Result<ExpansionReport, CocoaugError> {
    options.validate()?;

    let augmented_dir = output_dir.join(AUGMENTED_DIR);
    fs::create_dir_all(&augmented_dir)?;
    let preview_dir = augmented_dir.join(PREVIEW_DIR);
    if options.preview {
        fs::create_dir_all(&preview_dir)?;
    }

    let originals: Vec<ImageId> = dataset.images().map(|record| record.id).collect();
    let mut next_image_id = dataset
        .max_image_id()
        .map_or(0, |id| id.as_u64() + 1)
        .max(originals.len() as u64);
    let mut next_annotation_id = dataset.max_annotation_id().map_or(0, |id| id.as_u64() + 1);

    info!(
        "Expanding {} images x {} variants into {}",
        originals.len(),
        options.ratio,
        output_dir.display()
    );

    let progress = progress_bar(originals.len() as u64, options.progress);
    let mut report = ExpansionReport::default();
    let mut written: Vec<ImageRecord> = Vec::with_capacity(originals.len() * (options.ratio + 1));

    for id in originals {
        let record = dataset
            .image(id)
            .cloned()
            .ok_or(CocoaugError::UnknownImage(id))?;
        let mut image = dataset.load_image(id)?;
        if image.dimensions() != (record.width, record.height) {
            warn!(
                "Image {} is {}x{} on disk but {}x{} in the annotations; resizing",
                id,
                image.width(),
                image.height(),
                record.width,
                record.height
            );
            image = transforms::resize_to(&image, record.width, record.height);
        }

        let file_name = format!("{:08}.jpg", id.as_u64());
        let path = augmented_dir.join(&file_name);
        save_jpg(&image, &path)?;
        report.originals += 1;

        let Some(first) = record.annotations.first() else {
            warn!("Image {} has no annotations; copied without variants", id);
            report.skipped.push(id);
            written.push(ImageRecord {
                file_name,
                path,
                ..record
            });
            progress.inc(1);
            continue;
        };

        let sample = Sample {
            mask: annotation_mask(&record, first)?,
            image,
            bbox: first.bbox,
        };

        for variant in 1..=options.ratio {
            let kind = options.schedule.kind_for(variant)?;
            let out = augment(&sample, kind, config, rng)?;

            let new_id = ImageId::new(next_image_id);
            next_image_id += 1;
            let new_file_name = format!("{}.jpg", new_id.as_u64());
            let new_path = augmented_dir.join(&new_file_name);
            save_jpg(&out.image, &new_path)?;
            if options.preview {
                let preview = mask::overlay(
                    &out.image,
                    &out.mask,
                    &out.bbox,
                    PREVIEW_COLOR,
                    PREVIEW_ALPHA,
                );
                save_jpg(&preview, &preview_dir.join(&new_file_name))?;
            }

            let annotation = Annotation::new(
                AnnotationId::new(next_annotation_id),
                new_id,
                first.category_id,
                out.bbox,
                Segmentation::RunLength(rle::encode(&out.mask)?),
            )
            .with_area(mask::area(&out.mask) as f64);
            next_annotation_id += 1;

            debug!(
                "Image {} variant {} ({}) -> {} bbox {:?}",
                id,
                variant,
                kind,
                new_id,
                out.bbox.to_xywh()
            );

            let (width, height) = out.dimensions();
            written.push(ImageRecord {
                id: new_id,
                file_name: new_file_name,
                path: new_path,
                width,
                height,
                annotations: vec![annotation],
            });
            *report.per_kind.entry(kind).or_default() += 1;
            report.variants += 1;
        }

        written.push(ImageRecord {
            file_name,
            path,
            ..record
        });
        progress.inc(1);
    }
    progress.finish_and_clear();

    written.sort_by_key(|record| record.id);
    let annotations_path = output_dir.join(ANNOTATIONS_FILE);
    io_coco_json::write_coco_json(
        &annotations_path,
        std::slice::from_ref(&options.category),
        &written,
    )?;

    for record in written {
        if dataset.image(record.id).is_none() {
            let id = record.id;
            if dataset.push_synthetic(record).is_err() {
                warn!("Synthetic image id {} already taken; not added to dataset", id);
            }
        }
    }

    report.annotations_path = annotations_path;
    info!(
        "Wrote {} originals and {} variants to {}",
        report.originals,
        report.variants,
        augmented_dir.display()
    );
    Ok(report)
}

fn save_jpg(image: &RgbImage, path: &Path) -> Result<(), CocoaugError> {
    image.save(path).map_err(|source| CocoaugError::ImageWrite {
        path: path.to_path_buf(),
        source,
    })
}

fn progress_bar(len: u64, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    if let Ok(style) =
        ProgressStyle::with_template("[{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} images")
    {
        bar.set_style(style);
    }
    bar
}
