//! Dataset inspection.
//!
//! Produces an [`InspectReport`] with counts, the per-category annotation
//! histogram and bbox sanity checks. With [`InspectOptions::masks`] set,
//! every record's instance-mask volume is also built, which catches
//! undecodable or wrongly sized run-length masks before an expansion run.

mod report;

pub use report::{BBoxStats, InspectReport, LabelCount, LabelsSection, MaskStats, SummarySection};

use std::collections::HashMap;

use log::debug;

use crate::dataset::{Dataset, Segmentation};
use crate::error::CocoaugError;
use crate::mask;

/// Options for [`inspect_dataset`].
#[derive(Clone, Debug)]
pub struct InspectOptions {
    /// Number of categories shown in the histogram.
    pub top_labels: usize,
    /// Rasterize every image's masks.
    pub masks: bool,
    /// Slack in pixels for the out-of-bounds check.
    pub oob_tolerance_px: f64,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            top_labels: 10,
            masks: false,
            oob_tolerance_px: 0.5,
        }
    }
}

/// Inspects `dataset`.
///
/// # Errors
/// Only when `opts.masks` is set: the first mask that cannot be decoded
/// or does not match its image's dimensions.
pub fn inspect_dataset(
    dataset: &Dataset,
    opts: &InspectOptions,
) -> Result<InspectReport, CocoaugError> {
    let masks = if opts.masks {
        Some(compute_mask_stats(dataset)?)
    } else {
        None
    };

    Ok(InspectReport {
        summary: compute_summary(dataset),
        labels: compute_labels(dataset, opts.top_labels),
        bboxes: compute_bbox_stats(dataset, opts.oob_tolerance_px),
        masks,
    })
}

fn compute_summary(dataset: &Dataset) -> SummarySection {
    let mut summary = SummarySection {
        images: dataset.len(),
        categories: dataset.categories().len(),
        annotations: dataset.annotation_count(),
        ..SummarySection::default()
    };

    for record in dataset.images() {
        if record.annotations.is_empty() {
            summary.unannotated.push(record.id);
        }
        for ann in &record.annotations {
            match &ann.segmentation {
                Segmentation::Polygons(_) => {
                    summary.polygon_annotations += 1;
                    summary.polygons += ann.segmentation.instance_count();
                }
                Segmentation::RunLength(_) | Segmentation::CocoRle { .. } => {
                    summary.crowd_annotations += 1;
                }
            }
        }
    }
    summary
}

fn compute_labels(dataset: &Dataset, top_n: usize) -> LabelsSection {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for ann in dataset.images().flat_map(|record| &record.annotations) {
        let label = dataset
            .categories()
            .get(&ann.category_id)
            .map(|cat| cat.name.clone())
            .unwrap_or_else(|| format!("<missing cat {}>", ann.category_id));
        *counts.entry(label).or_insert(0) += 1;
    }

    // Count descending, then name ascending
    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let total_distinct = sorted.len();
    let other_count = sorted.iter().skip(top_n).map(|(_, count)| count).sum();
    let entries = sorted
        .into_iter()
        .take(top_n)
        .map(|(label, count)| LabelCount { label, count })
        .collect();

    LabelsSection {
        top_n,
        total_distinct,
        total_annotations: dataset.annotation_count(),
        entries,
        other_count,
    }
}

fn compute_bbox_stats(dataset: &Dataset, tolerance: f64) -> BBoxStats {
    let mut stats = BBoxStats::default();

    for record in dataset.images() {
        let (img_w, img_h) = (f64::from(record.width), f64::from(record.height));
        for ann in &record.annotations {
            stats.total += 1;
            let bbox = &ann.bbox;
            if !bbox.is_finite() {
                continue;
            }
            stats.finite += 1;

            let (width, height) = (bbox.width(), bbox.height());
            if width <= 0.0 || height <= 0.0 {
                stats.degenerate_area += 1;
            } else {
                stats.min_width = Some(stats.min_width.map_or(width, |m| m.min(width)));
                stats.max_width = Some(stats.max_width.map_or(width, |m| m.max(width)));
                stats.min_height = Some(stats.min_height.map_or(height, |m| m.min(height)));
                stats.max_height = Some(stats.max_height.map_or(height, |m| m.max(height)));
            }

            if bbox.xmin < -tolerance
                || bbox.ymin < -tolerance
                || bbox.xmax > img_w + tolerance
                || bbox.ymax > img_h + tolerance
            {
                stats.out_of_bounds += 1;
            }
        }
    }
    stats
}

fn compute_mask_stats(dataset: &Dataset) -> Result<MaskStats, CocoaugError> {
    let mut stats = MaskStats::default();

    for record in dataset.images() {
        if record.annotations.is_empty() {
            continue;
        }
        let volume = dataset.load_mask(record.id)?;
        debug!("Image {}: {} mask instances", record.id, volume.depth());
        stats.images += 1;
        stats.instances += volume.depth();
        stats.max_depth = stats.max_depth.max(volume.depth());
        for instance in &volume.masks {
            let area = mask::area(instance);
            if area == 0 {
                stats.empty_instances += 1;
            }
            stats.foreground_pixels += area;
        }
    }
    Ok(stats)
}
